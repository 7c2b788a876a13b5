use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

use crate::core::{CatalogReader, ProfileReader, ResultWriter, StoreError};
use crate::models::{Grade, MatchResult, NewOffer, Offer, Profile};
use crate::services::store::{
    CatalogWriter, MatchStore, ProfileWriter, PurgeStats, ResultReader, RetentionStore,
};

/// Errors that can occur when interacting with PostgreSQL
#[derive(Debug, Error)]
pub enum PostgresError {
    #[error("SQLx error: {0}")]
    SqlxError(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    MigrateError(#[from] sqlx::migrate::MigrateError),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid stored data: {0}")]
    InvalidData(String),
}

impl From<PostgresError> for StoreError {
    fn from(err: PostgresError) -> Self {
        match err {
            PostgresError::NotFound(what) => StoreError::NotFound(what),
            PostgresError::InvalidData(msg) => StoreError::InvalidData(msg),
            PostgresError::SqlxError(sqlx::Error::RowNotFound) => {
                StoreError::NotFound("row".to_string())
            }
            other => StoreError::Backend(other.to_string()),
        }
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        PostgresError::from(err).into()
    }
}

/// PostgreSQL-backed store for profiles, the catalog and match results
pub struct PostgresClient {
    pool: PgPool,
}

impl PostgresClient {
    /// Create a new PostgreSQL client from a connection string
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self, PostgresError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(5))
            .idle_timeout(Duration::from_secs(600))
            .test_before_acquire(true)
            .connect(database_url)
            .await?;

        // Run migrations on startup
        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(Self { pool })
    }

    /// Create a new PostgreSQL client from settings
    pub async fn from_settings(
        url: &str,
        max_connections: Option<u32>,
        min_connections: Option<u32>,
    ) -> Result<Self, PostgresError> {
        tracing::info!("Connecting to PostgreSQL");

        Self::new(
            url,
            max_connections.unwrap_or(10),
            min_connections.unwrap_or(1),
        )
        .await
    }
}

const OFFER_COLUMNS: &str = r#"
    id, name, provider, category, type, amount_per_year, period,
    eligible_grades, eligible_prefs, fields, income_requirement,
    other_requirements, deadline, required_docs, application_method,
    difficulty_hint, url, contact, is_published, last_checked, source
"#;

fn parse_column<T: std::str::FromStr>(row: &PgRow, column: &str) -> Result<T, PostgresError>
where
    T::Err: std::fmt::Display,
{
    let raw: String = row.try_get(column)?;
    raw.parse()
        .map_err(|e: T::Err| PostgresError::InvalidData(format!("{}: {}", column, e)))
}

fn offer_from_row(row: &PgRow) -> Result<Offer, PostgresError> {
    let grades: Vec<String> = row.try_get("eligible_grades")?;
    let eligible_grades = grades
        .iter()
        .map(|g| g.parse::<Grade>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| PostgresError::InvalidData(format!("eligible_grades: {}", e)))?;

    Ok(Offer {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        provider: row.try_get("provider")?,
        category: row.try_get("category")?,
        offer_type: row.try_get("type")?,
        amount_per_year: row.try_get("amount_per_year")?,
        period: row.try_get("period")?,
        eligible_grades,
        eligible_prefs: row.try_get("eligible_prefs")?,
        fields: row.try_get("fields")?,
        income_requirement: row.try_get("income_requirement")?,
        other_requirements: row.try_get("other_requirements")?,
        deadline: row.try_get("deadline")?,
        required_docs: row.try_get("required_docs")?,
        application_method: row.try_get("application_method")?,
        difficulty_hint: parse_column(row, "difficulty_hint")?,
        url: row.try_get("url")?,
        contact: row.try_get("contact")?,
        is_published: row.try_get("is_published")?,
        last_checked: row.try_get("last_checked")?,
        source: row.try_get("source")?,
    })
}

fn profile_from_row(row: &PgRow) -> Result<Profile, PostgresError> {
    Ok(Profile {
        id: row.try_get("id")?,
        grade: parse_column(row, "grade")?,
        prefecture: row.try_get("prefecture")?,
        income_band: parse_column(row, "income_band")?,
        school_band: row.try_get("school_band")?,
        major: row.try_get("major")?,
        gender: row.try_get("gender")?,
        has_social_care: row.try_get("has_social_care")?,
        target_period: row.try_get("target_period")?,
        has_volunteer: row.try_get("has_volunteer")?,
        has_cram: row.try_get("has_cram")?,
        created_at: row.try_get("created_at")?,
    })
}

fn result_from_row(row: &PgRow) -> Result<MatchResult, PostgresError> {
    let rank: i16 = row.try_get("rank")?;
    let rank = u8::try_from(rank)
        .map_err(|_| PostgresError::InvalidData(format!("rank out of range: {}", rank)))?;

    Ok(MatchResult {
        id: row.try_get("id")?,
        profile_id: row.try_get("profile_id")?,
        scholarship_id: row.try_get("scholarship_id")?,
        rank,
        score: row.try_get("score")?,
        why_match: row.try_get("why_match")?,
        difficulty: parse_column(row, "difficulty")?,
        deadline: row.try_get("deadline")?,
        amount_per_year: row.try_get("amount_per_year")?,
        url: row.try_get("url")?,
        todo: row.try_get("todo")?,
        digest: row.try_get("digest")?,
        raw_json: row.try_get("raw_json")?,
        strategy: parse_column(row, "strategy")?,
        saved: row.try_get("saved")?,
        created_at: row.try_get("created_at")?,
    })
}

#[async_trait]
impl CatalogReader for PostgresClient {
    async fn get_published_offers(&self) -> Result<Vec<Offer>, StoreError> {
        let query = format!(
            "SELECT {} FROM scholarships WHERE is_published = TRUE ORDER BY id",
            OFFER_COLUMNS
        );

        let rows = sqlx::query(&query).fetch_all(&self.pool).await?;
        let offers = rows
            .iter()
            .map(offer_from_row)
            .collect::<Result<Vec<_>, _>>()?;

        tracing::debug!("Loaded {} published scholarships", offers.len());
        Ok(offers)
    }
}

#[async_trait]
impl CatalogWriter for PostgresClient {
    async fn insert_offers(&self, offers: Vec<NewOffer>) -> Result<Vec<Offer>, StoreError> {
        let query = format!(
            r#"
            INSERT INTO scholarships (
                name, provider, category, type, amount_per_year, period,
                eligible_grades, eligible_prefs, fields, income_requirement,
                other_requirements, deadline, required_docs, application_method,
                difficulty_hint, url, contact, is_published, last_checked, source
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10,
                    $11, $12, $13, $14, $15, $16, $17, $18, NOW(), $19)
            RETURNING {}
            "#,
            OFFER_COLUMNS
        );

        let mut tx = self.pool.begin().await?;
        let mut stored = Vec::with_capacity(offers.len());

        for offer in offers {
            let grades: Vec<&str> = offer.eligible_grades.iter().map(|g| g.as_str()).collect();

            let row = sqlx::query(&query)
                .bind(&offer.name)
                .bind(&offer.provider)
                .bind(&offer.category)
                .bind(&offer.offer_type)
                .bind(offer.amount_per_year)
                .bind(&offer.period)
                .bind(&grades)
                .bind(&offer.eligible_prefs)
                .bind(&offer.fields)
                .bind(&offer.income_requirement)
                .bind(&offer.other_requirements)
                .bind(offer.deadline)
                .bind(&offer.required_docs)
                .bind(&offer.application_method)
                .bind(offer.difficulty_hint.as_str())
                .bind(&offer.url)
                .bind(&offer.contact)
                .bind(offer.is_published)
                .bind(&offer.source)
                .fetch_one(&mut *tx)
                .await?;

            stored.push(offer_from_row(&row)?);
        }

        tx.commit().await?;
        tracing::info!("Inserted {} scholarships", stored.len());

        Ok(stored)
    }
}

#[async_trait]
impl ProfileReader for PostgresClient {
    async fn get_profile(&self, id: Uuid) -> Result<Profile, StoreError> {
        let query = r#"
            SELECT id, grade, prefecture, income_band, school_band, major, gender,
                   has_social_care, target_period, has_volunteer, has_cram, created_at
            FROM profiles
            WHERE id = $1
        "#;

        let row = sqlx::query(query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| PostgresError::NotFound(format!("profile {}", id)))?;

        Ok(profile_from_row(&row)?)
    }
}

#[async_trait]
impl ProfileWriter for PostgresClient {
    async fn insert_profile(&self, profile: Profile) -> Result<Profile, StoreError> {
        let query = r#"
            INSERT INTO profiles (
                id, grade, prefecture, income_band, school_band, major, gender,
                has_social_care, target_period, has_volunteer, has_cram, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
        "#;

        sqlx::query(query)
            .bind(profile.id)
            .bind(profile.grade.as_str())
            .bind(&profile.prefecture)
            .bind(profile.income_band.label())
            .bind(&profile.school_band)
            .bind(&profile.major)
            .bind(&profile.gender)
            .bind(profile.has_social_care)
            .bind(&profile.target_period)
            .bind(profile.has_volunteer)
            .bind(profile.has_cram)
            .bind(profile.created_at)
            .execute(&self.pool)
            .await?;

        tracing::debug!("Stored profile {}", profile.id);
        Ok(profile)
    }
}

#[async_trait]
impl ResultReader for PostgresClient {
    async fn get_results(&self, profile_id: Uuid) -> Result<Vec<MatchResult>, StoreError> {
        let query = r#"
            SELECT id, profile_id, scholarship_id, rank, score, why_match, difficulty,
                   deadline, amount_per_year, url, todo, digest, raw_json, strategy,
                   saved, created_at
            FROM match_results
            WHERE profile_id = $1
            ORDER BY rank ASC
        "#;

        let rows = sqlx::query(query)
            .bind(profile_id)
            .fetch_all(&self.pool)
            .await?;

        let results = rows
            .iter()
            .map(result_from_row)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(results)
    }
}

#[async_trait]
impl ResultWriter for PostgresClient {
    /// Delete and insert in one transaction
    ///
    /// The profile row is locked first so concurrent runs for the same
    /// profile serialize and readers never see a mixed set.
    async fn replace_results(
        &self,
        profile_id: Uuid,
        results: Vec<MatchResult>,
    ) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("SELECT id FROM profiles WHERE id = $1 FOR UPDATE")
            .bind(profile_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| PostgresError::NotFound(format!("profile {}", profile_id)))?;

        let deleted = sqlx::query("DELETE FROM match_results WHERE profile_id = $1")
            .bind(profile_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        let insert = r#"
            INSERT INTO match_results (
                id, profile_id, scholarship_id, rank, score, why_match, difficulty,
                deadline, amount_per_year, url, todo, digest, raw_json, strategy,
                saved, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
        "#;

        for result in &results {
            sqlx::query(insert)
                .bind(result.id)
                .bind(result.profile_id)
                .bind(result.scholarship_id)
                .bind(i16::from(result.rank))
                .bind(result.score)
                .bind(&result.why_match)
                .bind(result.difficulty.as_str())
                .bind(result.deadline)
                .bind(result.amount_per_year)
                .bind(&result.url)
                .bind(&result.todo)
                .bind(&result.digest)
                .bind(&result.raw_json)
                .bind(result.strategy.as_str())
                .bind(result.saved)
                .bind(result.created_at)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        tracing::debug!(
            "Replaced results for profile {}: {} removed, {} inserted",
            profile_id,
            deleted,
            results.len()
        );

        Ok(())
    }
}

#[async_trait]
impl RetentionStore for PostgresClient {
    async fn purge_older_than(&self, cutoff: DateTime<Utc>) -> Result<PurgeStats, StoreError> {
        let mut tx = self.pool.begin().await?;

        let results = sqlx::query("DELETE FROM match_results WHERE created_at < $1")
            .bind(cutoff)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        // Remaining results of expired profiles go with them via ON DELETE CASCADE
        let cascaded: i64 = sqlx::query(
            r#"
            SELECT COUNT(*) FROM match_results r
            JOIN profiles p ON p.id = r.profile_id
            WHERE p.created_at < $1
            "#,
        )
        .bind(cutoff)
        .fetch_one(&mut *tx)
        .await?
        .try_get(0)?;

        let profiles = sqlx::query("DELETE FROM profiles WHERE created_at < $1")
            .bind(cutoff)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        tx.commit().await?;

        Ok(PurgeStats {
            results: results + cascaded.max(0) as u64,
            profiles,
        })
    }
}

#[async_trait]
impl MatchStore for PostgresClient {
    async fn health_check(&self) -> Result<bool, StoreError> {
        sqlx::query("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map(|_| true)
            .map_err(Into::into)
    }
}
