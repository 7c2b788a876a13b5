use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::core::{CatalogReader, ProfileReader, ResultWriter, StoreError};
use crate::models::{MatchResult, NewOffer, Offer, Profile};
use crate::services::store::{
    CatalogWriter, MatchStore, ProfileWriter, PurgeStats, ResultReader, RetentionStore,
};

#[derive(Debug, Default)]
struct Tables {
    profiles: HashMap<Uuid, Profile>,
    offers: BTreeMap<i64, Offer>,
    results: HashMap<Uuid, Vec<MatchResult>>,
}

/// In-process store used when no database is configured
///
/// A single lock guards all tables, so `replace_results` is atomic and
/// serialized per process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store with a pre-built catalog, keeping the given ids
    pub fn with_offers(offers: Vec<Offer>) -> Self {
        let tables = Tables {
            offers: offers.into_iter().map(|o| (o.id, o)).collect(),
            ..Tables::default()
        };

        Self {
            tables: RwLock::new(tables),
        }
    }
}

#[async_trait]
impl CatalogReader for MemoryStore {
    async fn get_published_offers(&self) -> Result<Vec<Offer>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .offers
            .values()
            .filter(|offer| offer.is_published)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl CatalogWriter for MemoryStore {
    async fn insert_offers(&self, offers: Vec<NewOffer>) -> Result<Vec<Offer>, StoreError> {
        let mut tables = self.tables.write().await;
        let mut next_id = tables.offers.keys().next_back().copied().unwrap_or(0) + 1;
        let now = Utc::now();

        let mut stored = Vec::with_capacity(offers.len());
        for new_offer in offers {
            let offer = new_offer.into_offer(next_id, now);
            tables.offers.insert(next_id, offer.clone());
            stored.push(offer);
            next_id += 1;
        }

        Ok(stored)
    }
}

#[async_trait]
impl ProfileReader for MemoryStore {
    async fn get_profile(&self, id: Uuid) -> Result<Profile, StoreError> {
        self.tables
            .read()
            .await
            .profiles
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("profile {}", id)))
    }
}

#[async_trait]
impl ProfileWriter for MemoryStore {
    async fn insert_profile(&self, profile: Profile) -> Result<Profile, StoreError> {
        let mut tables = self.tables.write().await;
        if tables.profiles.contains_key(&profile.id) {
            return Err(StoreError::InvalidData(format!("profile {} already exists", profile.id)));
        }
        tables.profiles.insert(profile.id, profile.clone());
        Ok(profile)
    }
}

#[async_trait]
impl ResultReader for MemoryStore {
    async fn get_results(&self, profile_id: Uuid) -> Result<Vec<MatchResult>, StoreError> {
        let tables = self.tables.read().await;
        let mut results = tables.results.get(&profile_id).cloned().unwrap_or_default();
        results.sort_by_key(|r| r.rank);
        Ok(results)
    }
}

#[async_trait]
impl ResultWriter for MemoryStore {
    async fn replace_results(
        &self,
        profile_id: Uuid,
        results: Vec<MatchResult>,
    ) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        if !tables.profiles.contains_key(&profile_id) {
            return Err(StoreError::NotFound(format!("profile {}", profile_id)));
        }
        tables.results.insert(profile_id, results);
        Ok(())
    }
}

#[async_trait]
impl RetentionStore for MemoryStore {
    async fn purge_older_than(&self, cutoff: DateTime<Utc>) -> Result<PurgeStats, StoreError> {
        let mut tables = self.tables.write().await;
        let mut stats = PurgeStats::default();

        for results in tables.results.values_mut() {
            let before = results.len();
            results.retain(|r| r.created_at >= cutoff);
            stats.results += (before - results.len()) as u64;
        }

        let expired: Vec<Uuid> = tables
            .profiles
            .values()
            .filter(|p| p.created_at < cutoff)
            .map(|p| p.id)
            .collect();

        for id in expired {
            tables.profiles.remove(&id);
            if let Some(orphans) = tables.results.remove(&id) {
                stats.results += orphans.len() as u64;
            }
            stats.profiles += 1;
        }

        tables.results.retain(|_, rows| !rows.is_empty());

        Ok(stats)
    }
}

impl MatchStore for MemoryStore {}
