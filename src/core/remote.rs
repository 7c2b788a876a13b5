use chrono::NaiveDate;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::core::ports::{ModelRequest, ModelTransport, TransportError};
use crate::models::{
    match_response_schema, Difficulty, Grade, IncomeBand, MatchSet, Offer, Profile,
};

const SYSTEM_INSTRUCTION: &str = "あなたは奨学金マッチングAI「HOPE」です。\
ユーザーのプロフィールと提供された奨学金データベースのみに基づき、\
最も適合性の高いTOP5を、指定されたJSONスキーマで返してください。\
データベース外の情報は絶対に生成せず、優しく前向きなトーンで説明を加えてください。";

/// Category of a failed remote attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Timeout,
    Transport,
    SchemaViolation,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Timeout => "timeout",
            FailureKind::Transport => "transport",
            FailureKind::SchemaViolation => "schema_violation",
        }
    }
}

/// Why the remote strategy produced no usable result
#[derive(Debug, Error)]
pub enum RemoteFailure {
    #[error("Remote model did not answer within {0:?}")]
    Timeout(Duration),

    #[error("Remote transport failed: {0}")]
    Transport(String),

    #[error("Remote response violates the match schema: {0}")]
    SchemaViolation(String),
}

impl RemoteFailure {
    pub fn kind(&self) -> FailureKind {
        match self {
            RemoteFailure::Timeout(_) => FailureKind::Timeout,
            RemoteFailure::Transport(_) => FailureKind::Transport,
            RemoteFailure::SchemaViolation(_) => FailureKind::SchemaViolation,
        }
    }
}

impl From<TransportError> for RemoteFailure {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Timeout => RemoteFailure::Timeout(Duration::ZERO),
            TransportError::MalformedEnvelope(msg) => RemoteFailure::SchemaViolation(msg),
            other => RemoteFailure::Transport(other.to_string()),
        }
    }
}

/// Bounds on the serialized catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PromptLimits {
    pub max_offers: usize,
    /// Free-text fields are cut to this many characters
    pub max_text_chars: usize,
}

impl Default for PromptLimits {
    fn default() -> Self {
        Self {
            max_offers: 200,
            max_text_chars: 400,
        }
    }
}

/// Profile as shown to the model (no id, no timestamps)
#[derive(Serialize)]
struct PromptProfile<'a> {
    grade: Grade,
    prefecture: &'a str,
    income_band: IncomeBand,
    school_band: Option<&'a str>,
    major: &'a str,
    gender: Option<&'a str>,
    has_social_care: bool,
    target_period: &'a str,
    has_volunteer: bool,
    has_cram: bool,
}

/// Offer as shown to the model (no id, publish flag or check timestamp)
#[derive(Serialize)]
struct PromptOffer<'a> {
    name: &'a str,
    provider: &'a str,
    category: &'a str,
    #[serde(rename = "type")]
    offer_type: &'a str,
    amount_per_year: i64,
    period: &'a str,
    eligible_grades: &'a [Grade],
    eligible_prefs: &'a [String],
    fields: &'a [String],
    income_requirement: &'a str,
    other_requirements: Option<String>,
    deadline: NaiveDate,
    required_docs: &'a [String],
    application_method: &'a str,
    difficulty_hint: Difficulty,
    url: &'a str,
}

/// Primary strategy: ask the remote model for the ranked set
///
/// A single attempt per call. Retries, if ever wanted, belong to the caller.
pub struct RemoteMatchStrategy {
    transport: Arc<dyn ModelTransport>,
    limits: PromptLimits,
    schema: Value,
}

impl RemoteMatchStrategy {
    pub fn new(transport: Arc<dyn ModelTransport>, limits: PromptLimits) -> Self {
        Self {
            transport,
            limits,
            schema: match_response_schema(),
        }
    }

    /// Run one remote attempt bounded by `budget`
    ///
    /// On success every entry's name has been resolved to a catalog id where
    /// an offer with exactly that name exists; unknown names keep a null
    /// reference.
    pub async fn attempt(
        &self,
        profile: &Profile,
        offers: &[Offer],
        budget: Duration,
    ) -> Result<MatchSet, RemoteFailure> {
        let prompt = self.build_prompt(profile, offers);
        let request = ModelRequest {
            system_instruction: SYSTEM_INSTRUCTION,
            prompt: &prompt,
            response_schema: &self.schema,
        };

        tracing::debug!(
            "Calling remote model for profile {} ({} offers, {} prompt bytes)",
            profile.id,
            offers.len().min(self.limits.max_offers),
            prompt.len()
        );

        let text = match tokio::time::timeout(budget, self.transport.call(request)).await {
            Ok(Ok(text)) => text,
            Ok(Err(TransportError::Timeout)) | Err(_) => return Err(RemoteFailure::Timeout(budget)),
            Ok(Err(e)) => return Err(e.into()),
        };

        parse_response(&text, offers)
    }

    /// Serialize profile and the bounded catalog into the user prompt
    pub fn build_prompt(&self, profile: &Profile, offers: &[Offer]) -> String {
        let profile_view = PromptProfile {
            grade: profile.grade,
            prefecture: &profile.prefecture,
            income_band: profile.income_band,
            school_band: profile.school_band.as_deref(),
            major: &profile.major,
            gender: profile.gender.as_deref(),
            has_social_care: profile.has_social_care,
            target_period: &profile.target_period,
            has_volunteer: profile.has_volunteer,
            has_cram: profile.has_cram,
        };

        let offer_views: Vec<PromptOffer<'_>> = offers
            .iter()
            .take(self.limits.max_offers)
            .map(|offer| PromptOffer {
                name: &offer.name,
                provider: &offer.provider,
                category: &offer.category,
                offer_type: &offer.offer_type,
                amount_per_year: offer.amount_per_year,
                period: &offer.period,
                eligible_grades: &offer.eligible_grades,
                eligible_prefs: &offer.eligible_prefs,
                fields: &offer.fields,
                income_requirement: &offer.income_requirement,
                other_requirements: offer
                    .other_requirements
                    .as_deref()
                    .map(|text| truncate_chars(text, self.limits.max_text_chars)),
                deadline: offer.deadline,
                required_docs: &offer.required_docs,
                application_method: &offer.application_method,
                difficulty_hint: offer.difficulty_hint,
                url: &offer.url,
            })
            .collect();

        // Serializing borrowed plain structs cannot fail
        let profile_json = serde_json::to_string(&profile_view).unwrap_or_default();
        let offers_json = serde_json::to_string(&offer_views).unwrap_or_default();

        format!(
            "--- ユーザープロフィール ---\n{}\n\n\
             --- 奨学金データベース (検索対象) ---\n{}\n\n\
             このデータベース内から、ユーザーに最適な奨学金TOP5を選び出し、\
             指定されたJSONスキーマに従ってJSONを生成してください。",
            profile_json, offers_json
        )
    }
}

/// Parse and validate raw model output against the match schema
pub fn parse_response(text: &str, offers: &[Offer]) -> Result<MatchSet, RemoteFailure> {
    let body = strip_code_fence(text);

    let mut set: MatchSet = serde_json::from_str(body)
        .map_err(|e| RemoteFailure::SchemaViolation(e.to_string()))?;

    set.results.sort_by_key(|entry| entry.rank);
    set.validate().map_err(RemoteFailure::SchemaViolation)?;

    for entry in &mut set.results {
        entry.offer_id = offers
            .iter()
            .find(|offer| offer.name == entry.name)
            .map(|offer| offer.id);

        if entry.offer_id.is_none() {
            tracing::warn!(
                "Remote result '{}' (rank {}) has no catalog match; keeping it unlinked",
                entry.name,
                entry.rank
            );
        }
    }

    Ok(set)
}

fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .map(str::trim)
        .unwrap_or(trimmed)
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => text[..byte_index].to_string(),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::filters::NO_INCOME_CONDITION;
    use async_trait::async_trait;
    use chrono::Utc;
    use serde_json::json;
    use uuid::Uuid;

    /// Replies with the given text, or with a 503 when empty
    struct StaticTransport(Option<String>);

    #[async_trait]
    impl ModelTransport for StaticTransport {
        async fn call(&self, _request: ModelRequest<'_>) -> Result<String, TransportError> {
            self.0.clone().ok_or_else(|| TransportError::Status {
                status: 503,
                message: "unavailable".to_string(),
            })
        }
    }

    struct SlowTransport;

    #[async_trait]
    impl ModelTransport for SlowTransport {
        async fn call(&self, _request: ModelRequest<'_>) -> Result<String, TransportError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok("{}".to_string())
        }
    }

    fn create_profile() -> Profile {
        Profile {
            id: Uuid::new_v4(),
            grade: Grade::University1st,
            prefecture: "東京都".to_string(),
            income_band: IncomeBand::From300To500,
            school_band: Some("公立".to_string()),
            major: "CS".to_string(),
            gender: None,
            has_social_care: true,
            target_period: "2026".to_string(),
            has_volunteer: false,
            has_cram: false,
            created_at: Utc::now(),
        }
    }

    fn create_offer(id: i64, name: &str) -> Offer {
        Offer {
            id,
            name: name.to_string(),
            provider: "財団A".to_string(),
            category: "財団".to_string(),
            offer_type: "給付".to_string(),
            amount_per_year: 600_000,
            period: "4年".to_string(),
            eligible_grades: vec![],
            eligible_prefs: vec![],
            fields: vec![],
            income_requirement: NO_INCOME_CONDITION.to_string(),
            other_requirements: Some("あ".repeat(1000)),
            deadline: NaiveDate::from_ymd_opt(2026, 12, 1).unwrap(),
            required_docs: vec!["推薦書".to_string()],
            application_method: "郵送".to_string(),
            difficulty_hint: Difficulty::Hard,
            url: "https://example.org".to_string(),
            contact: Some("secret@example.org".to_string()),
            is_published: true,
            last_checked: Utc::now(),
            source: None,
        }
    }

    fn response_json(names: &[&str]) -> String {
        let results: Vec<Value> = names
            .iter()
            .enumerate()
            .map(|(i, name)| {
                json!({
                    "rank": i + 1,
                    "score": 0.9 - i as f64 * 0.1,
                    "name": name,
                    "provider": "財団A",
                    "why_match": "あなたにぴったりです",
                    "deadline": "2026-12-01",
                    "amount_per_year": 600000,
                    "required_docs": ["推薦書"],
                    "difficulty": "Hard",
                    "url": "https://example.org",
                    "todo": ["書類を集める", "応募する"]
                })
            })
            .collect();
        json!({ "results": results, "digest": "応援しています" }).to_string()
    }

    fn strategy(transport: impl ModelTransport + 'static) -> RemoteMatchStrategy {
        RemoteMatchStrategy::new(Arc::new(transport), PromptLimits::default())
    }

    #[test]
    fn test_prompt_excludes_internal_fields_and_truncates_text() {
        let strategy = strategy(StaticTransport(None));
        let prompt = strategy.build_prompt(&create_profile(), &[create_offer(42, "給付奨学金")]);

        assert!(prompt.contains("給付奨学金"));
        assert!(prompt.contains("2026-12-01"));
        assert!(!prompt.contains("is_published"));
        assert!(!prompt.contains("last_checked"));
        assert!(!prompt.contains("created_at"));
        assert!(!prompt.contains("\"id\""));
        assert!(!prompt.contains(&"あ".repeat(401)));
    }

    #[test]
    fn test_prompt_caps_offer_count() {
        let strategy = RemoteMatchStrategy::new(
            Arc::new(StaticTransport(None)),
            PromptLimits { max_offers: 1, max_text_chars: 10 },
        );
        let offers = vec![create_offer(1, "First"), create_offer(2, "Second")];

        let prompt = strategy.build_prompt(&create_profile(), &offers);

        assert!(prompt.contains("First"));
        assert!(!prompt.contains("Second"));
    }

    #[tokio::test]
    async fn test_attempt_resolves_names_to_ids() {
        let offers = vec![create_offer(10, "Alpha"), create_offer(11, "Beta")];
        let strategy = strategy(StaticTransport(Some(response_json(&["Beta", "Unknown", "Alpha"]))));

        let set = strategy
            .attempt(&create_profile(), &offers, Duration::from_secs(1))
            .await
            .unwrap();

        let ids: Vec<_> = set.results.iter().map(|e| e.offer_id).collect();
        assert_eq!(ids, vec![Some(11), None, Some(10)]);
        assert_eq!(set.digest, "応援しています");
    }

    #[tokio::test]
    async fn test_attempt_times_out() {
        let strategy = strategy(SlowTransport);

        let err = strategy
            .attempt(&create_profile(), &[create_offer(1, "A")], Duration::from_millis(20))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), FailureKind::Timeout);
    }

    #[tokio::test]
    async fn test_attempt_maps_transport_errors() {
        let strategy = strategy(StaticTransport(None));

        let err = strategy
            .attempt(&create_profile(), &[create_offer(1, "A")], Duration::from_secs(1))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), FailureKind::Transport);
    }

    #[test]
    fn test_parse_rejects_missing_digest() {
        let text = json!({ "results": [] }).to_string();
        let err = parse_response(&text, &[]).unwrap_err();
        assert_eq!(err.kind(), FailureKind::SchemaViolation);
    }

    #[test]
    fn test_parse_rejects_bad_difficulty() {
        let text = response_json(&["Alpha"]).replace("\"Hard\"", "\"Extreme\"");
        let err = parse_response(&text, &[]).unwrap_err();
        assert_eq!(err.kind(), FailureKind::SchemaViolation);
    }

    #[test]
    fn test_parse_rejects_bad_deadline() {
        let text = response_json(&["Alpha"]).replace("2026-12-01", "12月1日");
        let err = parse_response(&text, &[]).unwrap_err();
        assert_eq!(err.kind(), FailureKind::SchemaViolation);
    }

    #[test]
    fn test_parse_accepts_code_fence_and_unordered_ranks() {
        let mut value: Value = serde_json::from_str(&response_json(&["Alpha", "Beta"])).unwrap();
        value["results"].as_array_mut().unwrap().reverse();
        let text = format!("```json\n{}\n```", value);

        let set = parse_response(&text, &[]).unwrap();

        assert_eq!(set.results[0].name, "Alpha");
        assert_eq!(set.results[1].rank, 2);
    }

    #[test]
    fn test_truncate_chars_respects_char_boundaries() {
        assert_eq!(truncate_chars("奨学金制度", 3), "奨学金");
        assert_eq!(truncate_chars("abc", 10), "abc");
    }
}
