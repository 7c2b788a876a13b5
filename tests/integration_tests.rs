// Integration tests for HOPE Match

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, NaiveDate, Utc};
use hope_match::core::{
    FailureKind, HybridOrchestrator, ModelRequest, ModelTransport, OrchestratorError,
    ProfileReader, PromptLimits, RemoteMatchStrategy, ResultWriter, RuleBasedRanker, RunState,
    TransportError, NO_INCOME_CONDITION,
};
use hope_match::models::{Difficulty, Grade, IncomeBand, MatchResult, MatchStrategy, Offer, Profile};
use hope_match::services::{MemoryStore, ProfileWriter, ResultReader};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, 1).unwrap()
}

fn create_profile() -> Profile {
    Profile {
        id: Uuid::new_v4(),
        grade: Grade::University1st,
        prefecture: "東京都".to_string(),
        income_band: IncomeBand::Under300,
        school_band: Some("B".to_string()),
        major: "工学".to_string(),
        gender: None,
        has_social_care: false,
        target_period: "2027".to_string(),
        has_volunteer: true,
        has_cram: false,
        created_at: Utc::now(),
    }
}

fn create_offer(id: i64, amount: i64, days_left: i64) -> Offer {
    Offer {
        id,
        name: format!("奨学金{}", id),
        provider: "財団".to_string(),
        category: "民間".to_string(),
        offer_type: "給付".to_string(),
        amount_per_year: amount,
        period: "1年".to_string(),
        eligible_grades: vec![Grade::University1st],
        eligible_prefs: vec![],
        fields: vec!["工学".to_string()],
        income_requirement: NO_INCOME_CONDITION.to_string(),
        other_requirements: None,
        deadline: today() + ChronoDuration::days(days_left),
        required_docs: vec!["推薦書".to_string()],
        application_method: "Web".to_string(),
        difficulty_hint: Difficulty::Easy,
        url: format!("https://example.org/{}", id),
        contact: Some("info@example.org".to_string()),
        is_published: true,
        last_checked: Utc::now(),
        source: None,
    }
}

fn create_catalog() -> Vec<Offer> {
    vec![
        create_offer(1, 600_000, 10),
        create_offer(2, 100_000, 50),
        create_offer(3, 900_000, 120),
        create_offer(4, 300_000, 20),
    ]
}

enum Reply {
    Text(String),
    Fail(TransportError),
    Hang,
}

/// Scripted model transport that counts its calls
struct FakeTransport {
    reply: Reply,
    calls: AtomicUsize,
}

impl FakeTransport {
    fn new(reply: Reply) -> Arc<Self> {
        Arc::new(Self {
            reply,
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl ModelTransport for FakeTransport {
    async fn call(&self, _request: ModelRequest<'_>) -> Result<String, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.reply {
            Reply::Text(text) => Ok(text.clone()),
            Reply::Fail(TransportError::NotConfigured) => Err(TransportError::NotConfigured),
            Reply::Fail(e) => Err(TransportError::Request(e.to_string())),
            Reply::Hang => {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Err(TransportError::Timeout)
            }
        }
    }
}

async fn setup(offers: Vec<Offer>, transport: Arc<FakeTransport>) -> (Arc<MemoryStore>, HybridOrchestrator, Profile) {
    let store = Arc::new(MemoryStore::with_offers(offers));
    let profile = store.insert_profile(create_profile()).await.unwrap();

    let orchestrator = HybridOrchestrator::new(
        store.clone(),
        store.clone(),
        store.clone(),
        RemoteMatchStrategy::new(transport, PromptLimits::default()),
        RuleBasedRanker::default(),
        Duration::from_millis(100),
    )
    .with_clock(today);

    (store, orchestrator, profile)
}

/// Compare persisted rows with a freshly computed fallback ranking
async fn assert_matches_fallback(store: &MemoryStore, profile: &Profile, offers: &[Offer]) {
    let expected = RuleBasedRanker::default().rank(profile, offers, today());
    let stored = store.get_results(profile.id).await.unwrap();

    assert_eq!(stored.len(), expected.results.len());
    for (row, entry) in stored.iter().zip(&expected.results) {
        assert_eq!(row.rank, entry.rank);
        assert_eq!(row.scholarship_id, entry.offer_id);
        assert_eq!(row.score, entry.score);
        assert_eq!(row.why_match, entry.why_match);
        assert_eq!(row.todo, entry.todo);
        assert_eq!(row.digest, expected.digest);
        assert_eq!(row.strategy, MatchStrategy::RuleBased);
    }
}

fn remote_reply() -> String {
    json!({
        "results": [
            {
                "rank": 1, "score": 0.92, "name": "奨学金3", "provider": "財団",
                "why_match": "工学専攻で高額の給付が受けられます", "deadline": "2027-01-29",
                "amount_per_year": 900000, "required_docs": ["推薦書"], "difficulty": "Medium",
                "url": "https://example.org/3", "todo": ["推薦書を依頼する"]
            },
            {
                "rank": 2, "score": 0.75, "name": "未登録の奨学金", "provider": "不明",
                "why_match": "条件が近い", "deadline": "2026-11-15",
                "amount_per_year": 120000, "required_docs": [], "difficulty": "Easy",
                "url": "https://example.org/x", "todo": []
            }
        ],
        "digest": "工学系の給付型が有力です"
    })
    .to_string()
}

#[tokio::test]
async fn test_remote_success_persists_remote_results() {
    let transport = FakeTransport::new(Reply::Text(remote_reply()));
    let (store, orchestrator, profile) = setup(create_catalog(), transport.clone()).await;

    let report = orchestrator.run_match(profile.id).await.unwrap();

    assert_eq!(report.state, RunState::Persisted);
    assert_eq!(report.strategy, MatchStrategy::Remote);
    assert_eq!(report.remote_failure, None);
    assert_eq!(transport.calls.load(Ordering::SeqCst), 1);

    let stored = store.get_results(profile.id).await.unwrap();
    assert_eq!(stored.len(), 2);
    assert_eq!(stored[0].scholarship_id, Some(3));
    // Unknown names are kept without a catalog link
    assert_eq!(stored[1].scholarship_id, None);
    assert!(stored.iter().all(|r| r.strategy == MatchStrategy::Remote));
    assert!(stored.iter().all(|r| r.digest == "工学系の給付型が有力です"));
    assert!(stored[0].raw_json.is_some());
}

#[tokio::test]
async fn test_timeout_falls_back_to_rule_based() {
    let catalog = create_catalog();
    let (store, orchestrator, profile) = setup(catalog.clone(), FakeTransport::new(Reply::Hang)).await;

    let report = orchestrator.run_match(profile.id).await.unwrap();

    assert_eq!(report.strategy, MatchStrategy::RuleBased);
    assert_eq!(report.remote_failure, Some(FailureKind::Timeout));
    assert_matches_fallback(&store, &profile, &catalog).await;
}

#[tokio::test]
async fn test_transport_failure_falls_back_to_rule_based() {
    let catalog = create_catalog();
    let transport = FakeTransport::new(Reply::Fail(TransportError::NotConfigured));
    let (store, orchestrator, profile) = setup(catalog.clone(), transport).await;

    let report = orchestrator.run_match(profile.id).await.unwrap();

    assert_eq!(report.remote_failure, Some(FailureKind::Transport));
    assert_matches_fallback(&store, &profile, &catalog).await;
}

#[tokio::test]
async fn test_schema_violation_falls_back_without_mixing() {
    let catalog = create_catalog();
    // Second entry scores higher than the first
    let bad = json!({
        "results": [
            {
                "rank": 1, "score": 0.4, "name": "奨学金1", "provider": "財団",
                "why_match": "w", "deadline": "2026-10-11", "amount_per_year": 600000,
                "required_docs": [], "difficulty": "Easy", "url": "u", "todo": []
            },
            {
                "rank": 2, "score": 0.9, "name": "奨学金3", "provider": "財団",
                "why_match": "w", "deadline": "2027-01-29", "amount_per_year": 900000,
                "required_docs": [], "difficulty": "Easy", "url": "u", "todo": []
            }
        ],
        "digest": "d"
    })
    .to_string();
    let (store, orchestrator, profile) = setup(catalog.clone(), FakeTransport::new(Reply::Text(bad))).await;

    let report = orchestrator.run_match(profile.id).await.unwrap();

    assert_eq!(report.remote_failure, Some(FailureKind::SchemaViolation));
    assert_matches_fallback(&store, &profile, &catalog).await;
}

#[tokio::test]
async fn test_unparseable_output_is_schema_violation() {
    let catalog = create_catalog();
    let transport = FakeTransport::new(Reply::Text("申し訳ありません。".to_string()));
    let (store, orchestrator, profile) = setup(catalog.clone(), transport).await;

    let report = orchestrator.run_match(profile.id).await.unwrap();

    assert_eq!(report.remote_failure, Some(FailureKind::SchemaViolation));
    assert_matches_fallback(&store, &profile, &catalog).await;
}

#[tokio::test]
async fn test_new_run_replaces_previous_results() {
    let catalog = create_catalog();
    let (store, orchestrator, profile) = setup(catalog.clone(), FakeTransport::new(Reply::Hang)).await;

    let stale: Vec<MatchResult> = RuleBasedRanker::default()
        .rank(&profile, &catalog[..1], today())
        .into_results(profile.id, MatchStrategy::Remote, Utc::now());
    store.replace_results(profile.id, stale).await.unwrap();

    orchestrator.run_match(profile.id).await.unwrap();

    let stored = store.get_results(profile.id).await.unwrap();
    assert!(stored.iter().all(|r| r.strategy == MatchStrategy::RuleBased));
    assert_matches_fallback(&store, &profile, &catalog).await;
}

#[tokio::test]
async fn test_missing_profile_writes_nothing() {
    let transport = FakeTransport::new(Reply::Text(remote_reply()));
    let (store, orchestrator, _) = setup(create_catalog(), transport.clone()).await;
    let unknown = Uuid::new_v4();

    let err = orchestrator.run_match(unknown).await.unwrap_err();

    assert!(matches!(err, OrchestratorError::ProfileNotFound(id) if id == unknown));
    assert_eq!(transport.calls.load(Ordering::SeqCst), 0);
    assert!(store.get_results(unknown).await.unwrap().is_empty());
    assert!(store.get_profile(unknown).await.is_err());
}

#[tokio::test]
async fn test_empty_catalog_skips_remote_and_persists_empty_set() {
    let transport = FakeTransport::new(Reply::Text(remote_reply()));
    let (store, orchestrator, profile) = setup(vec![], transport.clone()).await;

    let report = orchestrator.run_match(profile.id).await.unwrap();

    assert_eq!(report.strategy, MatchStrategy::RuleBased);
    assert_eq!(report.persisted, 0);
    assert_eq!(transport.calls.load(Ordering::SeqCst), 0);
    assert!(store.get_results(profile.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_spawned_run_completes_in_background() {
    let catalog = create_catalog();
    let transport = FakeTransport::new(Reply::Fail(TransportError::NotConfigured));
    let (store, orchestrator, profile) = setup(catalog.clone(), transport).await;

    let orchestrator = Arc::new(orchestrator);
    orchestrator.spawn_match(profile.id).await.unwrap();

    assert_matches_fallback(&store, &profile, &catalog).await;
}
