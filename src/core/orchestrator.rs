use chrono::{NaiveDate, Utc};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::core::ports::{CatalogReader, ProfileReader, ResultWriter, StoreError};
use crate::core::ranker::RuleBasedRanker;
use crate::core::remote::{FailureKind, RemoteMatchStrategy};
use crate::models::MatchStrategy;

/// Returns the calendar date deadlines are measured against
pub type Clock = Arc<dyn Fn() -> NaiveDate + Send + Sync>;

/// Progress of one matching run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Started,
    RemoteAttempted,
    Succeeded,
    FallbackRan,
    Persisted,
}

/// What a completed run did
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub profile_id: Uuid,
    pub state: RunState,
    pub strategy: MatchStrategy,
    /// Set when the remote attempt failed and the fallback ran instead
    pub remote_failure: Option<FailureKind>,
    pub persisted: usize,
}

/// Fatal errors for a run; nothing is written when one occurs
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("Profile not found: {0}")]
    ProfileNotFound(Uuid),

    #[error("Failed to load profile: {0}")]
    Profile(#[source] StoreError),

    #[error("Failed to load catalog: {0}")]
    Catalog(#[source] StoreError),

    #[error("Failed to persist results: {0}")]
    Persist(#[source] StoreError),
}

/// Hybrid matching: remote model first, rule-based ranking on any failure
///
/// ```text
/// Started ──▶ RemoteAttempted ──ok──▶ Succeeded ───┐
///                   │                              ├──▶ Persisted
///                   └──failure──▶ FallbackRan ─────┘
/// ```
///
/// Exactly one result set is written per run, replacing the profile's
/// previous set.
pub struct HybridOrchestrator {
    profiles: Arc<dyn ProfileReader>,
    catalog: Arc<dyn CatalogReader>,
    results: Arc<dyn ResultWriter>,
    remote: RemoteMatchStrategy,
    ranker: RuleBasedRanker,
    remote_budget: Duration,
    clock: Clock,
}

impl HybridOrchestrator {
    pub fn new(
        profiles: Arc<dyn ProfileReader>,
        catalog: Arc<dyn CatalogReader>,
        results: Arc<dyn ResultWriter>,
        remote: RemoteMatchStrategy,
        ranker: RuleBasedRanker,
        remote_budget: Duration,
    ) -> Self {
        Self {
            profiles,
            catalog,
            results,
            remote,
            ranker,
            remote_budget,
            clock: Arc::new(|| Utc::now().date_naive()),
        }
    }

    /// Replace the clock, e.g. to pin "today" in tests
    pub fn with_clock<F>(mut self, clock: F) -> Self
    where
        F: Fn() -> NaiveDate + Send + Sync + 'static,
    {
        self.clock = Arc::new(clock);
        self
    }

    /// Run the full matching pipeline for one profile
    pub async fn run_match(&self, profile_id: Uuid) -> Result<RunReport, OrchestratorError> {
        let mut state = RunState::Started;
        info!("[{}] Matching run started", profile_id);

        let profile = self
            .profiles
            .get_profile(profile_id)
            .await
            .map_err(|e| match e {
                StoreError::NotFound(_) => OrchestratorError::ProfileNotFound(profile_id),
                other => OrchestratorError::Profile(other),
            })?;

        let offers = self
            .catalog
            .get_published_offers()
            .await
            .map_err(OrchestratorError::Catalog)?;

        let today = (self.clock)();

        let (set, strategy, remote_failure) = if offers.is_empty() {
            info!("[{}] Catalog is empty; skipping remote model", profile_id);
            state = transition(profile_id, state, RunState::FallbackRan);
            (self.ranker.rank(&profile, &offers, today), MatchStrategy::RuleBased, None)
        } else {
            state = transition(profile_id, state, RunState::RemoteAttempted);
            match self.remote.attempt(&profile, &offers, self.remote_budget).await {
                Ok(set) => {
                    state = transition(profile_id, state, RunState::Succeeded);
                    (set, MatchStrategy::Remote, None)
                }
                Err(failure) => {
                    warn!(
                        "[{}] Remote matching failed ({}): {}. Running rule-based fallback",
                        profile_id,
                        failure.kind().as_str(),
                        failure
                    );
                    state = transition(profile_id, state, RunState::FallbackRan);
                    let set = self.ranker.rank(&profile, &offers, today);
                    (set, MatchStrategy::RuleBased, Some(failure.kind()))
                }
            }
        };

        let rows = set.into_results(profile_id, strategy, Utc::now());
        let persisted = rows.len();

        self.results
            .replace_results(profile_id, rows)
            .await
            .map_err(OrchestratorError::Persist)?;

        state = transition(profile_id, state, RunState::Persisted);
        info!(
            "[{}] Matching run complete: {} results via {}",
            profile_id,
            persisted,
            strategy.as_str()
        );

        Ok(RunReport {
            profile_id,
            state,
            strategy,
            remote_failure,
            persisted,
        })
    }

    /// Start a run in the background and return immediately
    ///
    /// Errors are logged, never returned; callers poll the result store.
    pub fn spawn_match(self: &Arc<Self>, profile_id: Uuid) -> JoinHandle<()> {
        let orchestrator = Arc::clone(self);

        tokio::spawn(async move {
            if let Err(e) = orchestrator.run_match(profile_id).await {
                error!("[{}] Matching run aborted: {}", profile_id, e);
            }
        })
    }
}

fn transition(profile_id: Uuid, from: RunState, to: RunState) -> RunState {
    tracing::debug!("[{}] {:?} -> {:?}", profile_id, from, to);
    to
}
