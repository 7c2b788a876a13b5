// Core algorithm exports
pub mod filters;
pub mod orchestrator;
pub mod ports;
pub mod ranker;
pub mod remote;
pub mod scoring;

pub use filters::{failed_gate, matches_income, Gate, NO_INCOME_CONDITION};
pub use orchestrator::{Clock, HybridOrchestrator, OrchestratorError, RunReport, RunState};
pub use ports::{CatalogReader, ModelRequest, ModelTransport, ProfileReader, ResultWriter, StoreError, TransportError};
pub use ranker::{RuleBasedRanker, FALLBACK_CLOSING_TODO, FALLBACK_DIGEST};
pub use remote::{parse_response, FailureKind, PromptLimits, RemoteFailure, RemoteMatchStrategy};
pub use scoring::{Eligibility, Evaluation, ScoringModel, ScoringWeights, SOCIAL_CARE_MARKER};
