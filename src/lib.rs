//! HOPE Match - hybrid scholarship matching service
//!
//! Each matching run asks a remote generative model for the five best-fitting
//! scholarships for a student profile and falls back to a deterministic
//! rule-based ranking whenever the model times out, fails, or returns output
//! that violates the response contract. Exactly one result set is persisted
//! per run.

pub mod config;
pub mod core;
pub mod models;
pub mod routes;
pub mod services;

// Re-export commonly used types
pub use core::{HybridOrchestrator, RuleBasedRanker, ScoringModel, ScoringWeights};
pub use models::{MatchResult, MatchSet, MatchStrategy, Offer, Profile};
