//! Collaborator interfaces the matching core consumes.
//!
//! Storage and the remote model are injected behind these traits so the core
//! never reaches for a process-wide client.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{MatchResult, Offer, Profile};

/// Errors surfaced by a store implementation
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Storage backend error: {0}")]
    Backend(String),

    #[error("Invalid stored data: {0}")]
    InvalidData(String),
}

/// Errors surfaced by a remote model transport
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Remote model is not configured (missing API key)")]
    NotConfigured,

    #[error("Request timed out")]
    Timeout,

    #[error("HTTP request failed: {0}")]
    Request(String),

    #[error("API returned error ({status}): {message}")]
    Status { status: u16, message: String },

    #[error("Invalid response envelope: {0}")]
    MalformedEnvelope(String),
}

/// One structured-output request to the remote model
#[derive(Debug, Clone, Copy)]
pub struct ModelRequest<'a> {
    pub system_instruction: &'a str,
    pub prompt: &'a str,
    pub response_schema: &'a Value,
}

/// Read access to the published catalog
#[async_trait]
pub trait CatalogReader: Send + Sync {
    /// Published offers; stale (past-deadline) entries may be included
    async fn get_published_offers(&self) -> Result<Vec<Offer>, StoreError>;
}

/// Read access to profiles
#[async_trait]
pub trait ProfileReader: Send + Sync {
    /// Returns [`StoreError::NotFound`] for an unknown id
    async fn get_profile(&self, id: Uuid) -> Result<Profile, StoreError>;
}

/// Write access to a profile's result set
///
/// `replace_results` must be atomic and single-writer per profile: readers
/// see either the old set or the new one, never a mix. The core does not
/// serialize concurrent runs for the same profile itself.
#[async_trait]
pub trait ResultWriter: Send + Sync {
    async fn replace_results(
        &self,
        profile_id: Uuid,
        results: Vec<MatchResult>,
    ) -> Result<(), StoreError>;
}

/// Opaque remote generative model: prompt in, raw structured text out
#[async_trait]
pub trait ModelTransport: Send + Sync {
    async fn call(&self, request: ModelRequest<'_>) -> Result<String, TransportError>;
}
