use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::{CatalogReader, ProfileReader, ResultWriter, StoreError};
use crate::models::{MatchResult, NewOffer, Offer, Profile};

/// Profile creation for the intake endpoint
#[async_trait]
pub trait ProfileWriter: Send + Sync {
    async fn insert_profile(&self, profile: Profile) -> Result<Profile, StoreError>;
}

/// Polling read path for a profile's latest result set
#[async_trait]
pub trait ResultReader: Send + Sync {
    /// Results ordered by rank; empty while processing or when nothing matched
    async fn get_results(&self, profile_id: Uuid) -> Result<Vec<MatchResult>, StoreError>;
}

/// Catalog ingestion
#[async_trait]
pub trait CatalogWriter: Send + Sync {
    /// Insert offers, assigning ids; returns the stored rows
    async fn insert_offers(&self, offers: Vec<NewOffer>) -> Result<Vec<Offer>, StoreError>;
}

/// Rows removed by one retention sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurgeStats {
    pub results: u64,
    pub profiles: u64,
}

/// Retention sweeps over profiles and their results
#[async_trait]
pub trait RetentionStore: Send + Sync {
    /// Delete results and profiles created before `cutoff`
    async fn purge_older_than(&self, cutoff: DateTime<Utc>) -> Result<PurgeStats, StoreError>;
}

/// Everything the service needs from one storage backend
#[async_trait]
pub trait MatchStore:
    CatalogReader
    + CatalogWriter
    + ProfileReader
    + ProfileWriter
    + ResultReader
    + ResultWriter
    + RetentionStore
{
    async fn health_check(&self) -> Result<bool, StoreError> {
        Ok(true)
    }
}
