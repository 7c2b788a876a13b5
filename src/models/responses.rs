use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Acknowledgement that a matching run was accepted
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestMatchResponse {
    pub status: String,
    pub message: String,
    #[serde(rename = "profileId")]
    pub profile_id: Uuid,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Error response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub status_code: u16,
}
