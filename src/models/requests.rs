use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::domain::{Grade, IncomeBand, Profile};

/// Request to create a diagnostic profile
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateProfileRequest {
    pub grade: Grade,
    pub prefecture: String,
    pub income_band: IncomeBand,
    #[serde(default)]
    pub school_band: Option<String>,
    pub major: String,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub has_social_care: bool,
    pub target_period: String,
    #[serde(default)]
    pub has_volunteer: bool,
    #[serde(default)]
    pub has_cram: bool,
}

impl CreateProfileRequest {
    pub fn into_profile(self, id: Uuid, created_at: DateTime<Utc>) -> Profile {
        Profile {
            id,
            grade: self.grade,
            prefecture: self.prefecture,
            income_band: self.income_band,
            school_band: self.school_band,
            major: self.major,
            gender: self.gender,
            has_social_care: self.has_social_care,
            target_period: self.target_period,
            has_volunteer: self.has_volunteer,
            has_cram: self.has_cram,
            created_at,
        }
    }
}

/// Request to start a matching run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestMatchRequest {
    #[serde(alias = "profile_id", rename = "profileId")]
    pub profile_id: Uuid,
}

/// Query for polling a profile's results
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchResultsQuery {
    #[serde(alias = "profile_id", rename = "profileId")]
    pub profile_id: Uuid,
}
