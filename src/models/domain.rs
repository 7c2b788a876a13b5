use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Error returned when a stored enum label does not match any known variant
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} value: {value}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

/// School grade of the applicant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Grade {
    #[serde(rename = "HighSchool_1st")]
    HighSchool1st,
    #[serde(rename = "HighSchool_3rd")]
    HighSchool3rd,
    #[serde(rename = "University_1st")]
    University1st,
    #[serde(rename = "Graduate_Master")]
    GraduateMaster,
}

impl Grade {
    pub const ALL: [Grade; 4] = [
        Grade::HighSchool1st,
        Grade::HighSchool3rd,
        Grade::University1st,
        Grade::GraduateMaster,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Grade::HighSchool1st => "HighSchool_1st",
            Grade::HighSchool3rd => "HighSchool_3rd",
            Grade::University1st => "University_1st",
            Grade::GraduateMaster => "Graduate_Master",
        }
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Grade {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Grade::ALL
            .into_iter()
            .find(|g| g.as_str() == s)
            .ok_or_else(|| UnknownVariant { kind: "grade", value: s.to_string() })
    }
}

/// Household income band, ordered from lowest to highest
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum IncomeBand {
    #[serde(rename = "~300万")]
    Under300,
    #[serde(rename = "300~500万")]
    From300To500,
    #[serde(rename = "500~700万")]
    From500To700,
    #[serde(rename = "700~1000万")]
    From700To1000,
    #[serde(rename = "1000万~")]
    Over1000,
}

impl IncomeBand {
    pub const ALL: [IncomeBand; 5] = [
        IncomeBand::Under300,
        IncomeBand::From300To500,
        IncomeBand::From500To700,
        IncomeBand::From700To1000,
        IncomeBand::Over1000,
    ];

    /// Label as it appears in offer income requirements
    pub fn label(&self) -> &'static str {
        match self {
            IncomeBand::Under300 => "~300万",
            IncomeBand::From300To500 => "300~500万",
            IncomeBand::From500To700 => "500~700万",
            IncomeBand::From700To1000 => "700~1000万",
            IncomeBand::Over1000 => "1000万~",
        }
    }
}

impl fmt::Display for IncomeBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for IncomeBand {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        IncomeBand::ALL
            .into_iter()
            .find(|b| b.label() == s)
            .ok_or_else(|| UnknownVariant { kind: "income band", value: s.to_string() })
    }
}

/// Application difficulty hint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "Easy",
            Difficulty::Medium => "Medium",
            Difficulty::Hard => "Hard",
        }
    }
}

impl FromStr for Difficulty {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Easy" => Ok(Difficulty::Easy),
            "Medium" => Ok(Difficulty::Medium),
            "Hard" => Ok(Difficulty::Hard),
            other => Err(UnknownVariant { kind: "difficulty", value: other.to_string() }),
        }
    }
}

/// Diagnostic intake of one applicant, used as the matching query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: Uuid,
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
    pub created_at: DateTime<Utc>,
}

/// Scholarship offer from the catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Offer {
    pub id: i64,
    pub name: String,
    pub provider: String,
    pub category: String,
    #[serde(rename = "type")]
    pub offer_type: String,
    pub amount_per_year: i64,
    #[serde(default)]
    pub period: String,
    /// Empty means every grade is eligible
    #[serde(default)]
    pub eligible_grades: Vec<Grade>,
    /// Empty means nationwide
    #[serde(default)]
    pub eligible_prefs: Vec<String>,
    #[serde(default)]
    pub fields: Vec<String>,
    pub income_requirement: String,
    #[serde(default)]
    pub other_requirements: Option<String>,
    pub deadline: NaiveDate,
    #[serde(default)]
    pub required_docs: Vec<String>,
    pub application_method: String,
    pub difficulty_hint: Difficulty,
    pub url: String,
    #[serde(default)]
    pub contact: Option<String>,
    #[serde(default = "default_true")]
    pub is_published: bool,
    pub last_checked: DateTime<Utc>,
    #[serde(default)]
    pub source: Option<String>,
}

fn default_true() -> bool { true }

/// Catalog entry before it has been assigned an id
///
/// Deadlines are accepted as `YYYY-MM-DD` or as an RFC 3339 timestamp, in
/// which case only the UTC calendar date is kept.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewOffer {
    pub name: String,
    pub provider: String,
    pub category: String,
    #[serde(rename = "type")]
    pub offer_type: String,
    pub amount_per_year: i64,
    #[serde(default)]
    pub period: String,
    #[serde(default)]
    pub eligible_grades: Vec<Grade>,
    #[serde(default)]
    pub eligible_prefs: Vec<String>,
    #[serde(default)]
    pub fields: Vec<String>,
    pub income_requirement: String,
    #[serde(default)]
    pub other_requirements: Option<String>,
    #[serde(deserialize_with = "deserialize_deadline")]
    pub deadline: NaiveDate,
    #[serde(default)]
    pub required_docs: Vec<String>,
    pub application_method: String,
    pub difficulty_hint: Difficulty,
    pub url: String,
    #[serde(default)]
    pub contact: Option<String>,
    #[serde(default = "default_true")]
    pub is_published: bool,
    #[serde(default)]
    pub source: Option<String>,
}

impl NewOffer {
    pub fn into_offer(self, id: i64, last_checked: DateTime<Utc>) -> Offer {
        Offer {
            id,
            name: self.name,
            provider: self.provider,
            category: self.category,
            offer_type: self.offer_type,
            amount_per_year: self.amount_per_year,
            period: self.period,
            eligible_grades: self.eligible_grades,
            eligible_prefs: self.eligible_prefs,
            fields: self.fields,
            income_requirement: self.income_requirement,
            other_requirements: self.other_requirements,
            deadline: self.deadline,
            required_docs: self.required_docs,
            application_method: self.application_method,
            difficulty_hint: self.difficulty_hint,
            url: self.url,
            contact: self.contact,
            is_published: self.is_published,
            last_checked,
            source: self.source,
        }
    }
}

fn deserialize_deadline<'de, D>(deserializer: D) -> Result<NaiveDate, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;

    if let Ok(date) = NaiveDate::parse_from_str(&raw, "%Y-%m-%d") {
        return Ok(date);
    }

    DateTime::parse_from_rfc3339(&raw)
        .map(|ts| ts.with_timezone(&Utc).date_naive())
        .map_err(|e| serde::de::Error::custom(format!("invalid deadline '{}': {}", raw, e)))
}

/// Which strategy produced a result set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStrategy {
    Remote,
    RuleBased,
}

impl MatchStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchStrategy::Remote => "remote",
            MatchStrategy::RuleBased => "rule_based",
        }
    }
}

impl FromStr for MatchStrategy {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "remote" => Ok(MatchStrategy::Remote),
            "rule_based" => Ok(MatchStrategy::RuleBased),
            other => Err(UnknownVariant { kind: "strategy", value: other.to_string() }),
        }
    }
}

/// One persisted row of a profile's ranked result set
///
/// Deadline, amount and url are copied at match time and do not follow later
/// catalog edits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub id: Uuid,
    pub profile_id: Uuid,
    pub scholarship_id: Option<i64>,
    pub rank: u8,
    pub score: f64,
    pub why_match: String,
    pub difficulty: Difficulty,
    pub deadline: NaiveDate,
    pub amount_per_year: i64,
    pub url: String,
    pub todo: Vec<String>,
    pub digest: String,
    pub raw_json: Option<serde_json::Value>,
    pub strategy: MatchStrategy,
    pub saved: bool,
    pub created_at: DateTime<Utc>,
}
