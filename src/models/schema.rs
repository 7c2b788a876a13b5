use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::models::domain::{Difficulty, MatchResult, MatchStrategy};

/// Most entries a ranked result set may hold
pub const MAX_RESULTS: usize = 5;

/// One ranked entry in the structured match response
///
/// This is the shape the remote model must return and the shape the
/// rule-based ranker produces, so both strategies persist identically.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchEntry {
    /// Catalog id resolved after the fact; never part of the wire schema
    #[serde(skip)]
    pub offer_id: Option<i64>,
    pub rank: u8,
    pub score: f64,
    pub name: String,
    pub provider: String,
    pub why_match: String,
    /// `YYYY-MM-DD`
    pub deadline: NaiveDate,
    pub amount_per_year: i64,
    pub required_docs: Vec<String>,
    pub difficulty: Difficulty,
    pub url: String,
    pub todo: Vec<String>,
}

/// Complete structured match response: up to five entries plus one digest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchSet {
    pub results: Vec<MatchEntry>,
    pub digest: String,
}

impl MatchSet {
    /// Check the ranking invariants the persisted set must hold
    ///
    /// Ranks must be exactly 1..k in order, k at most five, scores inside
    /// [0, 1] and non-increasing by rank, amounts non-negative.
    pub fn validate(&self) -> Result<(), String> {
        if self.results.len() > MAX_RESULTS {
            return Err(format!(
                "expected at most {} results, got {}",
                MAX_RESULTS,
                self.results.len()
            ));
        }

        let mut previous_score = f64::INFINITY;
        for (index, entry) in self.results.iter().enumerate() {
            let expected_rank = index + 1;
            if entry.rank as usize != expected_rank {
                return Err(format!(
                    "rank {} at position {} (expected {})",
                    entry.rank, index, expected_rank
                ));
            }
            if !entry.score.is_finite() || !(0.0..=1.0).contains(&entry.score) {
                return Err(format!("score {} out of range for rank {}", entry.score, entry.rank));
            }
            if entry.score > previous_score {
                return Err(format!("score increases at rank {}", entry.rank));
            }
            if entry.amount_per_year < 0 {
                return Err(format!("negative amount for rank {}", entry.rank));
            }
            previous_score = entry.score;
        }

        Ok(())
    }

    /// Convert into persisted rows for `profile_id`
    ///
    /// Every row carries the shared digest and its own entry as the audit
    /// payload.
    pub fn into_results(
        self,
        profile_id: Uuid,
        strategy: MatchStrategy,
        created_at: DateTime<Utc>,
    ) -> Vec<MatchResult> {
        let digest = self.digest;

        self.results
            .into_iter()
            .map(|entry| {
                let raw_json = serde_json::to_value(&entry).ok();
                MatchResult {
                    id: Uuid::new_v4(),
                    profile_id,
                    scholarship_id: entry.offer_id,
                    rank: entry.rank,
                    score: entry.score,
                    why_match: entry.why_match,
                    difficulty: entry.difficulty,
                    deadline: entry.deadline,
                    amount_per_year: entry.amount_per_year,
                    url: entry.url,
                    todo: entry.todo,
                    digest: digest.clone(),
                    raw_json,
                    strategy,
                    saved: false,
                    created_at,
                }
            })
            .collect()
    }
}

/// JSON schema handed to the model as its `responseSchema`
pub fn match_response_schema() -> Value {
    let string_list = json!({ "type": "ARRAY", "items": { "type": "STRING" } });

    json!({
        "type": "OBJECT",
        "properties": {
            "results": {
                "type": "ARRAY",
                "description": "Top scholarships for the user, best first (at most 5)",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "rank": { "type": "INTEGER", "description": "Rank from 1 to 5" },
                        "score": { "type": "NUMBER", "description": "Fitness score between 0.0 and 1.0" },
                        "name": { "type": "STRING", "description": "Official scholarship name, exactly as in the catalog" },
                        "provider": { "type": "STRING" },
                        "why_match": { "type": "STRING", "description": "Why this scholarship fits the user (about 100 characters)" },
                        "deadline": { "type": "STRING", "description": "Deadline as YYYY-MM-DD" },
                        "amount_per_year": { "type": "INTEGER", "description": "Annual amount in yen" },
                        "required_docs": string_list.clone(),
                        "difficulty": { "type": "STRING", "enum": ["Easy", "Medium", "Hard"] },
                        "url": { "type": "STRING" },
                        "todo": string_list
                    },
                    "required": [
                        "rank", "score", "name", "provider", "why_match", "deadline",
                        "amount_per_year", "required_docs", "difficulty", "url", "todo"
                    ]
                }
            },
            "digest": { "type": "STRING", "description": "One encouraging summary of the whole set (50 characters or less)" }
        },
        "required": ["results", "digest"]
    })
}
