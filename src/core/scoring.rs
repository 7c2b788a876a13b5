use chrono::NaiveDate;

use crate::core::filters::{failed_gate, Gate};
use crate::models::{Offer, Profile};

/// Marker in an offer's free-text requirements that targets applicants with
/// social-care history ("experienced persons")
pub const SOCIAL_CARE_MARKER: &str = "経験者";

/// Scores are kept to six decimal places so equal bonus totals compare equal
const SCORE_SCALE: f64 = 1e6;

/// Scoring weights and thresholds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoringWeights {
    /// Awarded once all mandatory gates pass
    pub base: f64,
    pub social_care: f64,
    pub major_match: f64,
    pub deadline: f64,
    pub high_amount: f64,
    /// Annual amount (yen) at or above which the high-amount bonus applies
    pub high_amount_threshold: i64,
    /// Deadline bonus window in days, inclusive
    pub deadline_window_days: i64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            base: 0.1,
            social_care: 0.5,
            major_match: 0.2,
            deadline: 0.1,
            high_amount: 0.3,
            high_amount_threshold: 500_000,
            deadline_window_days: 30,
        }
    }
}

/// Outcome of the mandatory gates for one pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eligibility {
    Eligible,
    Ineligible(Gate),
}

/// Score and eligibility of one (profile, offer) pair
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Evaluation {
    pub score: f64,
    pub eligibility: Eligibility,
}

impl Evaluation {
    pub fn is_eligible(&self) -> bool {
        self.eligibility == Eligibility::Eligible
    }
}

/// Rule-based fitness model for a profile against one offer
///
/// Scoring formula:
/// ```text
/// 0.0                                  if any mandatory gate fails
/// min(1.0,
///     0.1                              base, all gates passed
///   + 0.5 * social_care                profile has social-care history and
///                                      the offer text mentions 経験者
///   + 0.2 * major_match                profile major is in the offer fields
///   + 0.1 * deadline_soon              1..=30 days until the deadline
///   + 0.3 * high_amount)               amount_per_year >= 500,000
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct ScoringModel {
    weights: ScoringWeights,
}

impl ScoringModel {
    pub fn new(weights: ScoringWeights) -> Self {
        Self { weights }
    }

    pub fn weights(&self) -> &ScoringWeights {
        &self.weights
    }

    /// Score `offer` for `profile` as seen on `today`
    pub fn evaluate(&self, profile: &Profile, offer: &Offer, today: NaiveDate) -> Evaluation {
        if let Some(gate) = failed_gate(profile, offer) {
            return Evaluation {
                score: 0.0,
                eligibility: Eligibility::Ineligible(gate),
            };
        }

        let w = &self.weights;
        let mut score = w.base;

        let mentions_marker = offer
            .other_requirements
            .as_deref()
            .is_some_and(|text| text.contains(SOCIAL_CARE_MARKER));
        if profile.has_social_care && mentions_marker {
            score += w.social_care;
        }

        if offer.fields.contains(&profile.major) {
            score += w.major_match;
        }

        let days_to_deadline = (offer.deadline - today).num_days();
        if days_to_deadline > 0 && days_to_deadline <= w.deadline_window_days {
            score += w.deadline;
        }

        if offer.amount_per_year >= w.high_amount_threshold {
            score += w.high_amount;
        }

        Evaluation {
            score: (score.min(1.0) * SCORE_SCALE).round() / SCORE_SCALE,
            eligibility: Eligibility::Eligible,
        }
    }

    /// Score only; 0.0 means ineligible
    #[inline]
    pub fn score(&self, profile: &Profile, offer: &Offer, today: NaiveDate) -> f64 {
        self.evaluate(profile, offer, today).score
    }
}
