use chrono::NaiveDate;
use std::cmp::Ordering;

use crate::core::scoring::ScoringModel;
use crate::models::{MatchEntry, MatchSet, Offer, Profile, MAX_RESULTS};

/// Digest attached to every fallback result set
pub const FALLBACK_DIGEST: &str = "AI失敗時の代替結果です。期限の近いものから検討してください。";

/// Action appended after an offer's required documents
pub const FALLBACK_CLOSING_TODO: &str = "学校の奨学金窓口に相談する";

/// Deterministic failsafe ranker
///
/// # Pipeline Stages
/// 1. Score every offer with the [`ScoringModel`]
/// 2. Drop ineligible offers (score 0.0)
/// 3. Sort by score, then nearest deadline, then catalog id
/// 4. Keep the top five and render template explanations
#[derive(Debug, Clone, Default)]
pub struct RuleBasedRanker {
    model: ScoringModel,
}

struct Scored<'a> {
    offer: &'a Offer,
    score: f64,
}

impl RuleBasedRanker {
    pub fn new(model: ScoringModel) -> Self {
        Self { model }
    }

    pub fn model(&self) -> &ScoringModel {
        &self.model
    }

    /// Rank `offers` for `profile` as of `today`
    ///
    /// Never fails: an empty or fully ineligible catalog yields an empty set
    /// carrying the fallback digest.
    pub fn rank(&self, profile: &Profile, offers: &[Offer], today: NaiveDate) -> MatchSet {
        let mut scored: Vec<Scored<'_>> = offers
            .iter()
            .filter_map(|offer| {
                let score = self.model.score(profile, offer, today);
                (score > 0.0).then_some(Scored { offer, score })
            })
            .collect();

        // Score descending, then nearer deadline first; id keeps ties stable
        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.offer.deadline.cmp(&b.offer.deadline))
                .then_with(|| a.offer.id.cmp(&b.offer.id))
        });

        scored.truncate(MAX_RESULTS);

        let results = scored
            .into_iter()
            .enumerate()
            .map(|(index, s)| self.entry(profile, s, index + 1))
            .collect();

        MatchSet {
            results,
            digest: FALLBACK_DIGEST.to_string(),
        }
    }

    fn entry(&self, profile: &Profile, scored: Scored<'_>, rank: usize) -> MatchEntry {
        let offer = scored.offer;

        let why_match = format!(
            "（ルールベース）あなたの{}と{}に合致し、スコアは{:.2}です。まずは必要書類の準備を進めましょう。",
            profile.grade, profile.prefecture, scored.score
        );

        let mut todo = offer.required_docs.clone();
        todo.push(FALLBACK_CLOSING_TODO.to_string());

        MatchEntry {
            offer_id: Some(offer.id),
            rank: rank as u8,
            score: scored.score,
            name: offer.name.clone(),
            provider: offer.provider.clone(),
            why_match,
            deadline: offer.deadline,
            amount_per_year: offer.amount_per_year,
            required_docs: offer.required_docs.clone(),
            difficulty: offer.difficulty_hint,
            url: offer.url.clone(),
            todo,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::filters::NO_INCOME_CONDITION;
    use crate::models::{Difficulty, Grade, IncomeBand};
    use chrono::{Duration, Utc};
    use uuid::Uuid;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 1).unwrap()
    }

    fn create_profile() -> Profile {
        Profile {
            id: Uuid::new_v4(),
            grade: Grade::University1st,
            prefecture: "Tokyo".to_string(),
            income_band: IncomeBand::From300To500,
            school_band: None,
            major: "CS".to_string(),
            gender: None,
            has_social_care: false,
            target_period: "2026".to_string(),
            has_volunteer: false,
            has_cram: false,
            created_at: Utc::now(),
        }
    }

    fn create_offer(id: i64, amount: i64, days_to_deadline: i64) -> Offer {
        Offer {
            id,
            name: format!("Offer {}", id),
            provider: "Provider".to_string(),
            category: "財団".to_string(),
            offer_type: "給付".to_string(),
            amount_per_year: amount,
            period: "1年".to_string(),
            eligible_grades: vec![],
            eligible_prefs: vec![],
            fields: vec![],
            income_requirement: NO_INCOME_CONDITION.to_string(),
            other_requirements: None,
            deadline: today() + Duration::days(days_to_deadline),
            required_docs: vec!["在学証明書".to_string()],
            application_method: "Web".to_string(),
            difficulty_hint: Difficulty::Easy,
            url: format!("https://example.org/{}", id),
            contact: None,
            is_published: true,
            last_checked: Utc::now(),
            source: None,
        }
    }

    #[test]
    fn test_example_scenario() {
        let ranker = RuleBasedRanker::default();
        let a = create_offer(1, 600_000, 10);
        let mut b = create_offer(2, 100_000, 10);
        b.eligible_grades = vec![Grade::HighSchool1st];

        let set = ranker.rank(&create_profile(), &[a, b], today());

        assert_eq!(set.results.len(), 1);
        assert_eq!(set.results[0].rank, 1);
        assert_eq!(set.results[0].offer_id, Some(1));
        assert!((set.results[0].score - 0.5).abs() < 1e-9);
        assert_eq!(set.digest, FALLBACK_DIGEST);
    }

    #[test]
    fn test_tie_broken_by_nearer_deadline() {
        let ranker = RuleBasedRanker::default();
        let offers = vec![
            create_offer(1, 100_000, 80),
            create_offer(2, 100_000, 40),
            create_offer(3, 100_000, 60),
        ];

        let set = ranker.rank(&create_profile(), &offers, today());
        let ids: Vec<_> = set.results.iter().map(|r| r.offer_id).collect();

        assert_eq!(ids, vec![Some(2), Some(3), Some(1)]);
    }

    #[test]
    fn test_mixed_bonus_tie_broken_by_deadline() {
        let ranker = RuleBasedRanker::default();
        let mut profile = create_profile();
        profile.has_social_care = true;

        let mut social = create_offer(1, 100_000, 40);
        social.other_requirements = Some("社会的養護経験者".to_string());
        let mut major_and_amount = create_offer(2, 500_000, 60);
        major_and_amount.fields = vec!["CS".to_string()];

        let set = ranker.rank(&profile, &[major_and_amount, social], today());
        let ids: Vec<_> = set.results.iter().map(|r| r.offer_id).collect();

        assert_eq!(ids, vec![Some(1), Some(2)]);
        assert_eq!(set.results[0].score, 0.6);
        assert_eq!(set.results[1].score, 0.6);
    }

    #[test]
    fn test_respects_top_five() {
        let ranker = RuleBasedRanker::default();
        let offers: Vec<Offer> = (0..12).map(|i| create_offer(i, 100_000 * i, 45)).collect();

        let set = ranker.rank(&create_profile(), &offers, today());

        assert_eq!(set.results.len(), 5);
        let ranks: Vec<u8> = set.results.iter().map(|r| r.rank).collect();
        assert_eq!(ranks, vec![1, 2, 3, 4, 5]);
        assert!(set.validate().is_ok());
    }

    #[test]
    fn test_todo_and_explanation_template() {
        let ranker = RuleBasedRanker::default();
        let set = ranker.rank(&create_profile(), &[create_offer(1, 0, 90)], today());
        let entry = &set.results[0];

        assert_eq!(entry.todo, vec!["在学証明書".to_string(), FALLBACK_CLOSING_TODO.to_string()]);
        assert!(entry.why_match.contains("University_1st"));
        assert!(entry.why_match.contains("Tokyo"));
        assert!(entry.why_match.contains("0.10"));
    }

    #[test]
    fn test_empty_catalog_yields_empty_set() {
        let ranker = RuleBasedRanker::default();
        let set = ranker.rank(&create_profile(), &[], today());

        assert!(set.results.is_empty());
        assert_eq!(set.digest, FALLBACK_DIGEST);
    }
}
