use crate::models::{IncomeBand, Offer, Profile};

/// Income requirement literal meaning "no condition"
pub const NO_INCOME_CONDITION: &str = "条件なし";

/// Mandatory eligibility predicate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    Grade,
    Region,
    Income,
}

impl Gate {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gate::Grade => "grade",
            Gate::Region => "region",
            Gate::Income => "income",
        }
    }
}

/// Grade gate: an empty grade list is unrestricted
#[inline]
pub fn matches_grade(profile: &Profile, offer: &Offer) -> bool {
    offer.eligible_grades.is_empty() || offer.eligible_grades.contains(&profile.grade)
}

/// Region gate: an empty prefecture list means nationwide
#[inline]
pub fn matches_region(profile: &Profile, offer: &Offer) -> bool {
    offer.eligible_prefs.is_empty() || offer.eligible_prefs.contains(&profile.prefecture)
}

/// Income gate
///
/// Deliberately coarse: passes when the requirement is the "no condition"
/// literal, or when the band label appears verbatim inside the requirement
/// text. Requirements phrased as brackets ("世帯年収400万円未満") will not
/// match any band.
#[inline]
pub fn matches_income(income_band: IncomeBand, requirement: &str) -> bool {
    requirement == NO_INCOME_CONDITION || requirement.contains(income_band.label())
}

/// First mandatory gate the pair fails, checked in grade, region, income order
pub fn failed_gate(profile: &Profile, offer: &Offer) -> Option<Gate> {
    if !matches_grade(profile, offer) {
        return Some(Gate::Grade);
    }

    if !matches_region(profile, offer) {
        return Some(Gate::Region);
    }

    if !matches_income(profile.income_band, &offer.income_requirement) {
        return Some(Gate::Income);
    }

    None
}
