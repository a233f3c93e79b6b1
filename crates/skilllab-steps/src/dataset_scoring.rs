//! Shared scoring helpers used by more than one step.

use once_cell::sync::Lazy;
use regex::Regex;
use skilllab_types::ResumeRecord;

pub(crate) static PHONE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d{3}[-.\s]?\d{3}[-.\s]?\d{4}").unwrap());

/// Structure step completeness score (spec.md §4.7):
/// `(0.5*critical_field_coverage + 0.25*min(1,skills/10) + 0.25*min(1,experience/4)) * 100`.
#[must_use]
pub(crate) fn completeness_score(record: &ResumeRecord) -> f64 {
    let critical_present = [
        record.name.is_some(),
        record.email.is_some(),
        record.phone.is_some(),
    ]
    .iter()
    .filter(|p| **p)
    .count();
    let critical_field_coverage = critical_present as f64 / 3.0;
    let skills_term = (record.skills.len() as f64 / 10.0).min(1.0);
    let experience_term = (record.experience.len() as f64 / 4.0).min(1.0);
    (0.5 * critical_field_coverage + 0.25 * skills_term + 0.25 * experience_term) * 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_record_scores_zero() {
        assert_eq!(completeness_score(&ResumeRecord::default()), 0.0);
    }

    #[test]
    fn full_record_scores_one_hundred() {
        let record = ResumeRecord {
            name: Some("Alice".into()),
            email: Some("a@x".into()),
            phone: Some("555-0100".into()),
            current_position: Some("SE".into()),
            skills: vec!["a".into(); 10],
            experience: vec![Default::default(); 4],
        };
        assert_eq!(completeness_score(&record), 100.0);
    }

    #[test]
    fn partial_record_scores_between_bounds() {
        let record = ResumeRecord {
            name: Some("Alice".into()),
            ..Default::default()
        };
        let score = completeness_score(&record);
        assert!(score > 0.0 && score < 100.0);
    }
}
