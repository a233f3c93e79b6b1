//! Auto-Correction Loop (spec.md §4.5, C6): bounded retry of structured-
//! output generation against a coverage predicate.

pub mod coverage;

pub use coverage::{coverage_score, structure_valid};

use once_cell::sync::Lazy;
use regex::Regex;
use skilllab_collab::{StructureCollaborator, extract_first_json_object};
use skilllab_errors::Result;
use skilllab_templates::correction_prompt;

static PHONE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d{3}[-.\s]?\d{3}[-.\s]?\d{4}").unwrap());

/// Outcome of running the correction loop to convergence or exhaustion.
#[derive(Debug, Clone)]
pub struct CorrectionOutcome {
    pub record: serde_json::Value,
    pub is_valid: bool,
    pub attempts: u32,
    pub coverage: f64,
}

/// Lists the problems `enumerate_problems` would report for `record` against
/// `source_text` at the given `coverage` (spec.md §4.5).
#[must_use]
pub fn enumerate_problems(
    record: &serde_json::Value,
    source_text: &str,
    coverage: f64,
    threshold: f64,
) -> Vec<String> {
    let mut issues = vec![format!("Low text coverage ({coverage:.2} < {threshold})")];

    let obj = record.as_object();
    let name_present = obj
        .and_then(|o| o.get("Name"))
        .is_some_and(|v| !v.is_null());
    let email_present = obj
        .and_then(|o| o.get("Email"))
        .is_some_and(|v| !v.is_null());
    let phone_present = obj
        .and_then(|o| o.get("Phone"))
        .is_some_and(|v| !v.is_null());
    let skills_len = obj
        .and_then(|o| o.get("Skills"))
        .and_then(|v| v.as_array())
        .map_or(0, |a| a.len());
    let experience_len = obj
        .and_then(|o| o.get("Experience"))
        .and_then(|v| v.as_array())
        .map_or(0, |a| a.len());

    if !name_present {
        issues.push("Missing Name field".to_string());
    }
    if !email_present && source_text.contains('@') {
        issues.push("Missing Email field".to_string());
    }
    if !phone_present && PHONE_PATTERN.is_match(source_text) {
        issues.push("Missing Phone field".to_string());
    }
    if skills_len < 3 && source_text.len() > 500 {
        issues.push("Few or no Skills extracted".to_string());
    }
    if experience_len == 0 && source_text.len() > 500 {
        issues.push("No Experience entries extracted".to_string());
    }

    if issues.len() == 1 {
        issues.push("Extract more information from the resume text".to_string());
    }
    issues
}

/// Runs the loop in spec.md §4.5 to convergence or until `max_attempts` is
/// exhausted, calling `collaborator.generate` for each regeneration.
///
/// A transport error counts as an attempt iff it returns a syntactically
/// valid but empty record (spec.md §4.5); a hard transport failure is
/// propagated immediately rather than silently consumed as an attempt.
pub async fn run_correction_loop(
    collaborator: &dyn StructureCollaborator,
    initial_record: serde_json::Value,
    source_text: &str,
    min_coverage_threshold: f64,
    max_attempts: u32,
) -> Result<CorrectionOutcome> {
    let mut current = initial_record;
    let mut attempts = 0u32;
    let mut coverage;

    loop {
        coverage = coverage_score(&current, source_text);
        let valid = coverage >= min_coverage_threshold && structure_valid(&current);
        if valid || attempts >= max_attempts {
            return Ok(CorrectionOutcome {
                record: current,
                is_valid: valid,
                attempts,
                coverage,
            });
        }

        let issues = enumerate_problems(&current, source_text, coverage, min_coverage_threshold);
        let prompt = correction_prompt(source_text, &current.to_string(), &issues);
        let response = collaborator.generate(&prompt).await?;

        current = extract_first_json_object(&response).unwrap_or_else(|| current.clone());
        attempts += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    struct StubCollaborator {
        responses: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl StructureCollaborator for StubCollaborator {
        async fn generate(&self, _prompt: &str) -> Result<String> {
            let mut responses = self.responses.lock().unwrap();
            Ok(if responses.is_empty() {
                "{}".to_string()
            } else {
                responses.remove(0)
            })
        }

        async fn list_models(&self) -> Result<Vec<String>> {
            Ok(vec![])
        }
    }

    #[tokio::test]
    async fn converges_immediately_when_coverage_already_met() {
        let record = json!({
            "Name": "Alice", "Email": "a@x", "Phone": "555-0100", "Current_Position": "SE",
            "Skills": ["Rust"], "Experience": []
        });
        let collaborator = StubCollaborator {
            responses: Mutex::new(vec![]),
        };
        let outcome = run_correction_loop(&collaborator, record, "Alice Rust", 0.1, 3)
            .await
            .unwrap();
        assert!(outcome.is_valid);
        assert_eq!(outcome.attempts, 0);
    }

    #[tokio::test]
    async fn stops_at_max_attempts_when_never_converging() {
        let record = json!({
            "Name": null, "Email": null, "Phone": null, "Current_Position": null,
            "Skills": [], "Experience": []
        });
        let collaborator = StubCollaborator {
            responses: Mutex::new(vec!["{}".into(), "{}".into(), "{}".into()]),
        };
        let outcome = run_correction_loop(&collaborator, record, "completely unrelated text body", 0.99, 3)
            .await
            .unwrap();
        assert!(!outcome.is_valid);
        assert_eq!(outcome.attempts, 3);
    }

    #[tokio::test]
    async fn no_op_regenerate_keeps_coverage_unchanged_and_stops_at_max() {
        let record = json!({"Name": "Alice"});
        let collaborator = StubCollaborator {
            responses: Mutex::new(vec![record.to_string(), record.to_string(), record.to_string()]),
        };
        let outcome = run_correction_loop(&collaborator, record.clone(), "Alice went to the market", 0.99, 3)
            .await
            .unwrap();
        let expected_coverage = coverage_score(&record, "Alice went to the market");
        assert_eq!(outcome.coverage, expected_coverage);
        assert_eq!(outcome.attempts, 3);
    }

    #[test]
    fn enumerate_problems_adds_generic_instruction_when_only_coverage_fires() {
        let record = json!({
            "Name": "Alice", "Email": "a@x", "Phone": "555-0100",
            "Skills": ["a", "b", "c"], "Experience": [{"company":"A"}]
        });
        let problems = enumerate_problems(&record, "short text", 0.1, 0.9);
        assert_eq!(problems.len(), 2);
        assert!(problems[1].contains("Extract more information"));
    }
}
