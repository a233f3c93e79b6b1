//! Quality Policy (spec.md §4.4, C5) — a pure function from a document's
//! current state plus optional new signals to a set of issues and a flag
//! decision. No I/O; callers (the steps in `skilllab-steps`) persist the
//! result.

use skilllab_types::{Document, Issue, IssueType};

/// Thresholds the policy is parameterized over (spec.md §4.4, §6.4).
#[derive(Debug, Clone, Copy)]
pub struct QualityThresholds {
    pub min_ocr_confidence: f64,
    pub min_json_confidence: f64,
    pub max_correction_attempts_before_flag: u32,
    pub min_coverage_threshold: f64,
}

impl Default for QualityThresholds {
    fn default() -> Self {
        Self {
            min_ocr_confidence: 75.0,
            min_json_confidence: 75.0,
            max_correction_attempts_before_flag: 3,
            min_coverage_threshold: 0.9,
        }
    }
}

/// Evidence of contact fields present in the OCR source text, used by rule 4
/// (spec.md §4.4) to distinguish "missing because absent" from "missing
/// because extraction failed".
#[derive(Debug, Clone, Copy, Default)]
pub struct ContactEvidence {
    pub name_evidence: bool,
    pub email_evidence: bool,
    pub phone_evidence: bool,
}

/// Optional new signals arriving this evaluation; `None` means "unchanged,
/// consult `document`".
#[derive(Debug, Clone, Default)]
pub struct QualityInput<'a> {
    pub new_ocr_confidence: Option<f64>,
    pub new_json_confidence: Option<f64>,
    pub new_correction_count: Option<u32>,
    pub structure_valid: Option<bool>,
    pub coverage_after_max_attempts: Option<f64>,
    pub extracted_name: Option<&'a Option<String>>,
    pub extracted_email: Option<&'a Option<String>>,
    pub extracted_phone: Option<&'a Option<String>>,
    pub contact_evidence: ContactEvidence,
}

#[derive(Debug, Clone, Default)]
pub struct QualityDecision {
    pub issues: Vec<Issue>,
    pub should_flag: bool,
}

/// Evaluates the six ordered rules of spec.md §4.4 against `document` and
/// the new signals in `input`, returning the issues to raise and whether
/// the document should be flagged for review.
#[must_use]
pub fn evaluate(
    document: &Document,
    input: &QualityInput<'_>,
    thresholds: QualityThresholds,
) -> QualityDecision {
    let mut issues = Vec::new();
    let mut should_flag = false;

    let ocr_confidence = input.new_ocr_confidence.or(document.ocr_confidence);
    let json_confidence = input.new_json_confidence.or(document.json_confidence);
    let correction_count = input
        .new_correction_count
        .unwrap_or(document.correction_count);

    // Rule 1: low OCR confidence.
    if let Some(conf) = ocr_confidence {
        if conf < thresholds.min_ocr_confidence {
            issues.push(make_issue(
                document,
                IssueType::LowOcrConfidence,
                format!("Confidence below threshold: {conf:.1}%"),
            ));
            should_flag = true;
        }
    }

    // Rule 2: low JSON confidence.
    if let Some(conf) = json_confidence {
        if conf < thresholds.min_json_confidence {
            issues.push(make_issue(
                document,
                IssueType::LowJsonConfidence,
                format!("Confidence below threshold: {conf:.1}%"),
            ));
            should_flag = true;
        }
    }

    // Rule 3: repeated corrections.
    if correction_count >= thresholds.max_correction_attempts_before_flag {
        issues.push(make_issue(
            document,
            IssueType::MultipleCorrections,
            format!("Document required {correction_count} correction attempts"),
        ));
        should_flag = true;
    }

    // Rule 4: missing contact fields with source evidence.
    let mut missing = Vec::new();
    if input.contact_evidence.name_evidence
        && input.extracted_name.map(|v| v.is_none()).unwrap_or(false)
    {
        missing.push("Name");
    }
    if input.contact_evidence.email_evidence
        && input.extracted_email.map(|v| v.is_none()).unwrap_or(false)
    {
        missing.push("Email");
    }
    if input.contact_evidence.phone_evidence
        && input.extracted_phone.map(|v| v.is_none()).unwrap_or(false)
    {
        missing.push("Phone");
    }
    if !missing.is_empty() {
        issues.push(make_issue(
            document,
            IssueType::MissingContact,
            format!("Missing fields with evidence in source text: {}", missing.join(", ")),
        ));
        should_flag = true;
    }

    // Rule 5: structural validity.
    if input.structure_valid == Some(false) {
        issues.push(make_issue(
            document,
            IssueType::SchemaValidation,
            "Record does not satisfy the required schema shape".to_string(),
        ));
        should_flag = true;
    }

    // Rule 6: coverage below threshold after max attempts.
    if let Some(coverage) = input.coverage_after_max_attempts {
        if coverage < thresholds.min_coverage_threshold {
            issues.push(make_issue(
                document,
                IssueType::ValidationFailure,
                format!("Coverage {:.1}% below required threshold", coverage * 100.0),
            ));
            should_flag = true;
        }
    }

    QualityDecision {
        issues,
        should_flag,
    }
}

fn make_issue(document: &Document, issue_type: IssueType, details: String) -> Issue {
    Issue {
        id: None,
        doc_id: document.doc_id.clone(),
        issue_type,
        issue_details: details,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use skilllab_types::{DocumentStatus, ReviewStatus};

    fn base_document() -> Document {
        Document {
            doc_id: "alice".into(),
            filename: "alice.pdf".into(),
            status: DocumentStatus::Registered,
            ocr_confidence: None,
            json_confidence: None,
            correction_count: 0,
            flagged_for_review: false,
            review_status: ReviewStatus::None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn low_ocr_confidence_flags_and_raises_issue() {
        let doc = base_document();
        let input = QualityInput {
            new_ocr_confidence: Some(60.0),
            ..Default::default()
        };
        let decision = evaluate(&doc, &input, QualityThresholds::default());
        assert!(decision.should_flag);
        assert_eq!(decision.issues.len(), 1);
        assert_eq!(decision.issues[0].issue_type, IssueType::LowOcrConfidence);
        assert!(decision.issues[0]
            .issue_details
            .starts_with("Confidence below threshold"));
    }

    #[test]
    fn high_confidence_raises_nothing() {
        let doc = base_document();
        let input = QualityInput {
            new_ocr_confidence: Some(86.0),
            ..Default::default()
        };
        let decision = evaluate(&doc, &input, QualityThresholds::default());
        assert!(!decision.should_flag);
        assert!(decision.issues.is_empty());
    }

    #[test]
    fn three_corrections_triggers_multiple_corrections_issue() {
        let doc = base_document();
        let input = QualityInput {
            new_correction_count: Some(3),
            ..Default::default()
        };
        let decision = evaluate(&doc, &input, QualityThresholds::default());
        assert!(decision.should_flag);
        assert!(decision
            .issues
            .iter()
            .any(|i| i.issue_type == IssueType::MultipleCorrections));
    }

    proptest::proptest! {
        #[test]
        fn ocr_confidence_at_or_above_threshold_never_flags_via_rule_1(conf in 75.0f64..=100.0) {
            let doc = base_document();
            let input = QualityInput { new_ocr_confidence: Some(conf), ..Default::default() };
            let decision = evaluate(&doc, &input, QualityThresholds::default());
            assert!(!decision.issues.iter().any(|i| i.issue_type == IssueType::LowOcrConfidence));
        }
    }
}
