//! Step implementations (spec.md §4.7, C8): thin adapters binding the
//! external collaborators, the correction loop, and the quality policy to
//! the pipeline engine's [`skilllab_pipeline::Step`] trait.
//!
//! Grounded on the teacher's `Phase` implementors in `xchecker-phases`: each
//! step enumerates its input directory, processes documents independently,
//! and reports per-document failures into the shared context instead of
//! aborting (spec.md §7: "per-document failures are captured ... and do not
//! abort the step").

mod dataset_scoring;
mod extract;
mod structure;
mod validate;

pub use extract::ExtractStep;
pub use structure::StructureStep;
pub use validate::ValidateStep;

use skilllab_quality::{ContactEvidence, QualityInput, QualityThresholds};
use skilllab_types::Document;

/// Shared helper: runs the quality policy for `document` with `input` and
/// persists the resulting issues/flag via `store`, matching the pattern used
/// identically by all three steps (spec.md §4.7: "each step ... calls C5").
pub(crate) async fn apply_quality_policy(
    store: &skilllab_store::MetricsStore,
    document: &Document,
    input: &QualityInput<'_>,
    thresholds: QualityThresholds,
) -> skilllab_errors::Result<()> {
    let decision = skilllab_quality::evaluate(document, input, thresholds);
    for issue in &decision.issues {
        store
            .insert_issue_if_absent(issue)
            .await?;
    }
    if decision.should_flag {
        store.set_flagged(&document.doc_id, true).await?;
    }
    Ok(())
}

/// Default, no-evidence contact-evidence bundle used until source-text
/// scanning for contact patterns is wired up by the caller.
#[must_use]
pub(crate) fn contact_evidence_from_text(text: &str) -> ContactEvidence {
    ContactEvidence {
        name_evidence: !text.trim().is_empty(),
        email_evidence: text.contains('@'),
        phone_evidence: dataset_scoring::PHONE_PATTERN.is_match(text),
    }
}
