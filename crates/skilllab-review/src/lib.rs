//! Review Workflow (spec.md §4.9, C10): the state machine a human reviewer
//! drives over a flagged document — list the queue, inspect one document,
//! approve or reject it (optionally editing fields first), save edits
//! without a terminal decision, and recycle an approved document straight
//! into the training set.
//!
//! Grounded on [`skilllab_store::ReviewStore`]'s existing review-side
//! primitives (`set_review_status`, `insert_review_feedback`,
//! `insert_field_correction`) plus [`skilllab_reconciler::sync`], which
//! spec.md §4.9 requires after every approve/reject so the Metrics Store
//! sees the decision.

use chrono::Utc;
use skilllab_errors::{Result, SkillLabError};
use skilllab_store::rows::DocumentDetail;
use skilllab_store::{MetricsStore, ReviewStore};
use skilllab_types::{
    Document, FieldCorrection, IssueType, ResumeRecord, ReviewFeedback, ReviewStatus, ValidatedRecord,
};
use skilllab_workspace::Workspace;
use tracing::{info, instrument};

/// One field a reviewer changed, carrying both sides so a
/// [`FieldCorrection`] row can be written only when they actually differ
/// (spec.md §4.9: "for each ... triple where corrected differs from
/// original").
#[derive(Debug, Clone)]
pub struct FieldEdit {
    pub field_name: String,
    pub original_value: Option<String>,
    pub corrected_value: Option<String>,
}

/// Full detail view for a single queue item (spec.md §4.9 "fetch details":
/// document row + issues + record payload + image paths).
#[derive(Debug, Clone)]
pub struct ReviewDetail {
    pub document: Document,
    pub issues: Vec<skilllab_types::Issue>,
    pub record: Option<ResumeRecord>,
    pub image_paths: Vec<String>,
}

/// Lists the review queue, optionally narrowed to a single issue type
/// (spec.md §4.9: "filter by issue type or 'All'"; `None` means "All").
pub async fn list_queue(review: &ReviewStore, issue_type: Option<IssueType>) -> Result<Vec<Document>> {
    review.list_queue(issue_type).await
}

/// Fetches the full review detail for one document, reading its validated
/// record off disk when present (a document can be queued for
/// `LowOcrConfidence` before a `validated_json` file ever exists).
pub async fn get_detail(review: &ReviewStore, workspace: &Workspace, doc_id: &str) -> Result<ReviewDetail> {
    let DocumentDetail { document, issues } = review.get_document_detail(doc_id).await?;
    let validated_path = workspace.validated_path(doc_id);
    let (record, image_paths) = match std::fs::read_to_string(&validated_path) {
        Ok(text) => {
            let validated: ValidatedRecord = serde_json::from_str(&text)?;
            (Some(validated.record), validated.image_paths)
        }
        Err(_) => (None, Vec::new()),
    };
    Ok(ReviewDetail {
        document,
        issues,
        record,
        image_paths,
    })
}

/// Persists field edits without recording a terminal decision (spec.md
/// §4.9: "save edits without terminal decision"). Writes a
/// [`FieldCorrection`] row for each edit whose value actually changed, but
/// no [`ReviewFeedback`] row — feedback is only recorded alongside
/// approve/reject.
#[instrument(skip(review, edits), fields(document_id = %doc_id))]
pub async fn save_edits(review: &ReviewStore, doc_id: &str, edits: &[FieldEdit]) -> Result<u32> {
    review.get_document(doc_id).await?.ok_or_else(|| SkillLabError::UnknownDocument {
        doc_id: doc_id.to_string(),
    })?;
    record_changed_fields(review, doc_id, edits).await
}

/// Approves a document, optionally applying field edits first (spec.md
/// §4.9: "approve (optional field edits)"). `changes_made` on the feedback
/// row reflects whether any edit actually changed a value, per spec.md's
/// "approval MAY record changes_made=false".
#[instrument(skip(metrics, review, edits), fields(document_id = %doc_id))]
pub async fn approve(
    metrics: &MetricsStore,
    review: &ReviewStore,
    doc_id: &str,
    edits: &[FieldEdit],
    reviewer: Option<String>,
) -> Result<()> {
    let changed = record_changed_fields(review, doc_id, edits).await?;
    advance_to_terminal(review, doc_id, ReviewStatus::Approved).await?;
    review
        .insert_review_feedback(&ReviewFeedback {
            id: None,
            doc_id: doc_id.to_string(),
            status: ReviewStatus::Approved,
            changes_made: changed > 0,
            reason: None,
            fields_corrected: changed_field_names(edits),
            timestamp: Utc::now(),
            reviewer,
        })
        .await?;
    let summary = skilllab_reconciler::sync(metrics, review).await?;
    info!(document_id = %doc_id, documents_synced = summary.documents_synced, "document approved");
    Ok(())
}

/// Rejects a document. Spec.md §4.9 requires a non-empty `reason`; an
/// empty or whitespace-only reason is refused before any row is written.
#[instrument(skip(metrics, review), fields(document_id = %doc_id))]
pub async fn reject(
    metrics: &MetricsStore,
    review: &ReviewStore,
    doc_id: &str,
    reason: String,
    reviewer: Option<String>,
) -> Result<()> {
    if reason.trim().is_empty() {
        return Err(SkillLabError::ValidationFailure {
            doc_id: doc_id.to_string(),
            detail: "rejection reason must not be empty".to_string(),
        });
    }
    advance_to_terminal(review, doc_id, ReviewStatus::Rejected).await?;
    review
        .insert_review_feedback(&ReviewFeedback {
            id: None,
            doc_id: doc_id.to_string(),
            status: ReviewStatus::Rejected,
            changes_made: false,
            reason: Some(reason),
            fields_corrected: Vec::new(),
            timestamp: Utc::now(),
            reviewer,
        })
        .await?;
    let summary = skilllab_reconciler::sync(metrics, review).await?;
    info!(document_id = %doc_id, documents_synced = summary.documents_synced, "document rejected");
    Ok(())
}

/// Appends a single approved document into `train/` without rebuilding the
/// whole dataset (spec.md §4.9 "recycle approved document to training";
/// §4.8 "Recycle-to-training"), then marks the document
/// `recycled_for_training` so status monotonicity (spec.md §8 property 1)
/// holds.
#[instrument(skip(metrics, review, workspace), fields(document_id = %doc_id))]
pub async fn recycle_to_training(
    metrics: &MetricsStore,
    review: &ReviewStore,
    workspace: &Workspace,
    doc_id: &str,
    task_name: &str,
    jpeg_quality: u8,
) -> Result<()> {
    let document = review.get_document(doc_id).await?.ok_or_else(|| SkillLabError::UnknownDocument {
        doc_id: doc_id.to_string(),
    })?;
    if document.review_status != ReviewStatus::Approved {
        return Err(SkillLabError::InvalidState {
            doc_id: doc_id.to_string(),
            detail: format!("only approved documents can be recycled, got {}", document.review_status),
        });
    }

    let validated_path = workspace.validated_path(doc_id);
    let text = std::fs::read_to_string(&validated_path).map_err(|e| SkillLabError::IoFailure {
        path: validated_path.clone().into_std_path_buf(),
        source: e,
    })?;
    let validated: ValidatedRecord = serde_json::from_str(&text)?;

    skilllab_dataset::recycle_approved_document(
        workspace,
        doc_id,
        &validated.record,
        &validated.image_paths,
        task_name,
        jpeg_quality,
    )?;

    metrics.set_status(doc_id, skilllab_types::DocumentStatus::RecycledForTraining).await?;
    if review.get_document(doc_id).await?.is_some() {
        review.set_status(doc_id, skilllab_types::DocumentStatus::RecycledForTraining).await?;
    }
    info!(document_id = %doc_id, "document recycled to training set");
    Ok(())
}

/// Pending documents must pass through `InProgress` before a terminal
/// decision (spec.md §4.1 review-status transitions, enforced by
/// [`ReviewStore::set_review_status`]); this makes that hop transparent to
/// callers who only ever see "approve" or "reject".
async fn advance_to_terminal(review: &ReviewStore, doc_id: &str, terminal: ReviewStatus) -> Result<()> {
    let document = review.get_document(doc_id).await?.ok_or_else(|| SkillLabError::UnknownDocument {
        doc_id: doc_id.to_string(),
    })?;
    if document.review_status == ReviewStatus::Pending {
        review.set_review_status(doc_id, ReviewStatus::InProgress).await?;
    }
    review.set_review_status(doc_id, terminal).await
}

async fn record_changed_fields(review: &ReviewStore, doc_id: &str, edits: &[FieldEdit]) -> Result<u32> {
    let mut changed = 0;
    for edit in edits {
        if edit.original_value == edit.corrected_value {
            continue;
        }
        review
            .insert_field_correction(&FieldCorrection {
                id: None,
                doc_id: doc_id.to_string(),
                field_name: edit.field_name.clone(),
                original_value: edit.original_value.clone(),
                corrected_value: edit.corrected_value.clone(),
                timestamp: Utc::now(),
            })
            .await?;
        changed += 1;
    }
    Ok(changed)
}

fn changed_field_names(edits: &[FieldEdit]) -> Vec<String> {
    edits
        .iter()
        .filter(|e| e.original_value != e.corrected_value)
        .map(|e| e.field_name.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::Utf8PathBuf;
    use skilllab_types::{DocumentStatus, ValidationBlock};

    async fn setup(doc_id: &str) -> (MetricsStore, ReviewStore, Workspace, tempfile::TempDir) {
        let metrics = MetricsStore::in_memory().await.unwrap();
        let review = ReviewStore::in_memory().await.unwrap();
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        let workspace = Workspace::ensure(root).unwrap();

        metrics.register(doc_id, &format!("{doc_id}.pdf")).await.unwrap();
        metrics.flag(doc_id, IssueType::LowOcrConfidence, "low confidence").await.unwrap();
        skilllab_reconciler::sync(&metrics, &review).await.unwrap();

        (metrics, review, workspace, dir)
    }

    #[tokio::test]
    async fn approve_records_feedback_and_syncs_back_to_metrics() {
        let (metrics, review, workspace, _dir) = setup("alice").await;

        approve(
            &metrics,
            &review,
            "alice",
            &[FieldEdit {
                field_name: "Name".into(),
                original_value: Some("Alice".into()),
                corrected_value: Some("Alice Smith".into()),
            }],
            Some("dana".into()),
        )
        .await
        .unwrap();

        let reviewed = review.get_document("alice").await.unwrap().unwrap();
        assert_eq!(reviewed.review_status, ReviewStatus::Approved);
        assert!(!reviewed.flagged_for_review);

        let corrections = review.list_field_corrections("alice").await.unwrap();
        assert_eq!(corrections.len(), 1);

        let synced = metrics.get_document("alice").await.unwrap().unwrap();
        assert_eq!(synced.review_status, ReviewStatus::Approved);
        assert!(!synced.flagged_for_review);

        let _ = workspace;
    }

    #[tokio::test]
    async fn reject_without_reason_is_refused() {
        let (metrics, review, _workspace, _dir) = setup("bob").await;
        let err = reject(&metrics, &review, "bob", "   ".into(), None).await.unwrap_err();
        assert!(matches!(err, SkillLabError::ValidationFailure { .. }));

        let untouched = review.get_document("bob").await.unwrap().unwrap();
        assert_eq!(untouched.review_status, ReviewStatus::Pending);
    }

    #[tokio::test]
    async fn reject_with_reason_marks_terminal_and_syncs() {
        let (metrics, review, _workspace, _dir) = setup("carl").await;
        reject(&metrics, &review, "carl", "Unreadable scan".into(), Some("dana".into()))
            .await
            .unwrap();

        let reviewed = review.get_document("carl").await.unwrap().unwrap();
        assert_eq!(reviewed.review_status, ReviewStatus::Rejected);

        let synced = metrics.get_document("carl").await.unwrap().unwrap();
        assert_eq!(synced.review_status, ReviewStatus::Rejected);
    }

    #[tokio::test]
    async fn save_edits_does_not_advance_review_status() {
        let (_metrics, review, _workspace, _dir) = setup("dana").await;
        let changed = save_edits(
            &review,
            "dana",
            &[FieldEdit {
                field_name: "Email".into(),
                original_value: None,
                corrected_value: Some("dana@example.com".into()),
            }],
        )
        .await
        .unwrap();
        assert_eq!(changed, 1);

        let untouched = review.get_document("dana").await.unwrap().unwrap();
        assert_eq!(untouched.review_status, ReviewStatus::Pending);
    }

    #[tokio::test]
    async fn recycle_requires_approval_and_is_idempotent_on_index() {
        let (metrics, review, workspace, _dir) = setup("erin").await;

        let image_path = workspace.image_path("erin", 0);
        std::fs::create_dir_all(image_path.parent().unwrap()).unwrap();
        image::RgbImage::new(4, 4).save(image_path.as_std_path()).unwrap();

        let validated = ValidatedRecord {
            record: ResumeRecord {
                name: Some("Erin".into()),
                ..Default::default()
            },
            validation: ValidationBlock {
                is_valid: true,
                coverage: 0.9,
                correction_attempts: 0,
                structure_valid: true,
            },
            image_paths: vec![image_path.to_string()],
        };
        std::fs::write(workspace.validated_path("erin"), serde_json::to_string(&validated).unwrap()).unwrap();
        metrics.set_status("erin", DocumentStatus::Validated).await.unwrap();

        let before_approve = recycle_to_training(&metrics, &review, &workspace, "erin", "resume", 95).await;
        assert!(before_approve.is_err());

        approve(&metrics, &review, "erin", &[], None).await.unwrap();

        recycle_to_training(&metrics, &review, &workspace, "erin", "resume", 95).await.unwrap();
        recycle_to_training(&metrics, &review, &workspace, "erin", "resume", 95).await.unwrap();

        let index = std::fs::read_to_string(workspace.donut_index_file("train").as_std_path()).unwrap();
        assert_eq!(index.lines().filter(|l| *l == "erin.json").count(), 1);

        let synced = metrics.get_document("erin").await.unwrap().unwrap();
        assert_eq!(synced.status, DocumentStatus::RecycledForTraining);
    }
}
