//! Reconciler (spec.md §4.3, C4): bidirectional sync between the Metrics
//! Store and the Review Store, plus a filesystem-scan import. Grounded on
//! the original `database/sync.py`'s `sync_databases`/`load_documents_from_fs`
//! shape, reworked into explicit, idempotent, injectable operations per
//! spec.md §9 ("Implicit filesystem-as-database import path ... keep it, but
//! make it explicit, idempotent, and invoked only from the Reconciler").

use chrono::Utc;
use skilllab_errors::Result;
use skilllab_store::{MetricsStore, ReviewStore};
use skilllab_types::{Document, DocumentStatus, Issue, IssueType, ReviewStatus, ValidatedRecord};
use skilllab_workspace::Workspace;
use tracing::info;

/// Counts produced by a sync or import pass, for CLI summaries and tests
/// (spec.md §8 property 3: sync idempotence).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncSummary {
    pub documents_synced: u32,
    pub issues_synced: u32,
    pub documents_imported: u32,
}

pub const MAX_CORRECTION_ATTEMPTS_DEFAULT: u32 = 3;

/// Scans `validated_json/` and `ocr_results/` under `workspace` for documents
/// not yet present in `review`, inserting flagged rows for the cases named
/// in spec.md §4.3.
pub async fn import_from_filesystem(
    workspace: &Workspace,
    review: &ReviewStore,
    max_correction_attempts: u32,
) -> Result<u32> {
    let mut imported = 0;

    if workspace.validated_json_dir().exists() {
        for entry in std::fs::read_dir(workspace.validated_json_dir())? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(doc_id) = doc_id_from_validated_filename(&path) else {
                continue;
            };
            if review.get_document(&doc_id).await?.is_some() {
                continue;
            }

            let text = std::fs::read_to_string(&path)?;
            let Ok(record) = serde_json::from_str::<ValidatedRecord>(&text) else {
                continue;
            };

            let flagged = !record.validation.is_valid
                || record.validation.correction_attempts >= max_correction_attempts;
            if !flagged {
                continue;
            }

            let now = Utc::now();
            let document = Document {
                doc_id: doc_id.clone(),
                filename: format!("{doc_id}.pdf"),
                status: DocumentStatus::Validated,
                ocr_confidence: None,
                json_confidence: None,
                correction_count: record.validation.correction_attempts,
                flagged_for_review: true,
                review_status: ReviewStatus::Pending,
                created_at: now,
                updated_at: now,
            };
            review.upsert_projection(&document).await?;

            if !record.validation.is_valid {
                review
                    .insert_issue_if_absent(&issue(&doc_id, IssueType::ValidationFailure, "Validation failed"))
                    .await?;
            }
            if record.validation.correction_attempts >= max_correction_attempts {
                review
                    .insert_issue_if_absent(&issue(
                        &doc_id,
                        IssueType::MultipleCorrections,
                        &format!("Document required {} correction attempts", record.validation.correction_attempts),
                    ))
                    .await?;
            }
            imported += 1;
        }
    }

    if workspace.ocr_results_dir().exists() {
        for entry in std::fs::read_dir(workspace.ocr_results_dir())? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(doc_id) = doc_id_from_ocr_filename(&path) else {
                continue;
            };
            if review.get_document(&doc_id).await?.is_some() {
                continue;
            }

            let text = std::fs::read_to_string(&path)?;
            let Ok(ocr) = serde_json::from_str::<skilllab_collab_compat::OcrResultOnDisk>(&text) else {
                continue;
            };
            let Some(mean_conf) = ocr.mean_element_confidence() else {
                continue;
            };
            let ocr_confidence = mean_conf * 100.0;
            if ocr_confidence >= 75.0 {
                continue;
            }

            let now = Utc::now();
            let document = Document {
                doc_id: doc_id.clone(),
                filename: format!("{doc_id}.pdf"),
                status: DocumentStatus::OcrComplete,
                ocr_confidence: Some(ocr_confidence),
                json_confidence: None,
                correction_count: 0,
                flagged_for_review: true,
                review_status: ReviewStatus::Pending,
                created_at: now,
                updated_at: now,
            };
            review.upsert_projection(&document).await?;
            review
                .insert_issue_if_absent(&issue(
                    &doc_id,
                    IssueType::LowOcrConfidence,
                    &format!("Confidence below threshold: {ocr_confidence:.1}%"),
                ))
                .await?;
            imported += 1;
        }
    }

    Ok(imported)
}

/// Bidirectional sync (spec.md §4.3). Idempotent: running twice in a row
/// produces the same end state and no duplicate rows (spec.md §8 property 3).
pub async fn sync(metrics: &MetricsStore, review: &ReviewStore) -> Result<SyncSummary> {
    let mut summary = SyncSummary::default();

    let metrics_documents = metrics.list_documents().await?;

    // Metrics -> Review: upsert flagged, non-terminal documents and diff issues.
    for document in &metrics_documents {
        if !document.flagged_for_review || document.review_status.is_terminal() {
            continue;
        }
        let existed = review.get_document(&document.doc_id).await?.is_some();
        review.upsert_projection(document).await?;
        if !existed {
            summary.documents_synced += 1;
        }

        for source_issue in metrics.list_issues(&document.doc_id).await? {
            if review.insert_issue_if_absent(&source_issue).await? {
                summary.issues_synced += 1;
            }
        }
    }

    // Review -> Metrics: terminal review documents push their status back.
    for document in &metrics_documents {
        let Some(review_doc) = review.get_document(&document.doc_id).await? else {
            continue;
        };
        if !review_doc.review_status.is_terminal() {
            continue;
        }
        if document.review_status != review_doc.review_status {
            metrics
                .set_review_status(&document.doc_id, review_doc.review_status)
                .await?;
        }
    }

    info!(
        documents_synced = summary.documents_synced,
        issues_synced = summary.issues_synced,
        "reconciler sync complete"
    );
    Ok(summary)
}

fn issue(doc_id: &str, issue_type: IssueType, details: &str) -> Issue {
    Issue {
        id: None,
        doc_id: doc_id.to_string(),
        issue_type,
        issue_details: details.to_string(),
    }
}

fn doc_id_from_validated_filename(path: &std::path::Path) -> Option<String> {
    path.file_stem()?
        .to_str()?
        .strip_suffix("_validated")
        .map(str::to_string)
}

fn doc_id_from_ocr_filename(path: &std::path::Path) -> Option<String> {
    path.file_stem()?.to_str()?.strip_suffix("_ocr").map(str::to_string)
}

/// A minimal re-projection of the OCR result shape needed for import,
/// avoiding a dependency cycle with `skilllab-collab` (which depends on
/// `skilllab-config`, not needed here).
mod skilllab_collab_compat {
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    pub struct TextElement {
        pub confidence: f64,
    }

    #[derive(Debug, Deserialize)]
    pub struct PageResult {
        #[serde(default)]
        pub text_elements: Vec<TextElement>,
    }

    #[derive(Debug, Deserialize)]
    pub struct OcrResultOnDisk {
        #[serde(default)]
        pub page_results: Vec<PageResult>,
    }

    impl OcrResultOnDisk {
        pub fn mean_element_confidence(&self) -> Option<f64> {
            let mut total = 0.0;
            let mut count = 0usize;
            for page in &self.page_results {
                for element in &page.text_elements {
                    total += element.confidence;
                    count += 1;
                }
            }
            if count == 0 {
                None
            } else {
                Some(total / count as f64)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::Utf8PathBuf;

    async fn setup() -> (MetricsStore, ReviewStore) {
        (
            MetricsStore::in_memory().await.unwrap(),
            ReviewStore::in_memory().await.unwrap(),
        )
    }

    #[tokio::test]
    async fn sync_is_idempotent() {
        let (metrics, review) = setup().await;
        metrics.register("alice", "alice.pdf").await.unwrap();
        metrics
            .flag("alice", IssueType::LowOcrConfidence, "Confidence below threshold: 60.0%")
            .await
            .unwrap();

        let first = sync(&metrics, &review).await.unwrap();
        let second = sync(&metrics, &review).await.unwrap();

        assert_eq!(first.documents_synced, 1);
        assert_eq!(first.issues_synced, 1);
        assert_eq!(second.documents_synced, 0);
        assert_eq!(second.issues_synced, 0);

        let issues = review.list_issues("alice").await.unwrap();
        assert_eq!(issues.len(), 1);
    }

    #[tokio::test]
    async fn terminal_review_status_flows_back_to_metrics() {
        let (metrics, review) = setup().await;
        metrics.register("alice", "alice.pdf").await.unwrap();
        metrics
            .flag("alice", IssueType::LowOcrConfidence, "low")
            .await
            .unwrap();
        sync(&metrics, &review).await.unwrap();

        review.set_review_status("alice", ReviewStatus::InProgress).await.unwrap();
        review.set_review_status("alice", ReviewStatus::Approved).await.unwrap();

        sync(&metrics, &review).await.unwrap();

        let doc = metrics.get_document("alice").await.unwrap().unwrap();
        assert_eq!(doc.review_status, ReviewStatus::Approved);
        assert!(!doc.flagged_for_review);
    }

    #[tokio::test]
    async fn import_skips_documents_already_in_review() {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        let workspace = Workspace::ensure(root).unwrap();
        let review = ReviewStore::in_memory().await.unwrap();

        let validated = serde_json::json!({
            "Name": null, "Email": null, "Phone": null, "Current_Position": null,
            "Skills": [], "Experience": [],
            "validation": {"is_valid": false, "coverage": 0.2, "correction_attempts": 3, "structure_valid": true},
            "image_paths": []
        });
        std::fs::write(workspace.validated_path("bob"), validated.to_string()).unwrap();

        let imported = import_from_filesystem(&workspace, &review, MAX_CORRECTION_ATTEMPTS_DEFAULT)
            .await
            .unwrap();
        assert_eq!(imported, 1);

        let imported_again = import_from_filesystem(&workspace, &review, MAX_CORRECTION_ATTEMPTS_DEFAULT)
            .await
            .unwrap();
        assert_eq!(imported_again, 0);
    }
}
