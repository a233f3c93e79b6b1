//! Review Store (spec.md §4.2, C3): a review-queue projection of Document +
//! Issue plus ReviewFeedback and the field-correction log.

use crate::common;
use crate::rows::{DashboardStats, DocumentDetail};
use crate::schema::apply_review_schema;
use chrono::Utc;
use skilllab_errors::Result;
use skilllab_types::{Document, DocumentStatus, FieldCorrection, Issue, IssueType, ReviewFeedback, ReviewStatus};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;

#[derive(Clone)]
pub struct ReviewStore {
    pool: SqlitePool,
}

impl ReviewStore {
    pub async fn connect(path: &str) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(8)
            .connect(&format!("sqlite://{path}?mode=rwc"))
            .await?;
        apply_review_schema(&pool).await?;
        Ok(Self { pool })
    }

    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        apply_review_schema(&pool).await?;
        Ok(Self { pool })
    }

    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Upserts the document projection used by the Reconciler (spec.md
    /// §4.3): creates the row if absent, otherwise leaves existing
    /// Review-side edits untouched beyond the fields the caller supplies.
    /// `review_status` is carried across too (the Reconciler only ever syncs
    /// non-terminal documents this way; a terminal status flows the other
    /// direction, Review -> Metrics), so a freshly-projected or re-synced row
    /// lands at the same `pending` state flagging gave it on the Metrics side
    /// rather than resetting to `none`.
    pub async fn upsert_projection(&self, document: &Document) -> Result<()> {
        let exists = common::get_document(&self.pool, &document.doc_id).await?;
        if exists.is_none() {
            common::register(&self.pool, &document.doc_id, &document.filename).await?;
        }
        sqlx::query(
            "UPDATE documents SET status = ?1, ocr_confidence = ?2, json_confidence = ?3, correction_count = ?4, flagged_for_review = ?5, review_status = ?6, updated_at = ?7 WHERE doc_id = ?8",
        )
        .bind(document.status.to_string())
        .bind(document.ocr_confidence)
        .bind(document.json_confidence)
        .bind(document.correction_count)
        .bind(document.flagged_for_review)
        .bind(document.review_status.to_string())
        .bind(Utc::now().to_rfc3339())
        .bind(&document.doc_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_document(&self, doc_id: &str) -> Result<Option<Document>> {
        common::get_document(&self.pool, doc_id).await
    }

    pub async fn get_document_detail(&self, doc_id: &str) -> Result<DocumentDetail> {
        common::get_document_detail(&self.pool, doc_id).await
    }

    pub async fn insert_issue_if_absent(&self, issue: &Issue) -> Result<bool> {
        common::insert_issue_if_absent(&self.pool, issue).await
    }

    pub async fn list_issues(&self, doc_id: &str) -> Result<Vec<Issue>> {
        common::list_issues(&self.pool, doc_id).await
    }

    pub async fn dashboard_stats(&self) -> Result<DashboardStats> {
        common::dashboard_stats(&self.pool).await
    }

    /// Lists the review queue, optionally filtered by issue type (spec.md
    /// §4.9 "list queue (filter by issue type or 'All')").
    pub async fn list_queue(&self, issue_type_filter: Option<IssueType>) -> Result<Vec<Document>> {
        let rows: Vec<crate::rows::DocumentRow> = if let Some(filter) = issue_type_filter {
            sqlx::query_as(
                "SELECT DISTINCT d.* FROM documents d JOIN issues i ON i.doc_id = d.doc_id WHERE d.flagged_for_review = 1 AND i.issue_type = ?1 ORDER BY d.doc_id",
            )
            .bind(filter.to_string())
            .fetch_all(&self.pool)
            .await?
        } else {
            sqlx::query_as("SELECT * FROM documents WHERE flagged_for_review = 1 ORDER BY doc_id")
                .fetch_all(&self.pool)
                .await?
        };
        rows.into_iter().map(crate::rows::DocumentRow::into_document).collect()
    }

    pub async fn set_review_status(&self, doc_id: &str, status: ReviewStatus) -> Result<()> {
        common::set_review_status(&self.pool, doc_id, status).await
    }

    pub async fn set_status(&self, doc_id: &str, status: DocumentStatus) -> Result<()> {
        common::set_status(&self.pool, doc_id, status).await
    }

    pub async fn insert_review_feedback(&self, feedback: &ReviewFeedback) -> Result<i64> {
        let result = sqlx::query(
            "INSERT INTO review_feedback (doc_id, status, changes_made, reason, fields_corrected, timestamp, reviewer) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )
        .bind(&feedback.doc_id)
        .bind(feedback.status.to_string())
        .bind(feedback.changes_made)
        .bind(&feedback.reason)
        .bind(feedback.fields_corrected.join(","))
        .bind(feedback.timestamp.to_rfc3339())
        .bind(&feedback.reviewer)
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    pub async fn insert_field_correction(&self, correction: &FieldCorrection) -> Result<i64> {
        let result = sqlx::query(
            "INSERT INTO field_corrections (doc_id, field_name, original_value, corrected_value, timestamp) VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(&correction.doc_id)
        .bind(&correction.field_name)
        .bind(&correction.original_value)
        .bind(&correction.corrected_value)
        .bind(correction.timestamp.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    pub async fn list_field_corrections(&self, doc_id: &str) -> Result<Vec<FieldCorrection>> {
        let rows: Vec<(i64, String, String, Option<String>, Option<String>, String)> = sqlx::query_as(
            "SELECT id, doc_id, field_name, original_value, corrected_value, timestamp FROM field_corrections WHERE doc_id = ?1 ORDER BY id",
        )
        .bind(doc_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter()
            .map(|(id, doc_id, field_name, original_value, corrected_value, timestamp)| {
                Ok(FieldCorrection {
                    id: Some(id),
                    doc_id,
                    field_name,
                    original_value,
                    corrected_value,
                    timestamp: crate::rows::parse_timestamp(&timestamp)?,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[tokio::test]
    async fn upsert_projection_creates_then_updates() {
        let store = ReviewStore::in_memory().await.unwrap();
        let mut doc = Document {
            doc_id: "alice".into(),
            filename: "alice.pdf".into(),
            status: DocumentStatus::OcrComplete,
            ocr_confidence: Some(60.0),
            json_confidence: None,
            correction_count: 0,
            flagged_for_review: true,
            review_status: ReviewStatus::Pending,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        store.upsert_projection(&doc).await.unwrap();
        doc.ocr_confidence = Some(70.0);
        store.upsert_projection(&doc).await.unwrap();
        let stored = store.get_document("alice").await.unwrap().unwrap();
        assert_eq!(stored.ocr_confidence, Some(70.0));
    }

    #[tokio::test]
    async fn approve_inserts_feedback_and_field_correction() {
        let store = ReviewStore::in_memory().await.unwrap();
        store.upsert_projection(&Document {
            doc_id: "alice".into(),
            filename: "alice.pdf".into(),
            status: DocumentStatus::Validated,
            ocr_confidence: Some(86.0),
            json_confidence: Some(95.0),
            correction_count: 0,
            flagged_for_review: true,
            review_status: ReviewStatus::Pending,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }).await.unwrap();

        store.insert_review_feedback(&ReviewFeedback {
            id: None,
            doc_id: "alice".into(),
            status: ReviewStatus::Approved,
            changes_made: true,
            reason: None,
            fields_corrected: vec!["Name".into()],
            timestamp: Utc::now(),
            reviewer: Some("dana".into()),
        }).await.unwrap();

        store.insert_field_correction(&FieldCorrection {
            id: None,
            doc_id: "alice".into(),
            field_name: "Name".into(),
            original_value: Some("Alice".into()),
            corrected_value: Some("Alice Smith".into()),
            timestamp: Utc::now(),
        }).await.unwrap();

        let corrections = store.list_field_corrections("alice").await.unwrap();
        assert_eq!(corrections.len(), 1);
        assert_eq!(corrections[0].corrected_value.as_deref(), Some("Alice Smith"));
    }
}
