//! Document/Issue operations shared by the Metrics Store and the Review
//! Store (spec.md §4.2: "Contract is identical storage primitives").

use crate::rows::{DashboardStats, DocumentDetail, DocumentRow, IssueRow};
use chrono::Utc;
use skilllab_errors::{Result, SkillLabError};
use skilllab_types::{Document, DocumentStatus, Issue, IssueType, ReviewStatus};
use sqlx::SqlitePool;

/// Idempotent upsert; on re-registration updates `filename` and `updated_at`
/// only (spec.md §4.1 `register`).
pub async fn register(pool: &SqlitePool, doc_id: &str, filename: &str) -> Result<()> {
    let now = Utc::now().to_rfc3339();
    sqlx::query(
        "INSERT INTO documents (doc_id, filename, status, correction_count, flagged_for_review, review_status, created_at, updated_at)
         VALUES (?1, ?2, ?3, 0, 0, ?4, ?5, ?5)
         ON CONFLICT(doc_id) DO UPDATE SET filename = excluded.filename, updated_at = excluded.updated_at",
    )
    .bind(doc_id)
    .bind(filename)
    .bind(DocumentStatus::Registered.to_string())
    .bind(ReviewStatus::None.to_string())
    .bind(&now)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn get_document(pool: &SqlitePool, doc_id: &str) -> Result<Option<Document>> {
    let row: Option<DocumentRow> = sqlx::query_as("SELECT * FROM documents WHERE doc_id = ?1")
        .bind(doc_id)
        .fetch_optional(pool)
        .await?;
    row.map(DocumentRow::into_document).transpose()
}

pub async fn require_document(pool: &SqlitePool, doc_id: &str) -> Result<Document> {
    get_document(pool, doc_id)
        .await?
        .ok_or_else(|| SkillLabError::UnknownDocument {
            doc_id: doc_id.to_string(),
        })
}

/// Forward-only status update (spec.md §3 invariant, §8 property 1).
pub async fn set_status(pool: &SqlitePool, doc_id: &str, status: DocumentStatus) -> Result<()> {
    let current = require_document(pool, doc_id).await?;
    if status.rank() < current.status.rank() {
        return Err(SkillLabError::InvalidState {
            doc_id: doc_id.to_string(),
            detail: format!(
                "cannot move status backward from {} to {}",
                current.status, status
            ),
        });
    }
    let now = Utc::now().to_rfc3339();
    sqlx::query("UPDATE documents SET status = ?1, updated_at = ?2 WHERE doc_id = ?3")
        .bind(status.to_string())
        .bind(&now)
        .bind(doc_id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn set_confidence(
    pool: &SqlitePool,
    doc_id: &str,
    ocr: Option<f64>,
    json: Option<f64>,
) -> Result<()> {
    require_document(pool, doc_id).await?;
    let now = Utc::now().to_rfc3339();
    if let Some(ocr) = ocr {
        sqlx::query("UPDATE documents SET ocr_confidence = ?1, updated_at = ?2 WHERE doc_id = ?3")
            .bind(ocr)
            .bind(&now)
            .bind(doc_id)
            .execute(pool)
            .await?;
    }
    if let Some(json) = json {
        sqlx::query("UPDATE documents SET json_confidence = ?1, updated_at = ?2 WHERE doc_id = ?3")
            .bind(json)
            .bind(&now)
            .bind(doc_id)
            .execute(pool)
            .await?;
    }
    Ok(())
}

pub async fn bump_correction_count(pool: &SqlitePool, doc_id: &str) -> Result<u32> {
    require_document(pool, doc_id).await?;
    let now = Utc::now().to_rfc3339();
    sqlx::query(
        "UPDATE documents SET correction_count = correction_count + 1, updated_at = ?1 WHERE doc_id = ?2",
    )
    .bind(&now)
    .bind(doc_id)
    .execute(pool)
    .await?;
    let doc = require_document(pool, doc_id).await?;
    Ok(doc.correction_count)
}

/// Sets the flag and enqueues an [`Issue`] (spec.md §4.1 `flag`). Raising
/// the flag also advances `review_status` from `none` to `pending`
/// (spec.md §4.1 state machine `none --flag--> pending`; S2; the original
/// `database/metrics_db.py`'s `flag_for_review` sets both fields together).
/// A document already past `none` (`pending`, `in_progress`, or a terminal
/// status) keeps its current `review_status`.
pub async fn flag(pool: &SqlitePool, doc_id: &str, issue_type: IssueType, details: &str) -> Result<()> {
    require_document(pool, doc_id).await?;
    let now = Utc::now().to_rfc3339();
    let mut tx = pool.begin().await?;
    sqlx::query(
        "UPDATE documents SET flagged_for_review = 1, review_status = CASE WHEN review_status = ?1 THEN ?2 ELSE review_status END, updated_at = ?3 WHERE doc_id = ?4",
    )
    .bind(ReviewStatus::None.to_string())
    .bind(ReviewStatus::Pending.to_string())
    .bind(&now)
    .bind(doc_id)
    .execute(&mut *tx)
    .await?;
    sqlx::query("INSERT INTO issues (doc_id, issue_type, issue_details) VALUES (?1, ?2, ?3)")
        .bind(doc_id)
        .bind(issue_type.to_string())
        .bind(details)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;
    Ok(())
}

/// Sets `flagged_for_review` directly, independent of issue insertion; used
/// by the quality policy caller, which inserts its own issues separately
/// via [`insert_issue_if_absent`] (spec.md §4.4). Raising the flag
/// (`flagged = true`) advances `review_status` from `none` to `pending`,
/// same as [`flag`]; clearing it leaves `review_status` untouched since
/// that is a terminal-review decision, not a flag operation.
pub async fn set_flagged(pool: &SqlitePool, doc_id: &str, flagged: bool) -> Result<()> {
    require_document(pool, doc_id).await?;
    let now = Utc::now().to_rfc3339();
    sqlx::query(
        "UPDATE documents SET flagged_for_review = ?1, review_status = CASE WHEN ?1 AND review_status = ?2 THEN ?3 ELSE review_status END, updated_at = ?4 WHERE doc_id = ?5",
    )
    .bind(flagged)
    .bind(ReviewStatus::None.to_string())
    .bind(ReviewStatus::Pending.to_string())
    .bind(&now)
    .bind(doc_id)
    .execute(pool)
    .await?;
    Ok(())
}

/// Inserts an issue only if no row with the same `(doc_id, type, details)`
/// already exists (spec.md §4.3 sync dedup, §3 Issue "SHOULD be deduplicated").
pub async fn insert_issue_if_absent(pool: &SqlitePool, issue: &Issue) -> Result<bool> {
    let exists: Option<(i64,)> = sqlx::query_as(
        "SELECT id FROM issues WHERE doc_id = ?1 AND issue_type = ?2 AND issue_details = ?3",
    )
    .bind(&issue.doc_id)
    .bind(issue.issue_type.to_string())
    .bind(&issue.issue_details)
    .fetch_optional(pool)
    .await?;
    if exists.is_some() {
        return Ok(false);
    }
    sqlx::query("INSERT INTO issues (doc_id, issue_type, issue_details) VALUES (?1, ?2, ?3)")
        .bind(&issue.doc_id)
        .bind(issue.issue_type.to_string())
        .bind(&issue.issue_details)
        .execute(pool)
        .await?;
    Ok(true)
}

pub async fn list_issues(pool: &SqlitePool, doc_id: &str) -> Result<Vec<Issue>> {
    let rows: Vec<IssueRow> = sqlx::query_as("SELECT * FROM issues WHERE doc_id = ?1 ORDER BY id")
        .bind(doc_id)
        .fetch_all(pool)
        .await?;
    rows.into_iter().map(IssueRow::into_issue).collect()
}

pub async fn get_document_detail(pool: &SqlitePool, doc_id: &str) -> Result<DocumentDetail> {
    let document = require_document(pool, doc_id).await?;
    let issues = list_issues(pool, doc_id).await?;
    Ok(DocumentDetail { document, issues })
}

/// Review state machine transition (spec.md §4.1). `completed` is accepted
/// as an input alias for either terminal state on legacy callers, but this
/// API only ever writes the canonical requested state.
pub async fn set_review_status(pool: &SqlitePool, doc_id: &str, status: ReviewStatus) -> Result<()> {
    let current = require_document(pool, doc_id).await?;
    validate_review_transition(current.review_status, status)?;
    let now = Utc::now().to_rfc3339();
    let clears_flag = status.is_terminal();
    sqlx::query(
        "UPDATE documents SET review_status = ?1, flagged_for_review = CASE WHEN ?2 THEN 0 ELSE flagged_for_review END, updated_at = ?3 WHERE doc_id = ?4",
    )
    .bind(status.to_string())
    .bind(clears_flag)
    .bind(&now)
    .bind(doc_id)
    .execute(pool)
    .await?;
    Ok(())
}

fn validate_review_transition(current: ReviewStatus, next: ReviewStatus) -> Result<()> {
    use ReviewStatus::{Approved, Completed, InProgress, None as NoneStatus, Pending, Rejected};
    let allowed = matches!(
        (current, next),
        (NoneStatus, Pending)
            | (Pending, InProgress)
            | (Pending, Rejected)
            | (InProgress, Approved)
            | (InProgress, Rejected)
            | (_, Completed)
    ) || current == next;
    if allowed {
        Ok(())
    } else {
        Err(SkillLabError::InvalidState {
            doc_id: String::new(),
            detail: format!("cannot transition review_status from {current} to {next}"),
        })
    }
}

pub async fn dashboard_stats(pool: &SqlitePool) -> Result<DashboardStats> {
    let total_documents: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM documents")
        .fetch_one(pool)
        .await?;
    let flagged_count: (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM documents WHERE flagged_for_review = 1")
            .fetch_one(pool)
            .await?;
    let reviewed_count: (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM documents WHERE review_status IN ('approved', 'rejected', 'completed')",
    )
    .fetch_one(pool)
    .await?;
    let issue_histogram: Vec<(String, i64)> = sqlx::query_as(
        "SELECT issue_type, COUNT(*) FROM issues GROUP BY issue_type ORDER BY issue_type",
    )
    .fetch_all(pool)
    .await?;
    let status_histogram: Vec<(String, i64)> =
        sqlx::query_as("SELECT status, COUNT(*) FROM documents GROUP BY status ORDER BY status")
            .fetch_all(pool)
            .await?;

    Ok(DashboardStats {
        total_documents: total_documents.0,
        flagged_count: flagged_count.0,
        reviewed_count: reviewed_count.0,
        issue_type_histogram: issue_histogram,
        status_histogram,
    })
}
