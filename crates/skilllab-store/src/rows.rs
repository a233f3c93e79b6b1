//! Row shapes shared by the Metrics Store and the Review Store, and their
//! conversions to/from the canonical `skilllab_types` entities.

use chrono::{DateTime, Utc};
use skilllab_errors::{Result, SkillLabError};
use skilllab_types::{Document, DocumentStatus, Issue, IssueType, ReviewStatus};
use sqlx::FromRow;
use std::str::FromStr;

#[derive(Debug, FromRow)]
pub struct DocumentRow {
    pub doc_id: String,
    pub filename: String,
    pub status: String,
    pub ocr_confidence: Option<f64>,
    pub json_confidence: Option<f64>,
    pub correction_count: i64,
    pub flagged_for_review: i64,
    pub review_status: String,
    pub created_at: String,
    pub updated_at: String,
}

impl DocumentRow {
    pub fn into_document(self) -> Result<Document> {
        Ok(Document {
            doc_id: self.doc_id,
            filename: self.filename,
            status: DocumentStatus::from_str(&self.status).map_err(|_| {
                SkillLabError::SchemaFailure {
                    detail: format!("unknown document status '{}'", self.status),
                }
            })?,
            ocr_confidence: self.ocr_confidence,
            json_confidence: self.json_confidence,
            correction_count: self.correction_count as u32,
            flagged_for_review: self.flagged_for_review != 0,
            review_status: parse_review_status(&self.review_status)?,
            created_at: parse_timestamp(&self.created_at)?,
            updated_at: parse_timestamp(&self.updated_at)?,
        })
    }
}

/// Accepts the legacy `completed` row on read as an equivalent terminal
/// state (spec.md §4.1), in addition to the canonical variant names.
pub fn parse_review_status(raw: &str) -> Result<ReviewStatus> {
    ReviewStatus::from_str(raw).map_err(|_| SkillLabError::SchemaFailure {
        detail: format!("unknown review status '{raw}'"),
    })
}

pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| SkillLabError::SchemaFailure {
            detail: format!("malformed timestamp '{raw}'"),
        })
}

#[derive(Debug, FromRow)]
pub struct IssueRow {
    pub id: i64,
    pub doc_id: String,
    pub issue_type: String,
    pub issue_details: String,
}

impl IssueRow {
    pub fn into_issue(self) -> Result<Issue> {
        Ok(Issue {
            id: Some(self.id),
            doc_id: self.doc_id,
            issue_type: IssueType::from_str(&self.issue_type).map_err(|_| {
                SkillLabError::SchemaFailure {
                    detail: format!("unknown issue type '{}'", self.issue_type),
                }
            })?,
            issue_details: self.issue_details,
        })
    }
}

/// A document row plus its issues, in the uniform shape readers expect
/// (spec.md §4.2: per-document detail lookup).
#[derive(Debug, Clone)]
pub struct DocumentDetail {
    pub document: Document,
    pub issues: Vec<Issue>,
}

/// Aggregate dashboard statistics exposed by both stores (spec.md §4.2).
#[derive(Debug, Clone, Default)]
pub struct DashboardStats {
    pub total_documents: i64,
    pub flagged_count: i64,
    pub reviewed_count: i64,
    pub issue_type_histogram: Vec<(String, i64)>,
    pub status_histogram: Vec<(String, i64)>,
}
