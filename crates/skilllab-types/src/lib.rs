//! Core entity types shared across the SkillLab workspace.
//!
//! These mirror the data model in `SPEC_FULL.md` §3. They carry no storage
//! or validation logic; `skilllab-store` persists them and `skilllab-quality`
//! derives issues from them.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Stable identifier for a [`Document`], derived from the source filename.
pub type DocId = String;

/// Forward-only lifecycle status of a [`Document`].
///
/// Ordering matters: `status` MUST advance forward only (spec.md §3, §8
/// property 1). [`DocumentStatus::rank`] gives the declared order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    Registered,
    OcrComplete,
    JsonComplete,
    Validated,
    RecycledForTraining,
}

impl DocumentStatus {
    /// Position in the declared forward order; used to reject regressions.
    #[must_use]
    pub fn rank(self) -> u8 {
        match self {
            Self::Registered => 0,
            Self::OcrComplete => 1,
            Self::JsonComplete => 2,
            Self::Validated => 3,
            Self::RecycledForTraining => 4,
        }
    }
}

/// Review lifecycle state (spec.md §4.1 state machine).
///
/// `Completed` is a legacy terminal alias accepted on read as equivalent to
/// `Approved` or `Rejected` (spec.md §9 open question).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, Default)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ReviewStatus {
    #[default]
    None,
    Pending,
    InProgress,
    Approved,
    Rejected,
    Completed,
}

impl ReviewStatus {
    /// True for any of the terminal states that clear `flagged_for_review`.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Approved | Self::Rejected | Self::Completed)
    }
}

/// Closed vocabulary of issue kinds (spec.md §3 Issue entity).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum IssueType {
    LowOcrConfidence,
    LowJsonConfidence,
    MissingContact,
    ValidationFailure,
    MultipleCorrections,
    OcrExtractionFailure,
    LowJsonCompleteness,
    SchemaValidation,
}

/// The canonical per-document record (spec.md §3 Document).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub doc_id: DocId,
    pub filename: String,
    pub status: DocumentStatus,
    pub ocr_confidence: Option<f64>,
    pub json_confidence: Option<f64>,
    pub correction_count: u32,
    pub flagged_for_review: bool,
    pub review_status: ReviewStatus,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// An append-only issue raised against a document (spec.md §3 Issue).
///
/// Readers MUST accept both the canonical `type`/`details` shape and the
/// legacy `issue_type`/`issue_details` shape (spec.md §4.2); that adapter
/// lives at the store boundary, not on this struct, which always uses the
/// canonical field names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub id: Option<i64>,
    pub doc_id: DocId,
    pub issue_type: IssueType,
    pub issue_details: String,
}

/// Status of a [`PipelineRun`] or [`StepExecution`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
    Cancelled,
}

/// Telemetry row for one pipeline invocation (spec.md §3 PipelineRun).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineRun {
    pub id: Option<i64>,
    pub start_step: String,
    pub end_step: String,
    pub start_time: chrono::DateTime<chrono::Utc>,
    pub end_time: Option<chrono::DateTime<chrono::Utc>>,
    pub status: RunStatus,
    pub document_count: u32,
    pub details: Option<serde_json::Value>,
}

/// Telemetry row for one step invocation within a run (spec.md §3 StepExecution).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepExecution {
    pub id: Option<i64>,
    pub run_id: i64,
    pub step_name: String,
    pub start_time: chrono::DateTime<chrono::Utc>,
    pub end_time: Option<chrono::DateTime<chrono::Utc>>,
    pub status: RunStatus,
    pub document_count: u32,
    pub details: Option<serde_json::Value>,
}

/// An append-only metric sample (spec.md §3 Metric).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub metric_type: String,
    pub metric_name: String,
    pub value: f64,
    pub details: Option<serde_json::Value>,
}

/// One resource-usage tick, one row per GPU (spec.md §3 ResourceSample).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceSample {
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub activity: String,
    pub cpu_percent: f64,
    pub memory_mb: f64,
    pub gpu_index: Option<u32>,
    pub gpu_percent: Option<f64>,
    pub gpu_memory_mb: Option<f64>,
}

/// One completed review verdict (spec.md §3 ReviewFeedback).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewFeedback {
    pub id: Option<i64>,
    pub doc_id: DocId,
    pub status: ReviewStatus,
    pub changes_made: bool,
    pub reason: Option<String>,
    pub fields_corrected: Vec<String>,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub reviewer: Option<String>,
}

/// One field edit applied during review (spec.md §3 FieldCorrection).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldCorrection {
    pub id: Option<i64>,
    pub doc_id: DocId,
    pub field_name: String,
    pub original_value: Option<String>,
    pub corrected_value: Option<String>,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// One work history entry within a [`ResumeRecord`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExperienceEntry {
    pub company: String,
    pub title: String,
    pub years: String,
}

/// The logical payload extracted from a document (spec.md §3 ResumeRecord).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResumeRecord {
    #[serde(default, rename = "Name")]
    pub name: Option<String>,
    #[serde(default, rename = "Email")]
    pub email: Option<String>,
    #[serde(default, rename = "Phone")]
    pub phone: Option<String>,
    #[serde(default, rename = "Current_Position")]
    pub current_position: Option<String>,
    #[serde(default, rename = "Skills")]
    pub skills: Vec<String>,
    #[serde(default, rename = "Experience")]
    pub experience: Vec<ExperienceEntry>,
}

/// Sidecar validation block attached to a validated `ResumeRecord` on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationBlock {
    pub is_valid: bool,
    pub coverage: f64,
    pub correction_attempts: u32,
    pub structure_valid: bool,
}

/// A validated record as persisted under `validated_json/<doc_id>_validated.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidatedRecord {
    #[serde(flatten)]
    pub record: ResumeRecord,
    pub validation: ValidationBlock,
    pub image_paths: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_order_is_forward_only() {
        assert!(DocumentStatus::Registered.rank() < DocumentStatus::OcrComplete.rank());
        assert!(DocumentStatus::OcrComplete.rank() < DocumentStatus::JsonComplete.rank());
        assert!(DocumentStatus::JsonComplete.rank() < DocumentStatus::Validated.rank());
        assert!(DocumentStatus::Validated.rank() < DocumentStatus::RecycledForTraining.rank());
    }

    #[test]
    fn completed_is_terminal_alias() {
        assert!(ReviewStatus::Completed.is_terminal());
        assert!(ReviewStatus::Approved.is_terminal());
        assert!(ReviewStatus::Rejected.is_terminal());
        assert!(!ReviewStatus::Pending.is_terminal());
    }

    #[test]
    fn resume_record_round_trips_pascal_case_keys() {
        let json = r#"{"Name":"Alice","Email":null,"Phone":null,"Current_Position":null,"Skills":["Rust"],"Experience":[]}"#;
        let record: ResumeRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.name.as_deref(), Some("Alice"));
        assert_eq!(record.skills, vec!["Rust".to_string()]);
    }
}
