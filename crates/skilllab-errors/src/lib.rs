//! Error kinds for the SkillLab core (spec.md §7).
//!
//! Mirrors the teacher's `XCheckerError` / `UserFriendlyError` split: library
//! crates return precise [`SkillLabError`] variants; the CLI binary collapses
//! these into `anyhow::Error` and renders [`UserFriendlyError::user_message`]
//! plus suggestions instead of a bare `Debug` dump.

use std::path::PathBuf;

/// The closed set of error kinds named in spec.md §7.
#[derive(Debug, thiserror::Error)]
pub enum SkillLabError {
    #[error("unknown document: {doc_id}")]
    UnknownDocument { doc_id: String },

    #[error("invalid state transition for {doc_id}: {detail}")]
    InvalidState { doc_id: String, detail: String },

    #[error("invalid pipeline slice: start step '{start}' comes after end step '{end}'")]
    InvalidSlice { start: String, end: String },

    #[error("I/O failure at {path}: {source}")]
    IoFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("schema failure: {detail}")]
    SchemaFailure { detail: String },

    #[error("collaborator unavailable: {service} ({detail})")]
    ServiceUnavailable { service: String, detail: String },

    #[error("timed out after {elapsed_ms}ms calling {operation}")]
    Timeout { operation: String, elapsed_ms: u64 },

    #[error("validation failure for {doc_id}: {detail}")]
    ValidationFailure { doc_id: String, detail: String },

    #[error("conflict: {detail}")]
    Conflict { detail: String },

    #[error("store error: {0}")]
    Store(#[from] sqlx::Error),

    #[error("collaborator request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("malformed json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("malformed config: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Coarse bucket used for CLI error summaries and for health-check grouping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Storage,
    Collaborator,
    Validation,
    Configuration,
    Concurrency,
}

/// Human-facing rendering for an error, separate from its `Display` impl so
/// the latter can stay terse and machine-grep-able in logs.
pub trait UserFriendlyError {
    fn user_message(&self) -> String;
    fn suggestions(&self) -> Vec<String>;
    fn category(&self) -> ErrorCategory;
}

impl UserFriendlyError for SkillLabError {
    fn user_message(&self) -> String {
        match self {
            Self::UnknownDocument { doc_id } => {
                format!("No document with id '{doc_id}' is registered.")
            }
            Self::InvalidState { doc_id, detail } => {
                format!("Document '{doc_id}' cannot make that transition: {detail}")
            }
            Self::InvalidSlice { start, end } => {
                format!("Pipeline slice is invalid: '{start}' runs after '{end}'.")
            }
            Self::IoFailure { path, source } => {
                format!("Could not read or write '{}': {source}", path.display())
            }
            Self::SchemaFailure { detail } => format!("Record failed schema checks: {detail}"),
            Self::ServiceUnavailable { service, detail } => {
                format!("The {service} collaborator did not respond: {detail}")
            }
            Self::Timeout {
                operation,
                elapsed_ms,
            } => format!("'{operation}' did not complete within {elapsed_ms}ms."),
            Self::ValidationFailure { doc_id, detail } => {
                format!("Document '{doc_id}' failed validation: {detail}")
            }
            Self::Conflict { detail } => format!("Conflicting update: {detail}"),
            Self::Store(e) => format!("Store operation failed: {e}"),
            Self::Request(e) => format!("Collaborator request failed: {e}"),
            Self::Json(e) => format!("Could not parse JSON: {e}"),
            Self::TomlDe(e) => format!("Could not parse configuration: {e}"),
            Self::Io(e) => format!("I/O error: {e}"),
        }
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            Self::UnknownDocument { .. } => {
                vec!["Run `skilllab run extract` first to register the document.".into()]
            }
            Self::ServiceUnavailable { service, .. } => vec![format!(
                "Run `skilllab health check` to confirm the {service} endpoint is reachable."
            )],
            Self::Timeout { .. } => {
                vec!["Increase the configured timeout or check collaborator health.".into()]
            }
            Self::InvalidSlice { .. } => {
                vec!["Pass --start-step/--end-step in the declared pipeline order.".into()]
            }
            Self::IoFailure { .. } => {
                vec!["Check that output_dir exists and is writable.".into()]
            }
            _ => vec![],
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::UnknownDocument { .. }
            | Self::InvalidState { .. }
            | Self::Conflict { .. }
            | Self::Store(_) => ErrorCategory::Storage,
            Self::ServiceUnavailable { .. } | Self::Timeout { .. } | Self::Request(_) => {
                ErrorCategory::Collaborator
            }
            Self::SchemaFailure { .. } | Self::ValidationFailure { .. } | Self::Json(_) => {
                ErrorCategory::Validation
            }
            Self::InvalidSlice { .. } | Self::TomlDe(_) => ErrorCategory::Configuration,
            Self::IoFailure { .. } | Self::Io(_) => ErrorCategory::Storage,
        }
    }
}

pub type Result<T> = std::result::Result<T, SkillLabError>;
