//! CLI argument definitions (spec.md §6: "top-level command groups `run
//! {pipeline|extract|structure|train}`, `review {status|list|sync|web}`,
//! `monitor {status|metrics|dashboard}`, `training {list-models|dataset-info|web}`,
//! `health check`").

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// SkillLab: resume-PDF ingestion pipeline with auto-correction and review.
#[derive(Parser, Debug)]
#[command(name = "skilllab")]
#[command(version)]
pub struct Cli {
    /// Path to a TOML config file (overrides discovery).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Emit logs as newline-delimited JSON instead of the default text format.
    #[arg(long, global = true)]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Execute a pipeline or a bounded slice of one.
    Run {
        #[command(subcommand)]
        target: RunTarget,
    },
    /// Inspect and act on the human review queue.
    Review {
        #[command(subcommand)]
        target: ReviewTarget,
    },
    /// Inspect pipeline telemetry and resource usage.
    Monitor {
        #[command(subcommand)]
        target: MonitorTarget,
    },
    /// Inspect the training dataset and the Structure collaborator's models.
    Training {
        #[command(subcommand)]
        target: TrainingTarget,
    },
    /// Run environment health checks.
    Health {
        #[command(subcommand)]
        target: HealthTarget,
    },
}

#[derive(Subcommand, Debug)]
pub enum RunTarget {
    /// Run the `extract → structure → correction` pipeline over `[start, end]`.
    Pipeline {
        /// First step to run (one of ocr, json, correction). Defaults to the first step.
        #[arg(long)]
        start: Option<String>,
        /// Last step to run (one of ocr, json, correction). Defaults to the last step.
        #[arg(long)]
        end: Option<String>,
    },
    /// Run only the OCR extraction step.
    Extract,
    /// Run only the structuring step.
    Structure,
    /// Build the training dataset from validated records, then hand off to
    /// the external training collaborator (out of scope for this crate).
    Train,
}

#[derive(Subcommand, Debug)]
pub enum ReviewTarget {
    /// Print the status of one document's review lifecycle.
    Status {
        doc_id: String,
    },
    /// List the review queue, optionally filtered by issue type.
    List {
        #[arg(long)]
        issue_type: Option<String>,
    },
    /// Reconcile the Metrics Store and Review Store.
    Sync,
    Approve {
        doc_id: String,
        #[arg(long)]
        reviewer: Option<String>,
    },
    Reject {
        doc_id: String,
        #[arg(long)]
        reason: String,
        #[arg(long)]
        reviewer: Option<String>,
    },
    Recycle {
        doc_id: String,
    },
    /// Placeholder: the interactive review UI is out of scope (spec.md §1).
    Web,
}

#[derive(Subcommand, Debug)]
pub enum MonitorTarget {
    /// Print the dashboard summary (document/issue/status histograms).
    Status,
    /// Print recent resource samples for one activity.
    Metrics {
        #[arg(long, default_value = "pipeline")]
        activity: String,
    },
    /// Placeholder: the live dashboard UI is out of scope (spec.md §1).
    Dashboard,
}

#[derive(Subcommand, Debug)]
pub enum TrainingTarget {
    /// List models the Structure collaborator currently serves.
    ListModels,
    /// Print dataset split totals from the last `dataset-build`.
    DatasetInfo,
    /// Placeholder: the training UI is out of scope (spec.md §1).
    Web,
}

#[derive(Subcommand, Debug)]
pub enum HealthTarget {
    /// Probe collaborators, storage writability, and database presence.
    Check,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_run_pipeline_with_slice_bounds() {
        let cli = Cli::try_parse_from(["skilllab", "run", "pipeline", "--start", "json", "--end", "correction"])
            .unwrap();
        match cli.command {
            Commands::Run {
                target: RunTarget::Pipeline { start, end },
            } => {
                assert_eq!(start.as_deref(), Some("json"));
                assert_eq!(end.as_deref(), Some("correction"));
            }
            _ => panic!("expected RunTarget::Pipeline"),
        }
    }

    #[test]
    fn parses_review_reject_requires_reason() {
        let err = Cli::try_parse_from(["skilllab", "review", "reject", "alice"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn parses_review_reject_with_reason() {
        let cli = Cli::try_parse_from(["skilllab", "review", "reject", "alice", "--reason", "bad scan"]).unwrap();
        match cli.command {
            Commands::Review {
                target: ReviewTarget::Reject { doc_id, reason, reviewer },
            } => {
                assert_eq!(doc_id, "alice");
                assert_eq!(reason, "bad scan");
                assert!(reviewer.is_none());
            }
            _ => panic!("expected ReviewTarget::Reject"),
        }
    }

    #[test]
    fn json_logs_flag_is_global() {
        let cli = Cli::try_parse_from(["skilllab", "--json-logs", "health", "check"]).unwrap();
        assert!(cli.json_logs);
    }

    #[test]
    fn unknown_subcommand_is_rejected() {
        assert!(Cli::try_parse_from(["skilllab", "bogus"]).is_err());
    }
}
