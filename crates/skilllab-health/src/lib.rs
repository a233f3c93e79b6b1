//! Health-check surface (`skilllab health check`): reachability of the OCR
//! and Structure collaborators, writability of the output directory, and
//! presence of the Metrics/Review database files.
//!
//! Grounded on the teacher's `xchecker-doctor` crate: same
//! name/status/details check shape, same "run every check, sort by name,
//! `ok` iff no failure" aggregation, adapted from CLI-availability checks to
//! SkillLab's HTTP collaborators and SQLite stores. Also supplements
//! `original_source/healthcheck.py`, which this surface replaces.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use skilllab_collab::{OcrCollaborator, StructureCollaborator};
use skilllab_config::Config;
use tracing::info;

/// Pass/warn/fail verdict for one check (mirrors the teacher's
/// `CheckStatus`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckStatus {
    Pass,
    Warn,
    Fail,
}

/// One named health check and its outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheck {
    pub name: String,
    pub status: CheckStatus,
    pub details: String,
}

/// The full report emitted by `skilllab health check`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub emitted_at: DateTime<Utc>,
    pub ok: bool,
    pub checks: Vec<HealthCheck>,
}

/// Runs every health check and returns the aggregate report. Checks are
/// sorted by name for stable, diffable output.
pub async fn run_checks(
    config: &Config,
    ocr: &dyn OcrCollaborator,
    structure: &dyn StructureCollaborator,
) -> HealthReport {
    let mut checks = vec![
        check_ocr_endpoint(ocr).await,
        check_structure_endpoint(structure).await,
        check_output_dir_writable(config),
        check_metrics_db_present(config),
        check_review_db_present(config),
    ];
    checks.sort_by(|a, b| a.name.cmp(&b.name));

    let ok = !checks.iter().any(|c| c.status == CheckStatus::Fail);
    let report = HealthReport {
        emitted_at: Utc::now(),
        ok,
        checks,
    };
    info!(ok = report.ok, check_count = report.checks.len(), "health check complete");
    report
}

async fn check_ocr_endpoint(ocr: &dyn OcrCollaborator) -> HealthCheck {
    match ocr.health().await {
        Ok(true) => HealthCheck {
            name: "ocr_endpoint".to_string(),
            status: CheckStatus::Pass,
            details: "OCR collaborator reports healthy".to_string(),
        },
        Ok(false) => HealthCheck {
            name: "ocr_endpoint".to_string(),
            status: CheckStatus::Fail,
            details: "OCR collaborator reachable but reports unhealthy".to_string(),
        },
        Err(e) => HealthCheck {
            name: "ocr_endpoint".to_string(),
            status: CheckStatus::Fail,
            details: format!("OCR collaborator unreachable: {e}"),
        },
    }
}

async fn check_structure_endpoint(structure: &dyn StructureCollaborator) -> HealthCheck {
    match structure.list_models().await {
        Ok(models) => HealthCheck {
            name: "structure_endpoint".to_string(),
            status: CheckStatus::Pass,
            details: format!("Structure collaborator reachable, {} model(s) available", models.len()),
        },
        Err(e) => HealthCheck {
            name: "structure_endpoint".to_string(),
            status: CheckStatus::Fail,
            details: format!("Structure collaborator unreachable: {e}"),
        },
    }
}

fn check_output_dir_writable(config: &Config) -> HealthCheck {
    let dir = config.paths.output_dir.as_std_path();
    if let Err(e) = std::fs::create_dir_all(dir) {
        return HealthCheck {
            name: "output_dir_writable".to_string(),
            status: CheckStatus::Fail,
            details: format!("Cannot create output directory '{}': {e}", config.paths.output_dir),
        };
    }
    let probe = dir.join(".skilllab_health_probe");
    match std::fs::write(&probe, b"ok") {
        Ok(()) => {
            let _ = std::fs::remove_file(&probe);
            HealthCheck {
                name: "output_dir_writable".to_string(),
                status: CheckStatus::Pass,
                details: format!("'{}' is writable", config.paths.output_dir),
            }
        }
        Err(e) => HealthCheck {
            name: "output_dir_writable".to_string(),
            status: CheckStatus::Fail,
            details: format!("Cannot write to '{}': {e}", config.paths.output_dir),
        },
    }
}

fn check_metrics_db_present(config: &Config) -> HealthCheck {
    db_presence_check("metrics_db_present", &config.monitoring.metrics_db)
}

fn check_review_db_present(config: &Config) -> HealthCheck {
    db_presence_check("review_db_present", &config.review.db_path)
}

fn db_presence_check(name: &str, path: &camino::Utf8Path) -> HealthCheck {
    if path.as_std_path().exists() {
        HealthCheck {
            name: name.to_string(),
            status: CheckStatus::Pass,
            details: format!("Found '{path}'"),
        }
    } else {
        HealthCheck {
            name: name.to_string(),
            status: CheckStatus::Warn,
            details: format!("'{path}' does not exist yet; it is created on first pipeline run"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use skilllab_errors::Result as SResult;

    struct StubOcr {
        healthy: bool,
    }

    #[async_trait]
    impl OcrCollaborator for StubOcr {
        async fn process_pdf(
            &self,
            _bytes: Vec<u8>,
            _filename: &str,
        ) -> SResult<skilllab_collab::types::OcrResponse> {
            unimplemented!("not exercised by health checks")
        }
        async fn health(&self) -> SResult<bool> {
            Ok(self.healthy)
        }
    }

    struct StubStructure {
        ok: bool,
    }

    #[async_trait]
    impl StructureCollaborator for StubStructure {
        async fn generate(&self, _prompt: &str) -> SResult<String> {
            unimplemented!("not exercised by health checks")
        }
        async fn list_models(&self) -> SResult<Vec<String>> {
            if self.ok {
                Ok(vec!["llama3".to_string()])
            } else {
                Err(skilllab_errors::SkillLabError::ServiceUnavailable {
                    service: "structure".into(),
                    detail: "connection refused".into(),
                })
            }
        }
    }

    #[tokio::test]
    async fn reports_ok_when_everything_healthy() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.paths.output_dir = camino::Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        config.monitoring.metrics_db = config.paths.output_dir.join("metrics.db");
        config.review.db_path = config.paths.output_dir.join("review.db");

        let report = run_checks(&config, &StubOcr { healthy: true }, &StubStructure { ok: true }).await;

        assert!(report.ok);
        assert_eq!(report.checks.len(), 5);
        let names: Vec<_> = report.checks.iter().map(|c| c.name.clone()).collect();
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);
    }

    #[tokio::test]
    async fn fails_overall_when_a_collaborator_is_down() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.paths.output_dir = camino::Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();

        let report = run_checks(&config, &StubOcr { healthy: false }, &StubStructure { ok: true }).await;
        assert!(!report.ok);
        let ocr_check = report.checks.iter().find(|c| c.name == "ocr_endpoint").unwrap();
        assert_eq!(ocr_check.status, CheckStatus::Fail);
    }

    #[tokio::test]
    async fn warns_when_databases_do_not_exist_yet() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.paths.output_dir = camino::Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        config.monitoring.metrics_db = config.paths.output_dir.join("missing_metrics.db");
        config.review.db_path = config.paths.output_dir.join("missing_review.db");

        let report = run_checks(&config, &StubOcr { healthy: true }, &StubStructure { ok: true }).await;
        assert!(report.ok);
        let metrics_check = report.checks.iter().find(|c| c.name == "metrics_db_present").unwrap();
        assert_eq!(metrics_check.status, CheckStatus::Warn);
    }
}
