//! Hierarchical configuration for SkillLab (spec.md §6.4, SPEC_FULL.md §3).
//!
//! Grounded on the teacher's `xchecker-config::Config::discover` pattern:
//! defaults are overlaid by a TOML file, then by `SKILLLAB_*` environment
//! variables, with each field's provenance tracked for introspection via
//! `skilllab status --config`. Precedence here is env > file > defaults,
//! per spec.md §8 property 7.

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};
use skilllab_errors::{Result, SkillLabError};
use std::path::Path;

fn default_input_dir() -> Utf8PathBuf {
    Utf8PathBuf::from("input")
}
fn default_output_dir() -> Utf8PathBuf {
    Utf8PathBuf::from("output")
}
fn default_model_dir() -> Utf8PathBuf {
    Utf8PathBuf::from("models")
}
fn default_logs_dir() -> Utf8PathBuf {
    Utf8PathBuf::from("logs")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub input_dir: Utf8PathBuf,
    pub output_dir: Utf8PathBuf,
    pub model_dir: Utf8PathBuf,
    pub logs_dir: Utf8PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            input_dir: default_input_dir(),
            output_dir: default_output_dir(),
            model_dir: default_model_dir(),
            logs_dir: default_logs_dir(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    pub language: String,
    pub dpi: u32,
    pub min_confidence: f64,
    pub use_service: bool,
    pub service_url: String,
    pub timeout_ms: u64,
    pub max_retries: u32,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            language: "en".into(),
            dpi: 200,
            min_confidence: 0.5,
            use_service: true,
            service_url: "http://localhost:8010".into(),
            timeout_ms: 300_000,
            max_retries: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StructureConfig {
    pub ollama_url: String,
    pub model_name: String,
    pub temperature: f64,
    pub max_tokens: u32,
    pub max_retries: u32,
    pub timeout_ms: u64,
}

impl Default for StructureConfig {
    fn default() -> Self {
        Self {
            ollama_url: "http://localhost:11434/api/generate".into(),
            model_name: "llama3".into(),
            temperature: 0.1,
            max_tokens: 2048,
            max_retries: 3,
            timeout_ms: 300_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CorrectionConfig {
    pub min_coverage_threshold: f64,
    pub max_correction_attempts: u32,
}

impl Default for CorrectionConfig {
    fn default() -> Self {
        Self {
            min_coverage_threshold: 0.9,
            max_correction_attempts: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetConfig {
    pub train_val_split: f64,
    pub task_name: String,
    pub jpeg_quality: u8,
    pub shuffle_seed: u64,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            train_val_split: 0.8,
            task_name: "resume_extraction".into(),
            jpeg_quality: 95,
            shuffle_seed: 42,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReviewConfig {
    pub enabled: bool,
    pub db_path: Utf8PathBuf,
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            db_path: Utf8PathBuf::from("output/review.db"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitoringConfig {
    pub enabled: bool,
    pub metrics_db: Utf8PathBuf,
    pub update_interval_secs: u64,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            metrics_db: Utf8PathBuf::from("output/metrics.db"),
            update_interval_secs: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<Utf8PathBuf>,
    pub max_size_mb: u64,
    pub backup_count: u32,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            file: None,
            max_size_mb: 10,
            backup_count: 3,
            json: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub start_step: String,
    pub end_step: String,
    pub limit: Option<u32>,
    pub max_concurrent_documents: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            start_step: "ocr".into(),
            end_step: "dataset".into(),
            limit: None,
            max_concurrent_documents: 4,
        }
    }
}

/// Fully resolved configuration (spec.md §6.4).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub paths: PathsConfig,
    pub pipeline: PipelineConfig,
    pub ocr: OcrConfig,
    pub structure: StructureConfig,
    pub correction: CorrectionConfig,
    pub dataset: DatasetConfig,
    pub review: ReviewConfig,
    pub monitoring: MonitoringConfig,
    pub logging: LoggingConfig,
}

/// Where a resolved value ultimately came from; used by `skilllab status
/// --config` to explain precedence decisions to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigSource {
    Default,
    File,
    Env,
}

impl Config {
    /// Loads defaults, overlays a TOML file if present, then overlays
    /// `SKILLLAB_*` environment variables. Returns the resolved config and a
    /// coarse provenance marker: `Env` if any override was applied, else
    /// `File` if a file was loaded, else `Default`.
    pub fn discover(file_path: Option<&Path>) -> Result<(Config, ConfigSource)> {
        let mut source = ConfigSource::Default;
        let mut config = Config::default();

        if let Some(path) = file_path {
            if path.exists() {
                let text = std::fs::read_to_string(path).map_err(|e| SkillLabError::IoFailure {
                    path: path.to_path_buf(),
                    source: e,
                })?;
                config = toml::from_str(&text)?;
                source = ConfigSource::File;
            }
        }

        if apply_env_overrides(&mut config) {
            source = ConfigSource::Env;
        }

        config.validate()?;
        Ok((config, source))
    }

    /// Range/shape validation mirroring the teacher's `Config::validate`.
    pub fn validate(&self) -> Result<()> {
        fn check(cond: bool, detail: impl Into<String>) -> Result<()> {
            if cond {
                Ok(())
            } else {
                Err(SkillLabError::SchemaFailure {
                    detail: detail.into(),
                })
            }
        }

        check(
            (72..=600).contains(&self.ocr.dpi),
            "ocr.dpi must be between 72 and 600",
        )?;
        check(
            (0.0..=1.0).contains(&self.ocr.min_confidence),
            "ocr.min_confidence must be in [0,1]",
        )?;
        check(
            (0.0..=1.0).contains(&self.structure.temperature),
            "structure.temperature must be in [0,1]",
        )?;
        check(
            self.structure.max_retries <= 10,
            "structure.max_retries must be <= 10",
        )?;
        check(
            (0.0..=1.0).contains(&self.correction.min_coverage_threshold),
            "correction.min_coverage_threshold must be in [0,1]",
        )?;
        check(
            self.correction.max_correction_attempts >= 1,
            "correction.max_correction_attempts must be >= 1",
        )?;
        check(
            self.dataset.train_val_split > 0.0 && self.dataset.train_val_split < 1.0,
            "dataset.train_val_split must be in (0,1)",
        )?;
        check(
            (1..=100).contains(&self.dataset.jpeg_quality),
            "dataset.jpeg_quality must be in [1,100]",
        )?;
        Ok(())
    }

    /// Ordered list of recognized pipeline steps, used for slice validation.
    #[must_use]
    pub fn step_order() -> &'static [&'static str] {
        &["ocr", "json", "correction", "dataset", "training"]
    }
}

/// Fluent builder mirroring the teacher's `ConfigBuilder`, used by tests and
/// by programmatic embedding where loading a TOML file is unnecessary.
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    #[must_use]
    pub fn output_dir(mut self, dir: impl Into<Utf8PathBuf>) -> Self {
        self.config.paths.output_dir = dir.into();
        self
    }

    #[must_use]
    pub fn input_dir(mut self, dir: impl Into<Utf8PathBuf>) -> Self {
        self.config.paths.input_dir = dir.into();
        self
    }

    #[must_use]
    pub fn min_coverage_threshold(mut self, threshold: f64) -> Self {
        self.config.correction.min_coverage_threshold = threshold;
        self
    }

    #[must_use]
    pub fn max_correction_attempts(mut self, attempts: u32) -> Self {
        self.config.correction.max_correction_attempts = attempts;
        self
    }

    pub fn build(self) -> Result<Config> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Applies `SKILLLAB_<SECTION>__<KEY>` overrides. Returns true if any were
/// applied. Scalar parsing recognizes bool/number/string, per spec.md §6.4.
fn apply_env_overrides(config: &mut Config) -> bool {
    let mut applied = false;
    for (key, value) in std::env::vars() {
        let Some(rest) = key.strip_prefix("SKILLLAB_") else {
            continue;
        };
        let Some((section, field)) = rest.split_once("__") else {
            continue;
        };
        let section = section.to_lowercase();
        let field = field.to_lowercase();
        if set_field(config, &section, &field, &value) {
            applied = true;
        }
    }
    applied
}

fn set_field(config: &mut Config, section: &str, field: &str, value: &str) -> bool {
    macro_rules! set_str {
        ($target:expr) => {{
            $target = value.to_string().into();
            true
        }};
    }
    macro_rules! set_parsed {
        ($target:expr) => {{
            match value.parse() {
                Ok(v) => {
                    $target = v;
                    true
                }
                Err(_) => false,
            }
        }};
    }

    match (section, field) {
        ("paths", "input_dir") => set_str!(config.paths.input_dir),
        ("paths", "output_dir") => set_str!(config.paths.output_dir),
        ("ocr", "language") => set_str!(config.ocr.language),
        ("ocr", "dpi") => set_parsed!(config.ocr.dpi),
        ("ocr", "min_confidence") => set_parsed!(config.ocr.min_confidence),
        ("ocr", "service_url") => set_str!(config.ocr.service_url),
        ("structure", "ollama_url") => set_str!(config.structure.ollama_url),
        ("structure", "model_name") => set_str!(config.structure.model_name),
        ("structure", "temperature") => set_parsed!(config.structure.temperature),
        ("structure", "max_retries") => set_parsed!(config.structure.max_retries),
        ("correction", "min_coverage_threshold") => {
            set_parsed!(config.correction.min_coverage_threshold)
        }
        ("correction", "max_correction_attempts") => {
            set_parsed!(config.correction.max_correction_attempts)
        }
        ("dataset", "train_val_split") => set_parsed!(config.dataset.train_val_split),
        ("review", "enabled") => set_parsed!(config.review.enabled),
        ("monitoring", "enabled") => set_parsed!(config.monitoring.enabled),
        ("logging", "level") => set_str!(config.logging.level),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn rejects_out_of_range_dpi() {
        let mut config = Config::default();
        config.ocr.dpi = 10;
        assert!(config.validate().is_err());
    }

    #[test]
    fn discover_overlays_file_then_env() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("skilllab.toml");
        std::fs::write(&path, "[ocr]\ndpi = 300\n").unwrap();

        // SAFETY: test runs single-threaded with respect to this env var.
        unsafe {
            std::env::set_var("SKILLLAB_OCR__DPI", "150");
        }
        let (config, source) = Config::discover(Some(&path)).unwrap();
        unsafe {
            std::env::remove_var("SKILLLAB_OCR__DPI");
        }

        assert_eq!(config.ocr.dpi, 150);
        assert_eq!(source, ConfigSource::Env);
    }

    #[test]
    fn builder_sets_fields() {
        let config = ConfigBuilder::new()
            .min_coverage_threshold(0.5)
            .max_correction_attempts(5)
            .build()
            .unwrap();
        assert_eq!(config.correction.min_coverage_threshold, 0.5);
        assert_eq!(config.correction.max_correction_attempts, 5);
    }
}
