//! Extract step (spec.md §4.7): enumerates `*.pdf` under the configured
//! input directory, calls the OCR collaborator per document, registers each
//! document (C1), and persists `<doc_id>_ocr.json`.

use crate::{apply_quality_policy, contact_evidence_from_text};
use async_trait::async_trait;
use skilllab_collab::OcrCollaborator;
use skilllab_config::Config;
use skilllab_errors::{Result, SkillLabError};
use skilllab_pipeline::{PipelineContext, Step, StepOutcome};
use skilllab_quality::QualityInput;
use skilllab_store::MetricsStore;
use skilllab_types::{DocumentStatus, RunStatus};
use skilllab_workspace::Workspace;
use std::sync::Arc;
use tracing::{instrument, warn};

pub struct ExtractStep {
    ocr: Arc<dyn OcrCollaborator>,
    workspace: Arc<Workspace>,
}

impl ExtractStep {
    #[must_use]
    pub fn new(ocr: Arc<dyn OcrCollaborator>, workspace: Arc<Workspace>) -> Self {
        Self { ocr, workspace }
    }

    #[instrument(skip(self, store, config), fields(document_id = doc_id))]
    async fn process_one(
        &self,
        doc_id: &str,
        filename: &str,
        path: &std::path::Path,
        store: &MetricsStore,
        config: &Config,
    ) -> Result<()> {
        let bytes = std::fs::read(path).map_err(|e| SkillLabError::IoFailure {
            path: path.to_path_buf(),
            source: e,
        })?;

        store.register(doc_id, filename).await?;

        let response = self.ocr.process_pdf(bytes, filename).await?;
        let mean_confidence = response.mean_element_confidence().unwrap_or(0.0);
        let ocr_confidence = mean_confidence * 100.0;

        let ocr_result_path = self.workspace.ocr_result_path(doc_id);
        let body = serde_json::to_string_pretty(&response)?;
        std::fs::write(&ocr_result_path, body).map_err(|e| SkillLabError::IoFailure {
            path: ocr_result_path.clone().into_std_path_buf(),
            source: e,
        })?;

        store.set_status(doc_id, DocumentStatus::OcrComplete).await?;
        store.set_confidence(doc_id, Some(ocr_confidence), None).await?;

        let document = store.get_document(doc_id).await?.ok_or_else(|| SkillLabError::UnknownDocument {
            doc_id: doc_id.to_string(),
        })?;
        let evidence = contact_evidence_from_text(&response.combined_text);
        let input = QualityInput {
            new_ocr_confidence: Some(ocr_confidence),
            contact_evidence: evidence,
            ..Default::default()
        };
        apply_quality_policy(store, &document, &input, thresholds_from(config)).await?;

        Ok(())
    }
}

fn thresholds_from(config: &Config) -> skilllab_quality::QualityThresholds {
    skilllab_quality::QualityThresholds {
        min_ocr_confidence: config.ocr.min_confidence * 100.0,
        min_json_confidence: 75.0,
        max_correction_attempts_before_flag: config.correction.max_correction_attempts,
        min_coverage_threshold: config.correction.min_coverage_threshold,
    }
}

#[async_trait]
impl Step for ExtractStep {
    fn name(&self) -> &str {
        "ocr"
    }

    async fn execute(&self, ctx: &mut PipelineContext) -> Result<StepOutcome> {
        let run_id = ctx.pipeline_run_id.ok_or_else(|| SkillLabError::SchemaFailure {
            detail: "extract step executed outside a pipeline run".to_string(),
        })?;
        let exec_id = ctx.store.start_step_execution(run_id, self.name()).await?;

        let input_dir = &ctx.config.paths.input_dir;
        let mut entries: Vec<_> = std::fs::read_dir(input_dir)
            .map_err(|e| SkillLabError::IoFailure {
                path: input_dir.clone().into_std_path_buf(),
                source: e,
            })?
            .filter_map(std::result::Result::ok)
            .filter(|e| e.path().extension().and_then(|x| x.to_str()) == Some("pdf"))
            .collect();
        entries.sort_by_key(std::fs::DirEntry::path);

        if let Some(limit) = ctx.config.pipeline.limit {
            entries.truncate(limit as usize);
        }

        let mut processed = 0u32;
        for entry in entries {
            let path = entry.path();
            let (Some(doc_id), Some(filename)) = (
                path.file_stem().and_then(|s| s.to_str()),
                path.file_name().and_then(|s| s.to_str()),
            ) else {
                continue;
            };
            let doc_id = doc_id.to_string();
            let filename = filename.to_string();
            let store = ctx.store.clone();
            let config = ctx.config.clone();
            match self.process_one(&doc_id, &filename, &path, &store, &config).await {
                Ok(()) => processed += 1,
                Err(err) => {
                    warn!(document_id = %doc_id, %err, "extract failed for document");
                    ctx.errors.push((doc_id, err.to_string()));
                }
            }
        }

        ctx.store
            .finish_step_execution(exec_id, RunStatus::Completed, processed, None)
            .await?;

        Ok(StepOutcome {
            document_count: processed,
            details: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::Utf8PathBuf;
    use skilllab_collab::types::{OcrResponse, PageResult, TextElement};
    use skilllab_errors::Result as SResult;

    struct StubOcr {
        confidence: f64,
    }

    #[async_trait]
    impl OcrCollaborator for StubOcr {
        async fn process_pdf(&self, _pdf_bytes: Vec<u8>, _filename: &str) -> SResult<OcrResponse> {
            Ok(OcrResponse {
                file_id: "f".into(),
                page_count: 1,
                image_paths: vec!["images/doc_page_0.png".into()],
                page_results: vec![PageResult {
                    text_elements: vec![TextElement {
                        text: "Alice Example Software Engineer".into(),
                        bbox: skilllab_collab::types::BoundingBox([[0.0, 0.0]; 4]),
                        confidence: self.confidence,
                    }],
                    full_text: "Alice Example Software Engineer".into(),
                    text_count: 1,
                }],
                combined_text: "Alice Example Software Engineer".into(),
                processing_time: 0.1,
            })
        }

        async fn health(&self) -> SResult<bool> {
            Ok(true)
        }
    }

    async fn setup() -> (MetricsStore, Arc<Workspace>, tempfile::TempDir, Config) {
        let store = MetricsStore::in_memory().await.unwrap();
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        let workspace = Arc::new(Workspace::ensure(root.clone()).unwrap());
        let mut config = Config::default();
        config.paths.input_dir = root.join("input");
        std::fs::create_dir_all(&config.paths.input_dir).unwrap();
        (store, workspace, dir, config)
    }

    #[tokio::test]
    async fn registers_and_flags_low_confidence_document() {
        let (store, workspace, _dir, config) = setup().await;
        std::fs::write(config.paths.input_dir.join("alice.pdf"), b"%PDF-1.4").unwrap();

        let step = ExtractStep::new(Arc::new(StubOcr { confidence: 0.5 }), workspace);
        let store = Arc::new(store);
        let run_id = store.start_pipeline_run("ocr", "ocr").await.unwrap();
        let mut ctx = PipelineContext::new(config, store);
        ctx.pipeline_run_id = Some(run_id);
        let outcome = step.execute(&mut ctx).await.unwrap();

        assert_eq!(outcome.document_count, 1);
        let document = ctx.store.get_document("alice").await.unwrap().unwrap();
        assert_eq!(document.status, DocumentStatus::OcrComplete);
        assert!(document.flagged_for_review);
    }

    #[tokio::test]
    async fn respects_configured_limit() {
        let (store, workspace, _dir, mut config) = setup().await;
        std::fs::write(config.paths.input_dir.join("a.pdf"), b"%PDF-1.4").unwrap();
        std::fs::write(config.paths.input_dir.join("b.pdf"), b"%PDF-1.4").unwrap();
        config.pipeline.limit = Some(1);

        let step = ExtractStep::new(Arc::new(StubOcr { confidence: 0.95 }), workspace);
        let store = Arc::new(store);
        let run_id = store.start_pipeline_run("ocr", "ocr").await.unwrap();
        let mut ctx = PipelineContext::new(config, store);
        ctx.pipeline_run_id = Some(run_id);
        let outcome = step.execute(&mut ctx).await.unwrap();

        assert_eq!(outcome.document_count, 1);
    }
}
