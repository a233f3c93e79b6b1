//! Structure step (spec.md §4.7): calls the Structure collaborator once per
//! document, computes the completeness score as `json_confidence`, and
//! persists `<doc_id>_structured.json`.

use crate::dataset_scoring::completeness_score;
use crate::{apply_quality_policy, contact_evidence_from_text};
use async_trait::async_trait;
use skilllab_collab::{StructureCollaborator, extract_first_json_object};
use skilllab_config::Config;
use skilllab_errors::{Result, SkillLabError};
use skilllab_pipeline::{PipelineContext, Step, StepOutcome};
use skilllab_quality::QualityInput;
use skilllab_store::MetricsStore;
use skilllab_templates::structure_prompt;
use skilllab_types::{Document, DocumentStatus, ResumeRecord, RunStatus};
use skilllab_workspace::Workspace;
use std::sync::Arc;
use tracing::{instrument, warn};

pub struct StructureStep {
    structure: Arc<dyn StructureCollaborator>,
    workspace: Arc<Workspace>,
}

impl StructureStep {
    #[must_use]
    pub fn new(structure: Arc<dyn StructureCollaborator>, workspace: Arc<Workspace>) -> Self {
        Self { structure, workspace }
    }

    #[instrument(skip(self, store, config), fields(document_id = %document.doc_id))]
    async fn process_one(&self, document: &Document, store: &MetricsStore, config: &Config) -> Result<()> {
        let ocr_path = self.workspace.ocr_result_path(&document.doc_id);
        let ocr_text = std::fs::read_to_string(&ocr_path).map_err(|e| SkillLabError::IoFailure {
            path: ocr_path.clone().into_std_path_buf(),
            source: e,
        })?;
        let ocr_response: skilllab_collab::types::OcrResponse = serde_json::from_str(&ocr_text)?;

        let prompt = structure_prompt(&ocr_response.combined_text);
        let response = self.structure.generate(&prompt).await?;
        let parsed = extract_first_json_object(&response);
        let record: ResumeRecord = match parsed {
            Some(value) => serde_json::from_value(value).unwrap_or_default(),
            None => ResumeRecord::default(),
        };

        let score = completeness_score(&record);

        let structured_path = self.workspace.structured_path(&document.doc_id);
        let body = serde_json::to_string_pretty(&record)?;
        std::fs::write(&structured_path, body).map_err(|e| SkillLabError::IoFailure {
            path: structured_path.clone().into_std_path_buf(),
            source: e,
        })?;

        store.set_status(&document.doc_id, DocumentStatus::JsonComplete).await?;
        store.set_confidence(&document.doc_id, None, Some(score)).await?;

        let updated = store
            .get_document(&document.doc_id)
            .await?
            .ok_or_else(|| SkillLabError::UnknownDocument {
                doc_id: document.doc_id.clone(),
            })?;
        let evidence = contact_evidence_from_text(&ocr_response.combined_text);
        let input = QualityInput {
            new_json_confidence: Some(score),
            extracted_name: Some(&record.name),
            extracted_email: Some(&record.email),
            extracted_phone: Some(&record.phone),
            contact_evidence: evidence,
            ..Default::default()
        };
        apply_quality_policy(store, &updated, &input, thresholds_from(config)).await?;

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
impl Step for StructureStep {
    fn name(&self) -> &str {
        "json"
    }

    async fn execute(&self, ctx: &mut PipelineContext) -> Result<StepOutcome> {
        let run_id = ctx.pipeline_run_id.ok_or_else(|| SkillLabError::SchemaFailure {
            detail: "structure step executed outside a pipeline run".to_string(),
        })?;
        let exec_id = ctx.store.start_step_execution(run_id, self.name()).await?;

        let documents = ctx.store.list_documents().await?;
        let pending: Vec<_> = documents
            .into_iter()
            .filter(|d| d.status == DocumentStatus::OcrComplete)
            .collect();

        let mut processed = 0u32;
        for document in pending {
            let store = ctx.store.clone();
            let config = ctx.config.clone();
            match self.process_one(&document, &store, &config).await {
                Ok(()) => processed += 1,
                Err(err) => {
                    warn!(document_id = %document.doc_id, %err, "structure failed for document");
                    ctx.errors.push((document.doc_id.clone(), err.to_string()));
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
    use skilllab_collab::types::{OcrResponse, PageResult};
    use skilllab_errors::Result as SResult;

    struct StubStructure {
        response: String,
    }

    #[async_trait]
    impl StructureCollaborator for StubStructure {
        async fn generate(&self, _prompt: &str) -> SResult<String> {
            Ok(self.response.clone())
        }
        async fn list_models(&self) -> SResult<Vec<String>> {
            Ok(vec![])
        }
    }

    async fn setup() -> (MetricsStore, Arc<Workspace>, tempfile::TempDir, Config) {
        let store = MetricsStore::in_memory().await.unwrap();
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        let workspace = Arc::new(Workspace::ensure(root).unwrap());
        (store, workspace, dir, Config::default())
    }

    #[tokio::test]
    async fn computes_completeness_score_and_advances_status() {
        let (store, workspace, _dir, config) = setup().await;
        store.register("alice", "alice.pdf").await.unwrap();
        store.set_status("alice", DocumentStatus::OcrComplete).await.unwrap();

        let ocr = OcrResponse {
            file_id: "f".into(),
            page_count: 1,
            image_paths: vec![],
            page_results: Vec::<PageResult>::new(),
            combined_text: "Alice Example Software Engineer at Acme".into(),
            processing_time: 0.0,
        };
        std::fs::write(
            workspace.ocr_result_path("alice"),
            serde_json::to_string(&ocr).unwrap(),
        )
        .unwrap();

        let response = r#"{"Name":"Alice","Email":"alice@example.com","Phone":"555-0100","Current_Position":"SE","Skills":["Rust"],"Experience":[]}"#;
        let step = StructureStep::new(Arc::new(StubStructure { response: response.into() }), workspace.clone());
        let store = Arc::new(store);
        let run_id = store.start_pipeline_run("json", "json").await.unwrap();
        let mut ctx = PipelineContext::new(config, store);
        ctx.pipeline_run_id = Some(run_id);
        let outcome = step.execute(&mut ctx).await.unwrap();

        assert_eq!(outcome.document_count, 1);
        let document = ctx.store.get_document("alice").await.unwrap().unwrap();
        assert_eq!(document.status, DocumentStatus::JsonComplete);
        assert!(document.json_confidence.unwrap() > 0.0);
    }

    #[tokio::test]
    async fn falls_back_to_empty_record_on_unparsable_response() {
        let (store, workspace, _dir, config) = setup().await;
        store.register("bob", "bob.pdf").await.unwrap();
        store.set_status("bob", DocumentStatus::OcrComplete).await.unwrap();
        let ocr = OcrResponse {
            file_id: "f".into(),
            page_count: 1,
            image_paths: vec![],
            page_results: Vec::<PageResult>::new(),
            combined_text: "unrelated text".into(),
            processing_time: 0.0,
        };
        std::fs::write(
            workspace.ocr_result_path("bob"),
            serde_json::to_string(&ocr).unwrap(),
        )
        .unwrap();

        let step = StructureStep::new(Arc::new(StubStructure { response: "not json at all".into() }), workspace);
        let store = Arc::new(store);
        let run_id = store.start_pipeline_run("json", "json").await.unwrap();
        let mut ctx = PipelineContext::new(config, store);
        ctx.pipeline_run_id = Some(run_id);
        let outcome = step.execute(&mut ctx).await.unwrap();
        assert_eq!(outcome.document_count, 1);
        let document = ctx.store.get_document("bob").await.unwrap().unwrap();
        assert_eq!(document.json_confidence, Some(0.0));
    }
}
