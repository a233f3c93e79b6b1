//! Validate step (spec.md §4.7): runs the auto-correction loop (C6) to
//! convergence or exhaustion, persists the result with its validation block
//! under `validated_json/`, and calls the quality policy (C5).

use crate::{apply_quality_policy, contact_evidence_from_text};
use async_trait::async_trait;
use skilllab_collab::StructureCollaborator;
use skilllab_config::Config;
use skilllab_correction::run_correction_loop;
use skilllab_errors::{Result, SkillLabError};
use skilllab_pipeline::{PipelineContext, Step, StepOutcome};
use skilllab_quality::QualityInput;
use skilllab_store::MetricsStore;
use skilllab_types::{Document, DocumentStatus, ResumeRecord, RunStatus, ValidatedRecord, ValidationBlock};
use skilllab_workspace::Workspace;
use std::sync::Arc;
use tracing::{instrument, warn};

pub struct ValidateStep {
    structure: Arc<dyn StructureCollaborator>,
    workspace: Arc<Workspace>,
}

impl ValidateStep {
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

        let structured_path = self.workspace.structured_path(&document.doc_id);
        let structured_text =
            std::fs::read_to_string(&structured_path).map_err(|e| SkillLabError::IoFailure {
                path: structured_path.clone().into_std_path_buf(),
                source: e,
            })?;
        let initial: serde_json::Value = serde_json::from_str(&structured_text)?;

        let outcome = run_correction_loop(
            self.structure.as_ref(),
            initial,
            &ocr_response.combined_text,
            config.correction.min_coverage_threshold,
            config.correction.max_correction_attempts,
        )
        .await?;

        let record: ResumeRecord = serde_json::from_value(outcome.record.clone()).unwrap_or_default();
        let structure_ok = skilllab_correction::structure_valid(&outcome.record);
        let validated = ValidatedRecord {
            record,
            validation: ValidationBlock {
                is_valid: outcome.is_valid,
                coverage: outcome.coverage,
                correction_attempts: outcome.attempts,
                structure_valid: structure_ok,
            },
            image_paths: ocr_response.image_paths.clone(),
        };

        let validated_path = self.workspace.validated_path(&document.doc_id);
        let body = serde_json::to_string_pretty(&validated)?;
        std::fs::write(&validated_path, body).map_err(|e| SkillLabError::IoFailure {
            path: validated_path.clone().into_std_path_buf(),
            source: e,
        })?;

        store.set_status(&document.doc_id, DocumentStatus::Validated).await?;
        if outcome.attempts > 0 {
            for _ in 0..outcome.attempts {
                store.bump_correction_count(&document.doc_id).await?;
            }
        }

        let updated = store
            .get_document(&document.doc_id)
            .await?
            .ok_or_else(|| SkillLabError::UnknownDocument {
                doc_id: document.doc_id.clone(),
            })?;
        let evidence = contact_evidence_from_text(&ocr_response.combined_text);
        let input = QualityInput {
            new_correction_count: Some(updated.correction_count),
            structure_valid: Some(structure_ok),
            coverage_after_max_attempts: if outcome.attempts >= config.correction.max_correction_attempts {
                Some(outcome.coverage)
            } else {
                None
            },
            extracted_name: Some(&validated.record.name),
            extracted_email: Some(&validated.record.email),
            extracted_phone: Some(&validated.record.phone),
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
impl Step for ValidateStep {
    fn name(&self) -> &str {
        "correction"
    }

    async fn execute(&self, ctx: &mut PipelineContext) -> Result<StepOutcome> {
        let run_id = ctx.pipeline_run_id.ok_or_else(|| SkillLabError::SchemaFailure {
            detail: "validate step executed outside a pipeline run".to_string(),
        })?;
        let exec_id = ctx.store.start_step_execution(run_id, self.name()).await?;

        let documents = ctx.store.list_documents().await?;
        let pending: Vec<_> = documents
            .into_iter()
            .filter(|d| d.status == DocumentStatus::JsonComplete)
            .collect();

        let mut processed = 0u32;
        for document in pending {
            let store = ctx.store.clone();
            let config = ctx.config.clone();
            match self.process_one(&document, &store, &config).await {
                Ok(()) => processed += 1,
                Err(err) => {
                    warn!(document_id = %document.doc_id, %err, "validation failed for document");
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
