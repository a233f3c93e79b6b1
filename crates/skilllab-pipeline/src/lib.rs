//! Pipeline Engine (spec.md §4.6, C7): ordered step execution with shared
//! context, per-step timing, and error capture.
//!
//! Grounded on the teacher's `Phase`/`PhaseContext` trait shape in
//! `xchecker-phase-api`: a small trait object per unit of work, a mutable
//! context threaded through the run, and a registry mapping pipeline names
//! to ordered step lists.

use async_trait::async_trait;
use chrono::Utc;
use skilllab_config::Config;
use skilllab_errors::{Result, SkillLabError};
use skilllab_store::MetricsStore;
use skilllab_types::RunStatus;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{error, info, instrument};

/// Outcome of one step invocation, recorded as a `StepExecution` row.
#[derive(Debug, Clone, Default)]
pub struct StepOutcome {
    pub document_count: u32,
    pub details: Option<serde_json::Value>,
}

/// Mutable state threaded through a pipeline run (spec.md §4.6).
pub struct PipelineContext {
    pub config: Config,
    pub store: Arc<MetricsStore>,
    pub pipeline_run_id: Option<i64>,
    pub step_results: HashMap<String, serde_json::Value>,
    pub errors: Vec<(String, String)>,
    pub documents_processed: u32,
    pub start_time: chrono::DateTime<Utc>,
    cancelled: Arc<AtomicBool>,
}

impl PipelineContext {
    #[must_use]
    pub fn new(config: Config, store: Arc<MetricsStore>) -> Self {
        Self {
            config,
            store,
            pipeline_run_id: None,
            step_results: HashMap::new(),
            errors: Vec::new(),
            documents_processed: 0,
            start_time: Utc::now(),
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// A cloneable handle a worker pool can poll between documents (spec.md
    /// §5 Cancellation: "a step-in-progress MAY observe a cancellation flag
    /// at its next per-document boundary").
    #[must_use]
    pub fn cancellation_handle(&self) -> Arc<AtomicBool> {
        self.cancelled.clone()
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }
}

/// One unit of work in a pipeline (spec.md §4.7 Step Implementations are
/// thin adapters implementing this trait).
#[async_trait]
pub trait Step: Send + Sync {
    fn name(&self) -> &str;
    async fn execute(&self, ctx: &mut PipelineContext) -> Result<StepOutcome>;
}

/// Registry of named, ordered step sequences (spec.md §4.6: "Pipelines are
/// declared as ordered step sequences registered under names").
#[derive(Default)]
pub struct PipelineEngine {
    pipelines: HashMap<String, Vec<Arc<dyn Step>>>,
}

impl PipelineEngine {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_pipeline(&mut self, name: impl Into<String>, steps: Vec<Arc<dyn Step>>) {
        self.pipelines.insert(name.into(), steps);
    }

    /// Runs `pipeline_name` sliced to `[start_step, end_step]` inclusive by
    /// step name, per spec.md §4.6.
    #[instrument(skip(self, ctx))]
    pub async fn run(
        &self,
        pipeline_name: &str,
        start_step: &str,
        end_step: &str,
        ctx: &mut PipelineContext,
    ) -> Result<RunStatus> {
        let steps = self
            .pipelines
            .get(pipeline_name)
            .ok_or_else(|| SkillLabError::SchemaFailure {
                detail: format!("unknown pipeline '{pipeline_name}'"),
            })?;

        let start_idx = steps.iter().position(|s| s.name() == start_step).ok_or_else(|| {
            SkillLabError::InvalidSlice {
                start: start_step.to_string(),
                end: end_step.to_string(),
            }
        })?;
        let end_idx = steps.iter().position(|s| s.name() == end_step).ok_or_else(|| {
            SkillLabError::InvalidSlice {
                start: start_step.to_string(),
                end: end_step.to_string(),
            }
        })?;
        if start_idx > end_idx {
            return Err(SkillLabError::InvalidSlice {
                start: start_step.to_string(),
                end: end_step.to_string(),
            });
        }

        let run_id = ctx.store.start_pipeline_run(start_step, end_step).await?;
        ctx.pipeline_run_id = Some(run_id);
        info!(run_id, pipeline_name, "pipeline run started");

        let mut final_status = RunStatus::Completed;
        for step in &steps[start_idx..=end_idx] {
            if ctx.is_cancelled() {
                final_status = RunStatus::Cancelled;
                break;
            }
            match step.execute(ctx).await {
                Ok(outcome) => {
                    ctx.documents_processed += outcome.document_count;
                    if let Some(details) = outcome.details {
                        ctx.step_results.insert(step.name().to_string(), details);
                    }
                }
                Err(err) => {
                    error!(step = step.name(), %err, "step failed, aborting pipeline");
                    ctx.errors.push((step.name().to_string(), err.to_string()));
                    final_status = RunStatus::Failed;
                    break;
                }
            }
        }

        let details = serde_json::json!({ "errors": ctx.errors });
        ctx.store
            .finish_pipeline_run(run_id, final_status, ctx.documents_processed, Some(details))
            .await?;
        Ok(final_status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct OkStep(&'static str);
    #[async_trait]
    impl Step for OkStep {
        fn name(&self) -> &str {
            self.0
        }
        async fn execute(&self, ctx: &mut PipelineContext) -> Result<StepOutcome> {
            let run_id = ctx.pipeline_run_id.unwrap();
            let exec_id = ctx.store.start_step_execution(run_id, self.0).await?;
            ctx.store
                .finish_step_execution(exec_id, RunStatus::Completed, 1, None)
                .await?;
            Ok(StepOutcome {
                document_count: 1,
                details: None,
            })
        }
    }

    struct FailingStep;
    #[async_trait]
    impl Step for FailingStep {
        fn name(&self) -> &str {
            "boom"
        }
        async fn execute(&self, _ctx: &mut PipelineContext) -> Result<StepOutcome> {
            Err(SkillLabError::SchemaFailure {
                detail: "kaboom".into(),
            })
        }
    }

    async fn context() -> PipelineContext {
        let store = Arc::new(MetricsStore::in_memory().await.unwrap());
        PipelineContext::new(Config::default(), store)
    }

    #[tokio::test]
    async fn runs_full_pipeline_in_order() {
        let mut engine = PipelineEngine::new();
        engine.register_pipeline(
            "full",
            vec![Arc::new(OkStep("ocr")), Arc::new(OkStep("json")), Arc::new(OkStep("dataset"))],
        );
        let mut ctx = context().await;
        let status = engine.run("full", "ocr", "dataset", &mut ctx).await.unwrap();
        assert_eq!(status, RunStatus::Completed);
        assert_eq!(ctx.documents_processed, 3);
    }

    #[tokio::test]
    async fn stops_on_step_failure_and_marks_run_failed() {
        let mut engine = PipelineEngine::new();
        engine.register_pipeline(
            "full",
            vec![Arc::new(OkStep("ocr")), Arc::new(FailingStep), Arc::new(OkStep("dataset"))],
        );
        let mut ctx = context().await;
        let status = engine.run("full", "ocr", "dataset", &mut ctx).await.unwrap();
        assert_eq!(status, RunStatus::Failed);
        assert_eq!(ctx.documents_processed, 1);
        assert_eq!(ctx.errors.len(), 1);
    }

    #[tokio::test]
    async fn rejects_inverted_slice() {
        let mut engine = PipelineEngine::new();
        engine.register_pipeline("full", vec![Arc::new(OkStep("ocr")), Arc::new(OkStep("json"))]);
        let mut ctx = context().await;
        let result = engine.run("full", "json", "ocr", &mut ctx).await;
        assert!(matches!(result, Err(SkillLabError::InvalidSlice { .. })));
    }

    #[tokio::test]
    async fn rejects_unrecognized_step_name() {
        let mut engine = PipelineEngine::new();
        engine.register_pipeline("full", vec![Arc::new(OkStep("ocr")), Arc::new(OkStep("json"))]);
        let mut ctx = context().await;
        let result = engine.run("full", "ocr", "dataset", &mut ctx).await;
        assert!(matches!(result, Err(SkillLabError::InvalidSlice { .. })));
    }

    #[tokio::test]
    async fn empty_input_window_still_completes_with_zero_documents() {
        // spec.md S6: structure step sees empty input, emits a zero-result
        // StepExecution with status=completed, pipeline completes without error.
        struct ZeroStep;
        #[async_trait]
        impl Step for ZeroStep {
            fn name(&self) -> &str {
                "json"
            }
            async fn execute(&self, ctx: &mut PipelineContext) -> Result<StepOutcome> {
                let run_id = ctx.pipeline_run_id.unwrap();
                let exec_id = ctx.store.start_step_execution(run_id, self.name()).await?;
                ctx.store
                    .finish_step_execution(exec_id, RunStatus::Completed, 0, None)
                    .await?;
                Ok(StepOutcome::default())
            }
        }
        let mut engine = PipelineEngine::new();
        engine.register_pipeline("full", vec![Arc::new(ZeroStep), Arc::new(OkStep("correction"))]);
        let mut ctx = context().await;
        let status = engine.run("full", "json", "correction", &mut ctx).await.unwrap();
        assert_eq!(status, RunStatus::Completed);
    }
}
