//! Command implementations. Each function owns one subcommand's wiring:
//! build the collaborators/stores/workspace it needs from `Config`, call
//! into the relevant `skilllab-*` library crate, and print a result.

use crate::args::{HealthTarget, MonitorTarget, ReviewTarget, RunTarget, TrainingTarget};
use skilllab_collab::{HttpOcrClient, HttpStructureClient, OcrCollaborator, StructureCollaborator};
use skilllab_config::Config;
use skilllab_errors::{Result, SkillLabError};
use skilllab_lock::PipelineLock;
use skilllab_pipeline::{PipelineContext, PipelineEngine, Step};
use skilllab_store::{MetricsStore, ReviewStore};
use skilllab_workspace::Workspace;
use std::str::FromStr;
use std::sync::Arc;
use tracing::info;

async fn open_metrics(config: &Config) -> Result<MetricsStore> {
    MetricsStore::connect(config.monitoring.metrics_db.as_str()).await
}

async fn open_review(config: &Config) -> Result<ReviewStore> {
    ReviewStore::connect(config.review.db_path.as_str()).await
}

fn workspace(config: &Config) -> Result<Workspace> {
    Workspace::ensure(config.paths.output_dir.clone())
}

fn build_engine(config: &Config, workspace: Arc<Workspace>) -> PipelineEngine {
    let ocr = Arc::new(HttpOcrClient::new(&config.ocr));
    let structure = Arc::new(HttpStructureClient::new(&config.structure));
    let steps: Vec<Arc<dyn Step>> = vec![
        Arc::new(skilllab_steps::ExtractStep::new(ocr, workspace.clone())),
        Arc::new(skilllab_steps::StructureStep::new(structure.clone(), workspace.clone())),
        Arc::new(skilllab_steps::ValidateStep::new(structure, workspace)),
    ];
    let mut engine = PipelineEngine::new();
    engine.register_pipeline("full", steps);
    engine
}

fn print_run_summary(status: skilllab_types::RunStatus, ctx: &PipelineContext) {
    println!("pipeline run: {status}");
    println!("documents processed: {}", ctx.documents_processed);
    for (step, message) in &ctx.errors {
        println!("  [{step}] first error: {message}");
    }
}

pub async fn run(config: &Config, target: RunTarget) -> Result<()> {
    let ws = Arc::new(workspace(config)?);
    let _lock = PipelineLock::acquire(ws.root())?;
    let metrics = Arc::new(open_metrics(config).await?);

    let (start, end) = match &target {
        RunTarget::Pipeline { start, end } => (
            start.clone().unwrap_or_else(|| "ocr".to_string()),
            end.clone().unwrap_or_else(|| "correction".to_string()),
        ),
        RunTarget::Extract => ("ocr".to_string(), "ocr".to_string()),
        RunTarget::Structure => ("json".to_string(), "json".to_string()),
        RunTarget::Train => {
            let stats = skilllab_dataset::build_dataset(
                &ws,
                config.dataset.train_val_split,
                &config.dataset.task_name,
                config.dataset.jpeg_quality,
                config.dataset.shuffle_seed,
            )?;
            println!(
                "dataset build: {} train / {} validation ({} total, {} valid)",
                stats.train_samples, stats.val_samples, stats.total_files, stats.valid_samples
            );
            println!("training loop is an external collaborator (spec.md §1); hand off the dataset above to it");
            return Ok(());
        }
    };

    let engine = build_engine(config, ws.clone());
    let mut ctx = PipelineContext::new(config.clone(), metrics.clone());

    let monitor_handle = config.monitoring.enabled.then(|| {
        let cancelled = ctx.cancellation_handle();
        let interval = std::time::Duration::from_secs(config.monitoring.update_interval_secs.max(1));
        let metrics = metrics.clone();
        tokio::spawn(async move {
            let mut sampler = skilllab_monitor::ResourceMonitor::new("pipeline");
            sampler.run_until_cancelled(&metrics, interval, &cancelled).await
        })
    });

    let status = engine.run("full", &start, &end, &mut ctx).await?;
    ctx.cancel();
    if let Some(handle) = monitor_handle {
        if let Ok(Ok(ticks)) = handle.await {
            info!(ticks, "resource monitor stopped");
        }
    }
    print_run_summary(status, &ctx);
    if status == skilllab_types::RunStatus::Failed {
        return Err(SkillLabError::SchemaFailure {
            detail: "pipeline run failed, see step errors above".to_string(),
        });
    }
    Ok(())
}

pub async fn review(config: &Config, target: ReviewTarget) -> Result<()> {
    let metrics = open_metrics(config).await?;
    let review = open_review(config).await?;
    let ws = workspace(config)?;

    match target {
        ReviewTarget::Status { doc_id } => {
            let detail = skilllab_review::get_detail(&review, &ws, &doc_id).await?;
            println!(
                "{}: status={} review_status={} flagged={}",
                detail.document.doc_id,
                detail.document.status,
                detail.document.review_status,
                detail.document.flagged_for_review
            );
            for issue in &detail.issues {
                println!("  issue: {} - {}", issue.issue_type, issue.issue_details);
            }
        }
        ReviewTarget::List { issue_type } => {
            let filter = issue_type
                .as_deref()
                .map(skilllab_types::IssueType::from_str)
                .transpose()
                .map_err(|_| SkillLabError::ValidationFailure {
                    doc_id: "n/a".to_string(),
                    detail: "unrecognized issue type".to_string(),
                })?;
            let queue = skilllab_review::list_queue(&review, filter).await?;
            println!("{} document(s) pending review", queue.len());
            for doc in queue {
                println!("  {} ({})", doc.doc_id, doc.filename);
            }
        }
        ReviewTarget::Sync => {
            let summary = skilllab_reconciler::sync(&metrics, &review).await?;
            println!(
                "sync: {} documents synced, {} issues synced",
                summary.documents_synced, summary.issues_synced
            );
        }
        ReviewTarget::Approve { doc_id, reviewer } => {
            skilllab_review::approve(&metrics, &review, &doc_id, &[], reviewer).await?;
            println!("{doc_id}: approved");
        }
        ReviewTarget::Reject { doc_id, reason, reviewer } => {
            skilllab_review::reject(&metrics, &review, &doc_id, reason, reviewer).await?;
            println!("{doc_id}: rejected");
        }
        ReviewTarget::Recycle { doc_id } => {
            skilllab_review::recycle_to_training(
                &metrics,
                &review,
                &ws,
                &doc_id,
                &config.dataset.task_name,
                config.dataset.jpeg_quality,
            )
            .await?;
            println!("{doc_id}: recycled to training");
        }
        ReviewTarget::Web => {
            println!("the interactive review UI is out of scope for this core (spec.md §1); use `review list`/`review status`/`review approve`/`review reject`");
        }
    }
    Ok(())
}

pub async fn monitor(config: &Config, target: MonitorTarget) -> Result<()> {
    let metrics = open_metrics(config).await?;
    match target {
        MonitorTarget::Status => {
            let stats = metrics.dashboard_stats().await?;
            println!("documents: {}", stats.total_documents);
            println!("flagged for review: {}", stats.flagged_count);
            println!("reviewed: {}", stats.reviewed_count);
            println!("by status:");
            for (status, count) in stats.status_histogram {
                println!("  {status}: {count}");
            }
            println!("by issue type:");
            for (issue_type, count) in stats.issue_type_histogram {
                println!("  {issue_type}: {count}");
            }
        }
        MonitorTarget::Metrics { activity } => {
            let samples = metrics.list_resource_samples(&activity).await?;
            println!("{} sample(s) for activity '{activity}'", samples.len());
            for sample in samples.iter().rev().take(20) {
                println!(
                    "  {} cpu={:.1}% mem={:.0}MB{}",
                    sample.timestamp,
                    sample.cpu_percent,
                    sample.memory_mb,
                    sample
                        .gpu_percent
                        .map(|g| format!(" gpu={g:.1}%"))
                        .unwrap_or_default()
                );
            }
        }
        MonitorTarget::Dashboard => {
            println!("the live dashboard UI is out of scope for this core (spec.md §1); use `monitor status`/`monitor metrics`");
        }
    }
    Ok(())
}

pub async fn training(config: &Config, target: TrainingTarget) -> Result<()> {
    match target {
        TrainingTarget::ListModels => {
            let structure = HttpStructureClient::new(&config.structure);
            let models = structure.list_models().await?;
            println!("{} model(s) available", models.len());
            for model in models {
                println!("  {model}");
            }
        }
        TrainingTarget::DatasetInfo => {
            let ws = workspace(config)?;
            for split in ["train", "validation"] {
                let index = ws.donut_index_file(split);
                let count = std::fs::read_to_string(index.as_std_path())
                    .map(|text| text.lines().filter(|l| !l.trim().is_empty()).count())
                    .unwrap_or(0);
                println!("{split}: {count} sample(s)");
            }
        }
        TrainingTarget::Web => {
            println!("the training dashboard UI is out of scope for this core (spec.md §1); use `training list-models`/`training dataset-info`");
        }
    }
    Ok(())
}

pub async fn health(config: &Config, target: HealthTarget) -> Result<()> {
    match target {
        HealthTarget::Check => {
            let ocr = HttpOcrClient::new(&config.ocr);
            let structure = HttpStructureClient::new(&config.structure);
            let report = skilllab_health::run_checks(config, &ocr, &structure).await;
            println!("health check: {}", if report.ok { "ok" } else { "failed" });
            for check in &report.checks {
                println!("  [{:?}] {}: {}", check.status, check.name, check.details);
            }
            info!(ok = report.ok, "health check complete");
            if !report.ok {
                return Err(SkillLabError::ServiceUnavailable {
                    service: "health".to_string(),
                    detail: "one or more health checks failed".to_string(),
                });
            }
        }
    }
    Ok(())
}
