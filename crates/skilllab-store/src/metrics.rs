//! Metrics Store (spec.md §4.2, C2): owns Document, Issue, PipelineRun,
//! StepExecution, Metric, ResourceSample.

use crate::common;
use crate::rows::{DashboardStats, DocumentDetail};
use crate::schema::apply_metrics_schema;
use chrono::Utc;
use skilllab_errors::Result;
use skilllab_types::{
    Document, DocumentStatus, Issue, IssueType, Metric, PipelineRun, ResourceSample, ReviewStatus,
    RunStatus, StepExecution,
};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;

#[derive(Clone)]
pub struct MetricsStore {
    pool: SqlitePool,
}

impl MetricsStore {
    pub async fn connect(path: &str) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(8)
            .connect(&format!("sqlite://{path}?mode=rwc"))
            .await?;
        apply_metrics_schema(&pool).await?;
        Ok(Self { pool })
    }

    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        apply_metrics_schema(&pool).await?;
        Ok(Self { pool })
    }

    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn register(&self, doc_id: &str, filename: &str) -> Result<()> {
        common::register(&self.pool, doc_id, filename).await
    }

    pub async fn set_status(&self, doc_id: &str, status: DocumentStatus) -> Result<()> {
        common::set_status(&self.pool, doc_id, status).await
    }

    pub async fn set_confidence(&self, doc_id: &str, ocr: Option<f64>, json: Option<f64>) -> Result<()> {
        common::set_confidence(&self.pool, doc_id, ocr, json).await
    }

    pub async fn bump_correction_count(&self, doc_id: &str) -> Result<u32> {
        common::bump_correction_count(&self.pool, doc_id).await
    }

    pub async fn flag(&self, doc_id: &str, issue_type: IssueType, details: &str) -> Result<()> {
        common::flag(&self.pool, doc_id, issue_type, details).await
    }

    pub async fn insert_issue_if_absent(&self, issue: &Issue) -> Result<bool> {
        common::insert_issue_if_absent(&self.pool, issue).await
    }

    pub async fn set_flagged(&self, doc_id: &str, flagged: bool) -> Result<()> {
        common::set_flagged(&self.pool, doc_id, flagged).await
    }

    pub async fn set_review_status(&self, doc_id: &str, status: ReviewStatus) -> Result<()> {
        common::set_review_status(&self.pool, doc_id, status).await
    }

    pub async fn get_document(&self, doc_id: &str) -> Result<Option<Document>> {
        common::get_document(&self.pool, doc_id).await
    }

    pub async fn get_document_detail(&self, doc_id: &str) -> Result<DocumentDetail> {
        common::get_document_detail(&self.pool, doc_id).await
    }

    pub async fn list_issues(&self, doc_id: &str) -> Result<Vec<Issue>> {
        common::list_issues(&self.pool, doc_id).await
    }

    pub async fn list_documents(&self) -> Result<Vec<Document>> {
        let rows: Vec<crate::rows::DocumentRow> =
            sqlx::query_as("SELECT * FROM documents ORDER BY doc_id")
                .fetch_all(&self.pool)
                .await?;
        rows.into_iter()
            .map(crate::rows::DocumentRow::into_document)
            .collect()
    }

    pub async fn dashboard_stats(&self) -> Result<DashboardStats> {
        common::dashboard_stats(&self.pool).await
    }

    /// Records a `PipelineRun(running)` row, returning its id (spec.md §4.6
    /// step 1).
    pub async fn start_pipeline_run(&self, start_step: &str, end_step: &str) -> Result<i64> {
        let now = Utc::now().to_rfc3339();
        let result = sqlx::query(
            "INSERT INTO pipeline_runs (start_step, end_step, start_time, status, document_count) VALUES (?1, ?2, ?3, ?4, 0)",
        )
        .bind(start_step)
        .bind(end_step)
        .bind(&now)
        .bind(RunStatus::Running.to_string())
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    pub async fn finish_pipeline_run(
        &self,
        run_id: i64,
        status: RunStatus,
        document_count: u32,
        details: Option<serde_json::Value>,
    ) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            "UPDATE pipeline_runs SET status = ?1, end_time = ?2, document_count = ?3, details = ?4 WHERE id = ?5",
        )
        .bind(status.to_string())
        .bind(&now)
        .bind(document_count)
        .bind(details.map(|d| d.to_string()))
        .bind(run_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_pipeline_run(&self, run_id: i64) -> Result<Option<PipelineRun>> {
        let row: Option<(i64, String, String, String, Option<String>, String, i64, Option<String>)> =
            sqlx::query_as(
                "SELECT id, start_step, end_step, start_time, end_time, status, document_count, details FROM pipeline_runs WHERE id = ?1",
            )
            .bind(run_id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|(id, start_step, end_step, start_time, end_time, status, document_count, details)| {
            Ok(PipelineRun {
                id: Some(id),
                start_step,
                end_step,
                start_time: crate::rows::parse_timestamp(&start_time)?,
                end_time: end_time.as_deref().map(crate::rows::parse_timestamp).transpose()?,
                status: status.parse().map_err(|_| skilllab_errors::SkillLabError::SchemaFailure {
                    detail: format!("unknown run status '{status}'"),
                })?,
                document_count: document_count as u32,
                details: details.and_then(|d| serde_json::from_str(&d).ok()),
            })
        })
        .transpose()
    }

    /// Records one `StepExecution` row (spec.md §4.6: "a step MUST call
    /// `record_start` before work and `record_completion` after").
    pub async fn start_step_execution(&self, run_id: i64, step_name: &str) -> Result<i64> {
        let now = Utc::now().to_rfc3339();
        let result = sqlx::query(
            "INSERT INTO step_executions (run_id, step_name, start_time, status, document_count) VALUES (?1, ?2, ?3, ?4, 0)",
        )
        .bind(run_id)
        .bind(step_name)
        .bind(&now)
        .bind(RunStatus::Running.to_string())
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    pub async fn finish_step_execution(
        &self,
        execution_id: i64,
        status: RunStatus,
        document_count: u32,
        details: Option<serde_json::Value>,
    ) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            "UPDATE step_executions SET status = ?1, end_time = ?2, document_count = ?3, details = ?4 WHERE id = ?5",
        )
        .bind(status.to_string())
        .bind(&now)
        .bind(document_count)
        .bind(details.map(|d| d.to_string()))
        .bind(execution_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn list_step_executions(&self, run_id: i64) -> Result<Vec<StepExecution>> {
        let rows: Vec<(i64, i64, String, String, Option<String>, String, i64, Option<String>)> =
            sqlx::query_as(
                "SELECT id, run_id, step_name, start_time, end_time, status, document_count, details FROM step_executions WHERE run_id = ?1 ORDER BY start_time",
            )
            .bind(run_id)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter()
            .map(|(id, run_id, step_name, start_time, end_time, status, document_count, details)| {
                Ok(StepExecution {
                    id: Some(id),
                    run_id,
                    step_name,
                    start_time: crate::rows::parse_timestamp(&start_time)?,
                    end_time: end_time.as_deref().map(crate::rows::parse_timestamp).transpose()?,
                    status: status.parse().map_err(|_| skilllab_errors::SkillLabError::SchemaFailure {
                        detail: format!("unknown run status '{status}'"),
                    })?,
                    document_count: document_count as u32,
                    details: details.and_then(|d| serde_json::from_str(&d).ok()),
                })
            })
            .collect()
    }

    pub async fn insert_metric(&self, metric: &Metric) -> Result<()> {
        sqlx::query(
            "INSERT INTO metrics (timestamp, metric_type, metric_name, value, details) VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(metric.timestamp.to_rfc3339())
        .bind(&metric.metric_type)
        .bind(&metric.metric_name)
        .bind(metric.value)
        .bind(metric.details.as_ref().map(std::string::ToString::to_string))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn insert_resource_sample(&self, sample: &ResourceSample) -> Result<()> {
        sqlx::query(
            "INSERT INTO resource_samples (timestamp, activity, cpu_percent, memory_mb, gpu_index, gpu_percent, gpu_memory_mb) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )
        .bind(sample.timestamp.to_rfc3339())
        .bind(&sample.activity)
        .bind(sample.cpu_percent)
        .bind(sample.memory_mb)
        .bind(sample.gpu_index)
        .bind(sample.gpu_percent)
        .bind(sample.gpu_memory_mb)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Lists resource samples for one activity in insertion order, for
    /// `skilllab monitor metrics` summaries.
    pub async fn list_resource_samples(&self, activity: &str) -> Result<Vec<ResourceSample>> {
        let rows: Vec<(String, String, f64, f64, Option<i64>, Option<f64>, Option<f64>)> = sqlx::query_as(
            "SELECT timestamp, activity, cpu_percent, memory_mb, gpu_index, gpu_percent, gpu_memory_mb FROM resource_samples WHERE activity = ?1 ORDER BY id",
        )
        .bind(activity)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter()
            .map(
                |(timestamp, activity, cpu_percent, memory_mb, gpu_index, gpu_percent, gpu_memory_mb)| {
                    Ok(ResourceSample {
                        timestamp: crate::rows::parse_timestamp(&timestamp)?,
                        activity,
                        cpu_percent,
                        memory_mb,
                        gpu_index: gpu_index.map(|i| i as u32),
                        gpu_percent,
                        gpu_memory_mb,
                    })
                },
            )
            .collect()
    }
}
