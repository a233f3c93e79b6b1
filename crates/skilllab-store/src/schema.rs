//! Schema creation, isolated from use (spec.md §4.2: "the design MUST
//! isolate schema-creation from use so both stores can be instantiated with
//! separate paths"). Both the Metrics Store and the Review Store share the
//! `documents`/`issues` table shape; each adds its own append-only tables.

use sqlx::SqlitePool;

pub const DOCUMENTS_AND_ISSUES: &str = r#"
CREATE TABLE IF NOT EXISTS documents (
    doc_id TEXT PRIMARY KEY,
    filename TEXT NOT NULL,
    status TEXT NOT NULL,
    ocr_confidence REAL,
    json_confidence REAL,
    correction_count INTEGER NOT NULL DEFAULT 0,
    flagged_for_review INTEGER NOT NULL DEFAULT 0,
    review_status TEXT NOT NULL DEFAULT 'none',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS issues (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    doc_id TEXT NOT NULL REFERENCES documents(doc_id),
    issue_type TEXT NOT NULL,
    issue_details TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_issues_doc_id ON issues(doc_id);
"#;

pub const METRICS_TABLES: &str = r#"
CREATE TABLE IF NOT EXISTS pipeline_runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    start_step TEXT NOT NULL,
    end_step TEXT NOT NULL,
    start_time TEXT NOT NULL,
    end_time TEXT,
    status TEXT NOT NULL,
    document_count INTEGER NOT NULL DEFAULT 0,
    details TEXT
);

CREATE TABLE IF NOT EXISTS step_executions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    run_id INTEGER NOT NULL REFERENCES pipeline_runs(id),
    step_name TEXT NOT NULL,
    start_time TEXT NOT NULL,
    end_time TEXT,
    status TEXT NOT NULL,
    document_count INTEGER NOT NULL DEFAULT 0,
    details TEXT
);
CREATE INDEX IF NOT EXISTS idx_step_executions_run_id ON step_executions(run_id);

CREATE TABLE IF NOT EXISTS metrics (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp TEXT NOT NULL,
    metric_type TEXT NOT NULL,
    metric_name TEXT NOT NULL,
    value REAL NOT NULL,
    details TEXT
);

CREATE TABLE IF NOT EXISTS resource_samples (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp TEXT NOT NULL,
    activity TEXT NOT NULL,
    cpu_percent REAL NOT NULL,
    memory_mb REAL NOT NULL,
    gpu_index INTEGER,
    gpu_percent REAL,
    gpu_memory_mb REAL
);
"#;

pub const REVIEW_TABLES: &str = r#"
CREATE TABLE IF NOT EXISTS review_feedback (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    doc_id TEXT NOT NULL REFERENCES documents(doc_id),
    status TEXT NOT NULL,
    changes_made INTEGER NOT NULL,
    reason TEXT,
    fields_corrected TEXT NOT NULL,
    timestamp TEXT NOT NULL,
    reviewer TEXT
);

CREATE TABLE IF NOT EXISTS field_corrections (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    doc_id TEXT NOT NULL REFERENCES documents(doc_id),
    field_name TEXT NOT NULL,
    original_value TEXT,
    corrected_value TEXT,
    timestamp TEXT NOT NULL
);
"#;

pub async fn apply_metrics_schema(pool: &SqlitePool) -> sqlx::Result<()> {
    sqlx::raw_sql(DOCUMENTS_AND_ISSUES).execute(pool).await?;
    sqlx::raw_sql(METRICS_TABLES).execute(pool).await?;
    Ok(())
}

pub async fn apply_review_schema(pool: &SqlitePool) -> sqlx::Result<()> {
    sqlx::raw_sql(DOCUMENTS_AND_ISSUES).execute(pool).await?;
    sqlx::raw_sql(REVIEW_TABLES).execute(pool).await?;
    Ok(())
}
