//! Single-file embedded relational stores (spec.md §4.2, C1-C3): the
//! Metrics Store and the Review Store. Schema creation is isolated from use
//! (`schema.rs`) so both stores can be instantiated against separate
//! database paths, per the teacher's database-per-concern posture adapted
//! here to sqlx/SQLite.

pub mod common;
pub mod metrics;
pub mod review;
pub mod rows;
pub mod schema;

pub use metrics::MetricsStore;
pub use review::ReviewStore;
pub use rows::{DashboardStats, DocumentDetail};
