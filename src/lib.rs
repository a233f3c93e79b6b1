//! SkillLab — a resume-PDF ingestion pipeline: extraction, structuring,
//! validation and training-dataset assembly, backed by a dual-store
//! (metrics + review) data model kept coherent with filesystem artifacts
//! by a reconciler.
//!
//! This root crate is a thin entry point. The actual functionality lives in
//! the `skilllab-*` workspace crates; see `skilllab_cli::run` for the CLI
//! surface.

/// Returns the SkillLab version with the crate's semver.
#[must_use]
pub fn skilllab_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

pub use skilllab_cli::run;
