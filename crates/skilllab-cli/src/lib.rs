//! Command-line interface for SkillLab (spec.md §6): argument parsing,
//! ambient logging setup, config discovery, and dispatch to the library
//! surfaces exposed by the other `skilllab-*` crates.
//!
//! Grounded on the teacher's `src/cli/` module split (`args`/`run`/
//! `commands`), scaled down to SkillLab's smaller command surface.

mod args;
mod commands;
mod run;

pub use args::{Cli, Commands};
pub use run::run;
