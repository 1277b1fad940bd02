//! Output module for run summaries and per-run artifacts
//!
//! This module handles:
//! - The [`RunSummary`] produced by every run
//! - Writing link lists, product records and summaries per run
//! - Markdown reports and console statistics

mod artifacts;
mod markdown;
pub mod stats;
mod summary;

pub use artifacts::RunArtifacts;
pub use markdown::{format_markdown_report, write_markdown_report};
pub use stats::{print_categories, print_summary};
pub use summary::{FailedUrl, RunSummary};

#[cfg(test)]
pub(crate) use summary::sample_summary;

use thiserror::Error;

/// Errors that can occur during output operations
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to encode output: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;
