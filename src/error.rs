//! Typed failures raised at the pipeline's outer boundaries.
//!
//! [`LoadError`] covers the conditions that abort a run before any artifact
//! is written. [`ExternalToolError`] covers the optional statistical script,
//! whose failures are recorded and never abort the run. Everything between
//! those boundaries degrades into diagnostics (see [`crate::validate`]).

use std::{path::PathBuf, time::Duration};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Input file not found: {path:?}")]
    MissingInput { path: PathBuf },
    #[error("Unsupported input format '{extension}' for {path:?} (use .csv, .tsv, .xlsx, .xls or .ods)")]
    UnsupportedFormat { path: PathBuf, extension: String },
    #[error("Cannot read {path:?}: no {reader} in this build")]
    ReaderUnavailable { path: PathBuf, reader: String },
    #[error("Failed to parse {path:?}: {reason}")]
    ParseFailure { path: PathBuf, reason: String },
}

impl LoadError {
    pub(crate) fn parse(path: &std::path::Path, reason: impl Into<String>) -> Self {
        LoadError::ParseFailure {
            path: path.to_path_buf(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExternalToolError {
    #[error("External tool unavailable: {reason}")]
    Unavailable { reason: String },
    #[error("External tool timed out after {}s", .timeout.as_secs())]
    Timeout { timeout: Duration },
    #[error("External tool failed ({status}): {stderr}")]
    Failure { status: String, stderr: String },
}
