//! Schema validation and the append-only diagnostics report shared by the
//! validation, cleaning and aggregation stages.

use std::fmt;

use log::warn;
use serde::Serialize;

use crate::dataset::{Dataset, EXPECTED_COLUMNS, PRODUTIVIDADE};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// Expected columns absent from the input.
    SchemaIncomplete,
    /// Numeric cells holding text that is not a number.
    NonNumeric,
    MissingValues,
    OutOfRange,
    EmptyAfterCleaning,
    /// A stage or chart was skipped because its inputs are absent.
    StageSkipped,
    ExternalTool,
}

impl DiagnosticKind {
    pub fn label(self) -> &'static str {
        match self {
            DiagnosticKind::SchemaIncomplete => "schema",
            DiagnosticKind::NonNumeric => "non-numeric",
            DiagnosticKind::MissingValues => "missing",
            DiagnosticKind::OutOfRange => "out-of-range",
            DiagnosticKind::EmptyAfterCleaning => "empty",
            DiagnosticKind::StageSkipped => "skipped",
            DiagnosticKind::ExternalTool => "external",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub message: String,
    /// Number of records (or columns, for schema checks) involved.
    pub count: Option<usize>,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ValidationReport {
    entries: Vec<Diagnostic>,
}

impl ValidationReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, kind: DiagnosticKind, message: impl Into<String>, count: Option<usize>) {
        self.entries.push(Diagnostic {
            kind,
            message: message.into(),
            count,
        });
    }

    pub fn entries(&self) -> &[Diagnostic] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn of_kind(&self, kind: DiagnosticKind) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter().filter(move |entry| entry.kind == kind)
    }

    /// Count carried by the most recent entry of `kind`.
    pub fn latest_count(&self, kind: DiagnosticKind) -> Option<usize> {
        self.of_kind(kind).last().and_then(|entry| entry.count)
    }

    pub fn messages(&self) -> Vec<String> {
        self.entries.iter().map(|entry| entry.message.clone()).collect()
    }
}

/// Expected columns absent from `dataset`, in the canonical order.
pub fn missing_columns(dataset: &Dataset) -> Vec<&'static str> {
    EXPECTED_COLUMNS
        .iter()
        .copied()
        .filter(|column| !dataset.has_column(column))
        .collect()
}

/// Flags absent expected columns and unreadable numeric cells. Advisory only:
/// the dataset is never modified and nothing here stops the pipeline.
pub fn validate_schema(dataset: &Dataset, report: &mut ValidationReport) {
    let missing = missing_columns(dataset);
    if !missing.is_empty() {
        let message = format!("Missing columns: {}", missing.join(", "));
        warn!("{message}");
        report.push(DiagnosticKind::SchemaIncomplete, message, Some(missing.len()));
    }
    if dataset.unparsed_numeric > 0 {
        report.push(
            DiagnosticKind::NonNumeric,
            format!(
                "{PRODUTIVIDADE}: {} non-numeric value(s) read as missing",
                dataset.unparsed_numeric
            ),
            Some(dataset.unparsed_numeric),
        );
    }
}
