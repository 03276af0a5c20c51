//! Data cleaning: report what was wrong, then fix it.
//!
//! Missing and out-of-range productivity values are counted on the incoming
//! data, then missing rows are dropped and the survivors clipped into
//! `[MIN_PRODUCTIVITY, MAX_PRODUCTIVITY]`. A missing value is never counted as
//! out of range, so no record is reported twice.

use itertools::Itertools;
use log::{info, warn};

use crate::{
    dataset::{CULTURA, Dataset, MAX_PRODUCTIVITY, MIN_PRODUCTIVITY, PRODUTIVIDADE, Record},
    validate::{DiagnosticKind, ValidationReport},
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleaningSummary {
    pub dropped: usize,
    pub clipped: usize,
}

impl CleaningSummary {
    pub fn is_noop(&self) -> bool {
        self.dropped == 0 && self.clipped == 0
    }
}

pub fn is_out_of_range(value: f64) -> bool {
    value < MIN_PRODUCTIVITY || value > MAX_PRODUCTIVITY
}

pub fn clean(mut dataset: Dataset, report: &mut ValidationReport) -> (Dataset, CleaningSummary) {
    let mut summary = CleaningSummary::default();

    if dataset.has_column(PRODUTIVIDADE) {
        let missing = dataset
            .records
            .iter()
            .filter(|record| record.productivity().is_none())
            .count();
        report.push(
            DiagnosticKind::MissingValues,
            format!("{PRODUTIVIDADE}: {missing} missing value(s)"),
            Some(missing),
        );

        let out_of_range = dataset
            .records
            .iter()
            .filter_map(Record::productivity)
            .filter(|value| is_out_of_range(*value))
            .count();
        report.push(
            DiagnosticKind::OutOfRange,
            format!(
                "{PRODUTIVIDADE}: {out_of_range} out-of-range value(s) outside [{MIN_PRODUCTIVITY}, {MAX_PRODUCTIVITY}]"
            ),
            Some(out_of_range),
        );

        let before = dataset.records.len();
        dataset
            .records
            .retain(|record| record.productivity().is_some());
        summary.dropped = before - dataset.records.len();

        for record in &mut dataset.records {
            if let Some(value) = record.produtividade_t_ha {
                let clipped = value.clamp(MIN_PRODUCTIVITY, MAX_PRODUCTIVITY);
                if clipped != value {
                    record.produtividade_t_ha = Some(clipped);
                    summary.clipped += 1;
                }
            }
        }
    } else {
        warn!("Column {PRODUTIVIDADE} absent; cleaning skipped");
        report.push(
            DiagnosticKind::StageSkipped,
            format!("Cleaning skipped: column {PRODUTIVIDADE} is absent"),
            None,
        );
    }

    if dataset.has_column(CULTURA) {
        let domain = dataset
            .records
            .iter()
            .filter_map(|record| record.cultura.clone())
            .unique()
            .collect::<Vec<_>>();
        dataset.culture_domain = Some(domain);
    }

    if dataset.is_empty() {
        warn!("No records remain after cleaning");
        report.push(
            DiagnosticKind::EmptyAfterCleaning,
            "No records remain after cleaning",
            Some(0),
        );
    }

    info!(
        "Cleaning finished: {} record(s) kept, {} dropped, {} clipped",
        dataset.len(),
        summary.dropped,
        summary.clipped
    );
    (dataset, summary)
}
