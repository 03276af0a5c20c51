//! Descriptive statistics over the productivity column, globally and per culture.
//!
//! Quantiles use linear interpolation between order statistics
//! (`h = (n - 1) * p`), the standard spreadsheet/`numpy` "linear" method.
//! Every field that cannot be computed for the available sample is `None`.

use std::collections::HashMap;

use log::{info, warn};
use serde::Serialize;

use crate::{
    dataset::{CULTURA, Dataset, PRODUTIVIDADE, format_exact, format_number, group_label},
    validate::{DiagnosticKind, ValidationReport},
};

pub const GLOBAL_HEADERS: [&str; 8] = ["n", "mean", "median", "std_dev", "min", "max", "q1", "q3"];
pub const GROUP_HEADERS: [&str; 7] = ["group_key", "n", "mean", "median", "std_dev", "min", "max"];

/// How metric cells are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precision {
    /// Shortest form that reads back to the same value; persisted tables.
    Exact,
    /// At most four decimals; console and HTML report.
    Rounded,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct SummaryStats {
    pub count: usize,
    pub mean: Option<f64>,
    pub median: Option<f64>,
    pub std_dev: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub q1: Option<f64>,
    pub q3: Option<f64>,
}

impl SummaryStats {
    pub fn from_values(values: &[f64]) -> Self {
        let mut stats = ColumnStats::default();
        for value in values {
            stats.add_value(*value);
        }
        stats.finish()
    }

    /// Cells in [`GLOBAL_HEADERS`] order; not-computable fields render empty.
    pub fn global_row(&self, precision: Precision) -> Vec<String> {
        let metric = |value| format_metric(value, precision);
        vec![
            self.count.to_string(),
            metric(self.mean),
            metric(self.median),
            metric(self.std_dev),
            metric(self.min),
            metric(self.max),
            metric(self.q1),
            metric(self.q3),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupStats {
    /// Culture value; `None` for records with an empty culture cell.
    pub group_key: Option<String>,
    #[serde(flatten)]
    pub stats: SummaryStats,
}

impl GroupStats {
    pub fn label(&self) -> &str {
        group_label(self.group_key.as_deref())
    }

    /// Cells in [`GROUP_HEADERS`] order.
    pub fn row(&self, precision: Precision) -> Vec<String> {
        let metric = |value| format_metric(value, precision);
        vec![
            self.label().to_string(),
            self.stats.count.to_string(),
            metric(self.stats.mean),
            metric(self.stats.median),
            metric(self.stats.std_dev),
            metric(self.stats.min),
            metric(self.stats.max),
        ]
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StatisticsSummary {
    /// `None` when the productivity column is absent.
    pub global: Option<SummaryStats>,
    /// `None` when the culture column (or the productivity column) is absent.
    pub by_culture: Option<Vec<GroupStats>>,
}

#[derive(Debug, Clone, Default)]
struct ColumnStats {
    values: Vec<f64>,
    sum: f64,
}

impl ColumnStats {
    fn add_value(&mut self, value: f64) {
        self.sum += value;
        self.values.push(value);
    }

    fn count(&self) -> usize {
        self.values.len()
    }

    fn mean(&self) -> Option<f64> {
        if self.values.is_empty() {
            None
        } else {
            Some(self.sum / self.count() as f64)
        }
    }

    fn std_dev(&self) -> Option<f64> {
        if self.count() < 2 {
            return None;
        }
        let mean = self.mean()?;
        let squares: f64 = self
            .values
            .iter()
            .map(|value| (value - mean) * (value - mean))
            .sum();
        Some((squares / (self.count() as f64 - 1.0)).sqrt())
    }

    fn finish(mut self) -> SummaryStats {
        let mean = self.mean();
        let std_dev = self.std_dev();
        self.values.sort_by(f64::total_cmp);
        let sorted = &self.values;
        SummaryStats {
            count: sorted.len(),
            mean,
            median: quantile(sorted, 0.5),
            std_dev,
            min: sorted.first().copied(),
            max: sorted.last().copied(),
            q1: quantile(sorted, 0.25),
            q3: quantile(sorted, 0.75),
        }
    }
}

/// Linear-interpolation quantile of an ascending slice; `None` when empty.
pub fn quantile(sorted: &[f64], p: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let position = (sorted.len() - 1) as f64 * p.clamp(0.0, 1.0);
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    let fraction = position - lower as f64;
    let (low, high) = (sorted[lower], sorted[upper]);
    Some((low + (high - low) * fraction).max(low).min(high))
}

/// Values grouped by culture in first-appearance order. Empty cultures form
/// their own `None` group, distinct from every written label.
pub fn group_by_culture(dataset: &Dataset) -> Vec<(Option<String>, Vec<f64>)> {
    let mut order: HashMap<Option<&str>, usize> = HashMap::new();
    let mut groups: Vec<(Option<String>, Vec<f64>)> = Vec::new();
    for record in &dataset.records {
        let Some(value) = record.productivity() else {
            continue;
        };
        let key = record.culture_key();
        let slot = *order.entry(key).or_insert_with(|| {
            groups.push((key.map(str::to_string), Vec::new()));
            groups.len() - 1
        });
        groups[slot].1.push(value);
    }
    groups
}

pub fn summarize(dataset: &Dataset, report: &mut ValidationReport) -> StatisticsSummary {
    if !dataset.has_column(PRODUTIVIDADE) {
        warn!("Column {PRODUTIVIDADE} absent; statistics skipped");
        report.push(
            DiagnosticKind::StageSkipped,
            format!("Statistics skipped: column {PRODUTIVIDADE} is absent"),
            None,
        );
        return StatisticsSummary::default();
    }

    let global = SummaryStats::from_values(&dataset.productivity_values());

    let by_culture = if dataset.has_column(CULTURA) {
        let groups = group_by_culture(dataset)
            .into_iter()
            .map(|(group_key, values)| GroupStats {
                group_key,
                stats: SummaryStats::from_values(&values),
            })
            .collect::<Vec<_>>();
        Some(groups)
    } else {
        report.push(
            DiagnosticKind::StageSkipped,
            format!("Per-group statistics skipped: column {CULTURA} is absent"),
            None,
        );
        None
    };

    info!(
        "Computed statistics over {} value(s) and {} group(s)",
        global.count,
        by_culture.as_ref().map_or(0, Vec::len)
    );
    StatisticsSummary { global: Some(global), by_culture }
}

pub fn format_metric(metric: Option<f64>, precision: Precision) -> String {
    match precision {
        Precision::Exact => metric.map(format_exact),
        Precision::Rounded => metric.map(format_number),
    }
    .unwrap_or_default()
}
