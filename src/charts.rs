//! Chart planning: derives every series a chart needs from the cleaned dataset.
//!
//! Renderers receive a [`ChartRequest`] and never look at records themselves,
//! so everything numeric about a chart (bins, density curve, box summaries,
//! proportions, subtype means) is decided here.

use std::collections::BTreeMap;

use log::debug;
use serde::Serialize;

use crate::{
    dataset::{CULTURA, Dataset, PRODUTIVIDADE, SUBTIPO, group_label},
    stats::{SummaryStats, group_by_culture, quantile},
    validate::{DiagnosticKind, ValidationReport},
};

pub const HISTOGRAM_BINS: usize = 12;
const DENSITY_POINTS: usize = 100;
const WHISKER_IQR: f64 = 1.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartId {
    Histogram,
    CultureBoxplot,
    CultureFrequencies,
    SubtypeMeans,
}

impl ChartId {
    pub const ALL: [ChartId; 4] = [
        ChartId::Histogram,
        ChartId::CultureBoxplot,
        ChartId::CultureFrequencies,
        ChartId::SubtypeMeans,
    ];

    pub fn file_stem(self) -> &'static str {
        match self {
            ChartId::Histogram => "hist_densidade",
            ChartId::CultureBoxplot => "boxplot_cultura",
            ChartId::CultureFrequencies => "frequencias_cultura",
            ChartId::SubtypeMeans => "feijao_subtipos",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            ChartId::Histogram => "Produtividade (t/ha): histograma e densidade",
            ChartId::CultureBoxplot => "Produtividade por cultura",
            ChartId::CultureFrequencies => "Frequências e proporções por cultura",
            ChartId::SubtypeMeans => "Produtividade média por subtipo",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistogramBin {
    pub start: f64,
    pub end: f64,
    pub count: usize,
    /// `count / (n * width)`, so the bars integrate to one.
    pub density: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoxSummary {
    pub label: String,
    pub lower_whisker: f64,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub upper_whisker: f64,
    pub outliers: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryShare {
    pub label: String,
    pub count: usize,
    pub proportion: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ChartSeries {
    Histogram {
        bins: Vec<HistogramBin>,
        /// Gaussian kernel density estimate sampled across the value range.
        density: Vec<(f64, f64)>,
    },
    Boxplot(Vec<BoxSummary>),
    Frequencies(Vec<CategoryShare>),
    Means(Vec<(String, f64)>),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartRequest {
    pub id: ChartId,
    pub series: ChartSeries,
}

/// Builds the chart requests the dataset can support. Each chart whose inputs
/// are missing is reported as skipped instead.
pub fn plan_charts(
    dataset: &Dataset,
    subtype_culture: &str,
    report: &mut ValidationReport,
) -> Vec<ChartRequest> {
    let mut requests = Vec::new();
    let mut skip = |id: ChartId, reason: String| {
        debug!("Chart {} skipped: {reason}", id.file_stem());
        report.push(
            DiagnosticKind::StageSkipped,
            format!("Chart {} skipped: {reason}", id.file_stem()),
            None,
        );
    };

    if !dataset.has_column(PRODUTIVIDADE) {
        for id in ChartId::ALL {
            skip(id, format!("column {PRODUTIVIDADE} is absent"));
        }
        return requests;
    }

    let values = dataset.productivity_values();
    if values.is_empty() {
        skip(ChartId::Histogram, "no records to plot".to_string());
    } else {
        requests.push(ChartRequest {
            id: ChartId::Histogram,
            series: ChartSeries::Histogram {
                bins: histogram(&values, HISTOGRAM_BINS),
                density: density_curve(&values, DENSITY_POINTS),
            },
        });
    }

    if !dataset.has_column(CULTURA) {
        for id in [
            ChartId::CultureBoxplot,
            ChartId::CultureFrequencies,
            ChartId::SubtypeMeans,
        ] {
            skip(id, format!("column {CULTURA} is absent"));
        }
        return requests;
    }

    let groups = group_by_culture(dataset);
    if groups.is_empty() {
        skip(ChartId::CultureBoxplot, "no records to plot".to_string());
        skip(ChartId::CultureFrequencies, "no records to plot".to_string());
    } else {
        requests.push(ChartRequest {
            id: ChartId::CultureBoxplot,
            series: ChartSeries::Boxplot(
                groups
                    .iter()
                    .map(|(key, values)| box_summary(group_label(key.as_deref()), values))
                    .collect(),
            ),
        });
        requests.push(ChartRequest {
            id: ChartId::CultureFrequencies,
            series: ChartSeries::Frequencies(shares(&groups)),
        });
    }

    if !dataset.has_column(SUBTIPO) {
        skip(ChartId::SubtypeMeans, format!("column {SUBTIPO} is absent"));
        return requests;
    }
    let means = subtype_means(dataset, subtype_culture);
    if means.is_empty() {
        skip(
            ChartId::SubtypeMeans,
            format!("no {subtype_culture} records with a {SUBTIPO}"),
        );
    } else {
        requests.push(ChartRequest {
            id: ChartId::SubtypeMeans,
            series: ChartSeries::Means(means),
        });
    }

    requests
}

pub fn histogram(values: &[f64], bins: usize) -> Vec<HistogramBin> {
    if values.is_empty() || bins == 0 {
        return Vec::new();
    }
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let (start, end) = if max > min {
        (min, max)
    } else {
        (min - 0.5, max + 0.5)
    };
    let width = (end - start) / bins as f64;
    let mut counts = vec![0usize; bins];
    for value in values {
        let slot = (((value - start) / width).floor() as usize).min(bins - 1);
        counts[slot] += 1;
    }
    let total = values.len() as f64;
    counts
        .into_iter()
        .enumerate()
        .map(|(idx, count)| HistogramBin {
            start: start + idx as f64 * width,
            end: start + (idx + 1) as f64 * width,
            count,
            density: count as f64 / (total * width),
        })
        .collect()
}

/// Gaussian KDE with Scott's bandwidth (`sigma * n^(-1/5)`). Empty when the
/// sample has fewer than two distinct values.
pub fn density_curve(values: &[f64], points: usize) -> Vec<(f64, f64)> {
    let stats = SummaryStats::from_values(values);
    let (Some(sigma), Some(min), Some(max)) = (stats.std_dev, stats.min, stats.max) else {
        return Vec::new();
    };
    if sigma <= 0.0 || points < 2 {
        return Vec::new();
    }
    let n = values.len() as f64;
    let bandwidth = sigma * n.powf(-0.2);
    let norm = 1.0 / (n * bandwidth * (2.0 * std::f64::consts::PI).sqrt());
    let step = (max - min) / (points - 1) as f64;
    (0..points)
        .map(|idx| {
            let x = min + idx as f64 * step;
            let y = values
                .iter()
                .map(|value| {
                    let z = (x - value) / bandwidth;
                    (-0.5 * z * z).exp()
                })
                .sum::<f64>()
                * norm;
            (x, y)
        })
        .collect()
}

pub fn box_summary(label: &str, values: &[f64]) -> BoxSummary {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let q1 = quantile(&sorted, 0.25).unwrap_or_default();
    let median = quantile(&sorted, 0.5).unwrap_or_default();
    let q3 = quantile(&sorted, 0.75).unwrap_or_default();
    let reach = WHISKER_IQR * (q3 - q1);
    let (low_fence, high_fence) = (q1 - reach, q3 + reach);
    let inside = sorted
        .iter()
        .copied()
        .filter(|value| (low_fence..=high_fence).contains(value));
    let lower_whisker = inside.clone().next().unwrap_or(q1);
    let upper_whisker = inside.last().unwrap_or(q3);
    let outliers = sorted
        .iter()
        .copied()
        .filter(|value| !(low_fence..=high_fence).contains(value))
        .collect();
    BoxSummary {
        label: label.to_string(),
        lower_whisker,
        q1,
        median,
        q3,
        upper_whisker,
        outliers,
    }
}

/// Counts per culture, most frequent first, ties broken by label.
fn shares(groups: &[(Option<String>, Vec<f64>)]) -> Vec<CategoryShare> {
    let total: usize = groups.iter().map(|(_, values)| values.len()).sum();
    let mut items = groups
        .iter()
        .map(|(key, values)| CategoryShare {
            label: group_label(key.as_deref()).to_string(),
            count: values.len(),
            proportion: values.len() as f64 / total.max(1) as f64,
        })
        .collect::<Vec<_>>();
    items.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.label.cmp(&b.label)));
    items
}

/// Mean productivity per subtype of `culture`, sorted by subtype.
pub fn subtype_means(dataset: &Dataset, culture: &str) -> Vec<(String, f64)> {
    let mut sums: BTreeMap<&str, (f64, usize)> = BTreeMap::new();
    for record in &dataset.records {
        let (Some(cultura), Some(subtipo), Some(value)) = (
            record.cultura.as_deref(),
            record.subtipo.as_deref(),
            record.productivity(),
        ) else {
            continue;
        };
        if cultura != culture {
            continue;
        }
        let entry = sums.entry(subtipo).or_insert((0.0, 0));
        entry.0 += value;
        entry.1 += 1;
    }
    sums.into_iter()
        .map(|(subtipo, (sum, count))| (subtipo.to_string(), sum / count as f64))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Record;

    #[test]
    fn histogram_counts_every_value_and_integrates_to_one() {
        let values = [0.0, 1.0, 2.0, 3.0, 12.0];
        let bins = histogram(&values, HISTOGRAM_BINS);
        assert_eq!(bins.len(), HISTOGRAM_BINS);
        assert_eq!(bins.iter().map(|b| b.count).sum::<usize>(), values.len());
        assert_eq!(bins.last().map(|b| b.count), Some(1));
        let area: f64 = bins.iter().map(|b| b.density * (b.end - b.start)).sum();
        assert!((area - 1.0).abs() < 1e-9);
    }

    #[test]
    fn histogram_of_constant_values_uses_unit_span() {
        let bins = histogram(&[4.0, 4.0], 4);
        assert_eq!(bins.first().map(|b| b.start), Some(3.5));
        assert_eq!(bins.iter().map(|b| b.count).sum::<usize>(), 2);
    }

    #[test]
    fn density_curve_needs_spread() {
        assert!(density_curve(&[5.0], 10).is_empty());
        assert!(density_curve(&[5.0, 5.0], 10).is_empty());
        let curve = density_curve(&[1.0, 2.0, 3.0], 10);
        assert_eq!(curve.len(), 10);
        assert!(curve.iter().all(|(_, y)| *y > 0.0));
    }

    #[test]
    fn box_summary_separates_outliers() {
        let summary = box_summary("Soja", &[1.0, 2.0, 3.0, 4.0, 20.0]);
        assert_eq!(summary.q1, 2.0);
        assert_eq!(summary.median, 3.0);
        assert_eq!(summary.q3, 4.0);
        assert_eq!(summary.lower_whisker, 1.0);
        assert_eq!(summary.upper_whisker, 4.0);
        assert_eq!(summary.outliers, vec![20.0]);
    }

    #[test]
    fn plan_covers_all_charts_for_complete_data() {
        let dataset = Dataset::with_all_columns(vec![
            Record::with_productivity(3.0).culture("Soja"),
            Record::with_productivity(1.2).culture("Feijão").subtype("Carioca"),
            Record::with_productivity(1.6).culture("Feijão").subtype("Carioca"),
            Record::with_productivity(0.9).culture("Feijão").subtype("Preto"),
        ]);
        let mut report = ValidationReport::new();
        let requests = plan_charts(&dataset, "Feijão", &mut report);
        let ids = requests.iter().map(|r| r.id).collect::<Vec<_>>();
        assert_eq!(ids, ChartId::ALL.to_vec());
        assert!(report.is_empty());

        match &requests[2].series {
            ChartSeries::Frequencies(shares) => {
                assert_eq!(shares[0].label, "Feijão");
                assert_eq!(shares[0].count, 3);
                assert!((shares[0].proportion - 0.75).abs() < 1e-12);
            }
            other => panic!("unexpected series {other:?}"),
        }
        match &requests[3].series {
            ChartSeries::Means(means) => {
                assert_eq!(means.len(), 2);
                assert_eq!(means[0].0, "Carioca");
                assert!((means[0].1 - 1.4).abs() < 1e-12);
            }
            other => panic!("unexpected series {other:?}"),
        }
    }

    #[test]
    fn plan_skips_culture_charts_without_culture_column() {
        let dataset = Dataset::new(
            [PRODUTIVIDADE],
            vec![Record::with_productivity(1.0), Record::with_productivity(2.0)],
        );
        let mut report = ValidationReport::new();
        let requests = plan_charts(&dataset, "Feijão", &mut report);
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].id, ChartId::Histogram);
        assert_eq!(report.of_kind(DiagnosticKind::StageSkipped).count(), 3);
    }

    #[test]
    fn plan_skips_subtype_chart_without_matching_records() {
        let dataset = Dataset::with_all_columns(vec![
            Record::with_productivity(3.0).culture("Soja").subtype("Precoce"),
        ]);
        let mut report = ValidationReport::new();
        let requests = plan_charts(&dataset, "Feijão", &mut report);
        assert!(requests.iter().all(|r| r.id != ChartId::SubtypeMeans));
        assert_eq!(report.len(), 1);
    }
}
