//! Orchestration of one run: load, validate, clean, summarize, chart, write,
//! and optionally hand over to the external script.

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Local;
use log::{info, warn};

use crate::{
    artifacts::{ArtifactWriter, ChartOutcome, report::ReportDocument},
    capabilities::Capabilities,
    charts::{self, ChartRequest},
    clean::{self, CleaningSummary},
    config::Config,
    dataset::Dataset,
    error::ExternalToolError,
    io_utils, loader,
    runner::{RunnerOutput, ScriptRunner},
    stats::{self, StatisticsSummary},
    validate::{self, DiagnosticKind, ValidationReport},
};

pub const TIMESTAMP_FORMAT: &str = "%d/%m/%Y %H:%M:%S";

#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Also run the external statistical script after writing artifacts.
    pub run_external: bool,
}

/// In-memory result of the validation, cleaning and aggregation stages.
#[derive(Debug, Clone)]
pub struct Analysis {
    pub records_loaded: usize,
    pub cleaned: Dataset,
    pub report: ValidationReport,
    pub cleaning: CleaningSummary,
    pub statistics: StatisticsSummary,
    pub charts: Vec<ChartRequest>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExternalOutcome {
    NotRequested,
    Succeeded(RunnerOutput),
    Failed(ExternalToolError),
}

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub source: PathBuf,
    pub fingerprint: String,
    pub analysis: Analysis,
    pub charts: Vec<ChartOutcome>,
    pub artifacts: Vec<PathBuf>,
    pub external: ExternalOutcome,
}

impl RunSummary {
    /// Diagnostics including any external-tool failure.
    pub fn report(&self) -> &ValidationReport {
        &self.analysis.report
    }
}

/// Runs every in-memory stage. Nothing here touches the filesystem.
pub fn analyze(dataset: Dataset, config: &Config) -> Analysis {
    let records_loaded = dataset.len();
    let mut report = ValidationReport::new();

    validate::validate_schema(&dataset, &mut report);
    let (cleaned, cleaning) = clean::clean(dataset, &mut report);
    let statistics = stats::summarize(&cleaned, &mut report);
    let charts = charts::plan_charts(&cleaned, &config.subtype_culture, &mut report);

    Analysis {
        records_loaded,
        cleaned,
        report,
        cleaning,
        statistics,
        charts,
    }
}

/// Validation only: loads the input and returns the schema diagnostics
/// without cleaning or writing anything.
pub fn validate_only(config: &Config) -> Result<(loader::LoadedSource, ValidationReport)> {
    let encoding = io_utils::resolve_encoding(config.input_encoding.as_deref())?;
    let source = loader::load(&config.data_file, encoding, &Capabilities::without_external())?;
    let mut report = ValidationReport::new();
    validate::validate_schema(&source.dataset, &mut report);
    Ok((source, report))
}

/// Full run. A load failure aborts before any artifact is touched; every
/// later problem is recorded in the returned summary.
pub fn run(
    config: &Config,
    capabilities: &Capabilities,
    options: RunOptions,
    writer: &mut dyn ArtifactWriter,
) -> Result<RunSummary> {
    let encoding = io_utils::resolve_encoding(config.input_encoding.as_deref())?;
    let source = loader::load(&config.data_file, encoding, capabilities)?;
    info!(
        "Loaded {} record(s) with {} column(s) from {:?}",
        source.dataset.len(),
        source.dataset.columns().len(),
        config.data_file
    );

    let mut analysis = analyze(source.dataset, config);

    writer.prepare().context("Preparing output directories")?;
    let mut artifacts = Vec::new();
    if let Some(global) = &analysis.statistics.global {
        artifacts.push(writer.write_global_table(global)?);
    }
    if let Some(groups) = &analysis.statistics.by_culture {
        artifacts.push(writer.write_group_table(groups)?);
    }

    let charts = if capabilities.chart_renderer {
        analysis
            .charts
            .iter()
            .map(|request| writer.render_chart(request))
            .collect::<Vec<_>>()
    } else {
        warn!("No chart renderer available; {} chart(s) skipped", analysis.charts.len());
        analysis
            .charts
            .iter()
            .map(|request| ChartOutcome {
                id: request.id,
                result: Err("no chart renderer available".to_string()),
            })
            .collect()
    };
    for outcome in &charts {
        match &outcome.result {
            Ok(path) => artifacts.push(path.clone()),
            Err(reason) => analysis.report.push(
                DiagnosticKind::StageSkipped,
                format!("Chart {} failed: {reason}", outcome.id.file_stem()),
                None,
            ),
        }
    }

    artifacts.push(writer.write_cleaned(&analysis.cleaned)?);

    let document = ReportDocument {
        title: config.report_title.clone(),
        author: config.author.clone(),
        generated_at: Local::now().format(TIMESTAMP_FORMAT).to_string(),
        source: config.data_file.display().to_string(),
        fingerprint: source.fingerprint.clone(),
        records_loaded: analysis.records_loaded,
        records_kept: analysis.cleaned.len(),
        global: analysis.statistics.global,
        groups: analysis.statistics.by_culture.clone(),
        charts: charts.clone(),
        diagnostics: analysis.report.entries().to_vec(),
    };
    artifacts.push(writer.write_report(&document)?);

    let external = if options.run_external {
        match ScriptRunner::new(config, capabilities).and_then(|runner| runner.run()) {
            Ok(output) => ExternalOutcome::Succeeded(output),
            Err(err) => {
                warn!("External analysis not completed: {err}");
                analysis
                    .report
                    .push(DiagnosticKind::ExternalTool, err.to_string(), None);
                ExternalOutcome::Failed(err)
            }
        }
    } else {
        ExternalOutcome::NotRequested
    };

    info!(
        "Run finished: {} artifact(s), {} diagnostic(s)",
        artifacts.len(),
        analysis.report.len()
    );
    Ok(RunSummary {
        source: config.data_file.clone(),
        fingerprint: source.fingerprint,
        analysis,
        charts,
        artifacts,
        external,
    })
}
