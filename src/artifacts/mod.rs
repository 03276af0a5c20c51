//! Persistence of run artifacts: statistics tables, charts, the cleaned
//! export and the HTML report.
//!
//! Stages talk to an [`ArtifactWriter`]; [`FsArtifactWriter`] is the
//! filesystem implementation used by the binary.

pub mod report;
pub mod svg;
pub mod tables;

use std::{
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use log::{debug, info, warn};

use crate::{
    charts::{ChartId, ChartRequest},
    config::{Config, OutputFormat},
    dataset::Dataset,
    stats::{GroupStats, SummaryStats},
};

use report::ReportDocument;

pub const GLOBAL_TABLE_STEM: &str = "estatisticas_geral";
pub const GROUP_TABLE_STEM: &str = "estatisticas_por_cultura";
pub const REPORT_FILE: &str = "relatorio_agro.html";
pub const EXPORT_FILE: &str = "base_limpa.csv";

/// Result of rendering one chart; failures carry the reason and never abort.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartOutcome {
    pub id: ChartId,
    pub result: Result<PathBuf, String>,
}

impl ChartOutcome {
    pub fn is_written(&self) -> bool {
        self.result.is_ok()
    }
}

pub trait ArtifactWriter {
    /// Creates output directories and removes artifacts a previous run may
    /// have left behind.
    fn prepare(&mut self) -> Result<()>;
    fn write_global_table(&mut self, stats: &SummaryStats) -> Result<PathBuf>;
    fn write_group_table(&mut self, groups: &[GroupStats]) -> Result<PathBuf>;
    fn render_chart(&mut self, request: &ChartRequest) -> ChartOutcome;
    fn write_cleaned(&mut self, dataset: &Dataset) -> Result<PathBuf>;
    fn write_report(&mut self, document: &ReportDocument) -> Result<PathBuf>;
}

#[derive(Debug, Clone)]
pub struct FsArtifactWriter {
    reports_dir: PathBuf,
    graphics_dir: PathBuf,
    export_dir: PathBuf,
    format: OutputFormat,
    width: u32,
    height: u32,
}

impl FsArtifactWriter {
    pub fn new(config: &Config) -> Self {
        let (width, height) = config.chart_size.pixels(config.chart_dpi);
        Self {
            reports_dir: config.reports_dir.clone(),
            graphics_dir: config.graphics_dir(),
            export_dir: config.export_dir.clone(),
            format: config.output_format,
            width,
            height,
        }
    }

    pub fn global_table_path(&self) -> PathBuf {
        self.reports_dir
            .join(format!("{GLOBAL_TABLE_STEM}.{}", self.format.extension()))
    }

    pub fn group_table_path(&self) -> PathBuf {
        self.reports_dir
            .join(format!("{GROUP_TABLE_STEM}.{}", self.format.extension()))
    }

    pub fn report_path(&self) -> PathBuf {
        self.reports_dir.join(REPORT_FILE)
    }

    pub fn export_path(&self) -> PathBuf {
        self.export_dir.join(EXPORT_FILE)
    }

    pub fn chart_path(&self, id: ChartId) -> PathBuf {
        self.graphics_dir.join(format!("{}.svg", id.file_stem()))
    }

    /// Every file this writer may produce, across all output formats.
    fn known_artifacts(&self) -> Vec<PathBuf> {
        let mut paths = Vec::new();
        for format in [OutputFormat::Csv, OutputFormat::Tsv, OutputFormat::Json] {
            for stem in [GLOBAL_TABLE_STEM, GROUP_TABLE_STEM] {
                paths.push(
                    self.reports_dir
                        .join(format!("{stem}.{}", format.extension())),
                );
            }
        }
        paths.extend(ChartId::ALL.iter().map(|id| self.chart_path(*id)));
        paths.push(self.report_path());
        paths.push(self.export_path());
        paths
    }

    fn graphics_prefix(&self) -> String {
        self.graphics_dir
            .strip_prefix(&self.reports_dir)
            .map(|relative| relative.to_string_lossy().replace('\\', "/"))
            .unwrap_or_else(|_| self.graphics_dir.to_string_lossy().into_owned())
    }
}

fn remove_if_present(path: &Path) -> Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
        Err(err) => Err(err).with_context(|| format!("Removing stale artifact {path:?}")),
    }
}

impl ArtifactWriter for FsArtifactWriter {
    fn prepare(&mut self) -> Result<()> {
        for dir in [&self.reports_dir, &self.graphics_dir, &self.export_dir] {
            fs::create_dir_all(dir).with_context(|| format!("Creating directory {dir:?}"))?;
        }
        let mut removed = 0;
        for path in self.known_artifacts() {
            if remove_if_present(&path)? {
                debug!("Removed stale artifact {path:?}");
                removed += 1;
            }
        }
        if removed > 0 {
            info!("Removed {removed} artifact(s) from a previous run");
        }
        Ok(())
    }

    fn write_global_table(&mut self, stats: &SummaryStats) -> Result<PathBuf> {
        let path = self.global_table_path();
        tables::write_global(&path, self.format, stats)?;
        info!("Wrote global statistics to {path:?}");
        Ok(path)
    }

    fn write_group_table(&mut self, groups: &[GroupStats]) -> Result<PathBuf> {
        let path = self.group_table_path();
        tables::write_groups(&path, self.format, groups)?;
        info!("Wrote {} group row(s) to {path:?}", groups.len());
        Ok(path)
    }

    fn render_chart(&mut self, request: &ChartRequest) -> ChartOutcome {
        let path = self.chart_path(request.id);
        let result = svg::render(request, self.width, self.height)
            .and_then(|document| {
                fs::write(&path, document).with_context(|| format!("Writing chart {path:?}"))
            })
            .map(|()| path.clone())
            .map_err(|err| format!("{err:#}"));
        match &result {
            Ok(_) => info!("Rendered chart {path:?}"),
            Err(reason) => warn!("Chart {} failed: {reason}", request.id.file_stem()),
        }
        ChartOutcome {
            id: request.id,
            result,
        }
    }

    fn write_cleaned(&mut self, dataset: &Dataset) -> Result<PathBuf> {
        let path = self.export_path();
        tables::write_dataset(&path, dataset)?;
        info!("Exported {} cleaned record(s) to {path:?}", dataset.len());
        Ok(path)
    }

    fn write_report(&mut self, document: &ReportDocument) -> Result<PathBuf> {
        let path = self.report_path();
        let html = report::render(document, &self.graphics_prefix())
            .context("Rendering HTML report")?;
        fs::write(&path, html).with_context(|| format!("Writing report {path:?}"))?;
        info!("Wrote report to {path:?}");
        Ok(path)
    }
}
