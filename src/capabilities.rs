//! Capability probe, run once per invocation.

use log::{info, warn};

use crate::{
    config::Config,
    error::ExternalToolError,
    runner::{self, VERSION_PROBE_TIMEOUT},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capabilities {
    /// Spreadsheet workbooks (`.xlsx`, `.xls`, `.ods`) can be read.
    pub spreadsheet_reader: bool,
    /// Charts can be rendered to image files.
    pub chart_renderer: bool,
    /// Version reported by the external interpreter, or why it is unusable.
    pub external_runner: Result<String, ExternalToolError>,
}

impl Capabilities {
    /// Probes the external interpreter named by `r_script_path`.
    pub fn probe(config: &Config) -> Self {
        let external_runner = runner::probe_version(&config.r_script_path, VERSION_PROBE_TIMEOUT);
        match &external_runner {
            Ok(version) => info!("{} available (version {version})", config.r_script_path),
            Err(err) => warn!("{} unavailable: {err}", config.r_script_path),
        }
        Self::with_runner(external_runner)
    }

    /// Capabilities when the external interpreter is not needed for this run.
    pub fn without_external() -> Self {
        Self::with_runner(Err(ExternalToolError::Unavailable {
            reason: "not probed".to_string(),
        }))
    }

    /// Built-in readers and renderers come from the compiled feature set.
    pub fn with_runner(external_runner: Result<String, ExternalToolError>) -> Self {
        Self {
            spreadsheet_reader: cfg!(feature = "spreadsheet"),
            chart_renderer: cfg!(feature = "charts"),
            external_runner,
        }
    }

    /// `(capability, status)` rows for the `deps` listing.
    pub fn rows(&self, config: &Config) -> Vec<Vec<String>> {
        let flag = |available: bool| {
            if available { "available" } else { "missing" }.to_string()
        };
        vec![
            vec!["spreadsheet reader".to_string(), flag(self.spreadsheet_reader)],
            vec!["chart renderer (svg)".to_string(), flag(self.chart_renderer)],
            vec![
                format!("external runner ({})", config.r_script_path),
                match &self.external_runner {
                    Ok(version) => format!("available ({version})"),
                    Err(err) => format!("missing: {err}"),
                },
            ],
        ]
    }
}
