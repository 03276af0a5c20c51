use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::config::{ConfigOverrides, OutputFormat};

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Validate, clean and summarize agricultural productivity data",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run the full pipeline and write tables, charts and the HTML report
    Analyze(AnalyzeArgs),
    /// Load the input and report schema problems without writing anything
    Validate(ValidateArgs),
    /// Report which optional capabilities are available
    Deps(DepsArgs),
}

#[derive(Debug, Args)]
pub struct ConfigArgs {
    /// JSON or YAML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    /// Input data file (.csv, .tsv, .xlsx, .xls, .ods)
    #[arg(short = 'i', long = "input")]
    pub input: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct AnalyzeArgs {
    #[command(flatten)]
    pub config: ConfigArgs,
    /// Directory for statistics tables, charts and the report
    #[arg(short = 'o', long = "output-dir")]
    pub output_dir: Option<PathBuf>,
    /// Directory for the cleaned dataset export
    #[arg(long = "export-dir")]
    pub export_dir: Option<PathBuf>,
    /// Statistics table format (csv, tsv, json)
    #[arg(long, value_parser = parse_format)]
    pub format: Option<OutputFormat>,
    /// Path to the Rscript interpreter
    #[arg(long)]
    pub rscript: Option<String>,
    /// Also run the external R analysis script
    #[arg(long)]
    pub complete: bool,
}

#[derive(Debug, Args)]
pub struct ValidateArgs {
    #[command(flatten)]
    pub config: ConfigArgs,
}

#[derive(Debug, Args)]
pub struct DepsArgs {
    /// JSON or YAML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    /// Path to the Rscript interpreter
    #[arg(long)]
    pub rscript: Option<String>,
}

impl AnalyzeArgs {
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            data_file: self.config.input.clone(),
            reports_dir: self.output_dir.clone(),
            export_dir: self.export_dir.clone(),
            r_script_path: self.rscript.clone(),
            output_format: self.format,
        }
    }
}

impl ValidateArgs {
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            data_file: self.config.input.clone(),
            ..ConfigOverrides::default()
        }
    }
}

impl DepsArgs {
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            r_script_path: self.rscript.clone(),
            ..ConfigOverrides::default()
        }
    }
}

pub fn parse_format(value: &str) -> Result<OutputFormat, String> {
    value.parse().map_err(|err: anyhow::Error| err.to_string())
}
