//! Run configuration.
//!
//! A [`Config`] is resolved once per run from built-in defaults, an optional
//! JSON or YAML file and command-line overrides, in that order of precedence.
//! The resolved value is immutable and handed to each stage by reference.
//! Unrecognized keys in the file are ignored.

use std::{fmt, fs, path::Path, path::PathBuf, str::FromStr, time::Duration};

use anyhow::{Context, Result, anyhow, bail};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

pub const DEFAULT_DATA_FILE: &str = "base_agro.xlsx";
pub const DEFAULT_R_SCRIPT_PATH: &str = "Rscript";
pub const DEFAULT_R_SCRIPT_FILE: &str = "ENTREGA_Fase2_Cap7.R";
pub const DEFAULT_REPORTS_DIR: &str = "relatorios";
pub const DEFAULT_EXPORT_DIR: &str = "exportacoes";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Csv,
    Tsv,
    Json,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Csv => "csv",
            OutputFormat::Tsv => "tsv",
            OutputFormat::Json => "json",
        }
    }
}

impl FromStr for OutputFormat {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(OutputFormat::Csv),
            "tsv" | "tab" => Ok(OutputFormat::Tsv),
            "json" => Ok(OutputFormat::Json),
            other => Err(anyhow!("Unsupported output format '{other}'")),
        }
    }
}

/// Chart canvas in inches; multiplied by the DPI to obtain pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChartSize {
    pub width: f64,
    pub height: f64,
}

impl Default for ChartSize {
    fn default() -> Self {
        Self {
            width: 10.0,
            height: 6.0,
        }
    }
}

impl ChartSize {
    pub fn pixels(&self, dpi: u32) -> (u32, u32) {
        let scale = f64::from(dpi);
        (
            (self.width * scale).round().max(1.0) as u32,
            (self.height * scale).round().max(1.0) as u32,
        )
    }
}

impl FromStr for ChartSize {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        let (width, height) = value
            .split_once(['x', 'X', '×'])
            .ok_or_else(|| anyhow!("Chart size must look like WIDTHxHEIGHT, got '{value}'"))?;
        let width: f64 = width
            .trim()
            .parse()
            .with_context(|| format!("Parsing chart width from '{value}'"))?;
        let height: f64 = height
            .trim()
            .parse()
            .with_context(|| format!("Parsing chart height from '{value}'"))?;
        ChartSize::new(width, height)
    }
}

impl ChartSize {
    pub fn new(width: f64, height: f64) -> Result<Self> {
        if !(width.is_finite() && height.is_finite()) || width <= 0.0 || height <= 0.0 {
            bail!("Chart size must be positive, got {width}x{height}");
        }
        Ok(Self { width, height })
    }
}

impl fmt::Display for ChartSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl Serialize for ChartSize {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (self.width, self.height).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ChartSize {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Pair(f64, f64),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Pair(width, height) => {
                ChartSize::new(width, height).map_err(serde::de::Error::custom)
            }
            Raw::Text(text) => text.parse().map_err(serde::de::Error::custom),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub data_file: PathBuf,
    pub output_format: OutputFormat,
    pub chart_dpi: u32,
    pub chart_size: ChartSize,
    pub r_script_path: String,
    pub r_script_file: PathBuf,
    pub r_timeout_secs: u64,
    pub reports_dir: PathBuf,
    pub export_dir: PathBuf,
    pub input_encoding: Option<String>,
    pub subtype_culture: String,
    pub report_title: String,
    pub author: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_file: PathBuf::from(DEFAULT_DATA_FILE),
            output_format: OutputFormat::Csv,
            chart_dpi: 120,
            chart_size: ChartSize::default(),
            r_script_path: DEFAULT_R_SCRIPT_PATH.to_string(),
            r_script_file: PathBuf::from(DEFAULT_R_SCRIPT_FILE),
            r_timeout_secs: 300,
            reports_dir: PathBuf::from(DEFAULT_REPORTS_DIR),
            export_dir: PathBuf::from(DEFAULT_EXPORT_DIR),
            input_encoding: None,
            subtype_culture: "Feijão".to_string(),
            report_title: "Relatório do Agronegócio".to_string(),
            author: None,
        }
    }
}

/// Values supplied on the command line; `None` keeps the file/default value.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub data_file: Option<PathBuf>,
    pub reports_dir: Option<PathBuf>,
    pub export_dir: Option<PathBuf>,
    pub r_script_path: Option<String>,
    pub output_format: Option<OutputFormat>,
}

impl Config {
    pub fn resolve(file: Option<&Path>, overrides: &ConfigOverrides) -> Result<Self> {
        let mut config = match file {
            Some(path) => {
                Config::load(path).with_context(|| format!("Loading configuration {path:?}"))?
            }
            None => Config::default(),
        };
        config.apply(overrides);
        config.ensure_valid()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw =
            fs::read_to_string(path).with_context(|| format!("Reading config file {path:?}"))?;
        let is_yaml = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("yml") || ext.eq_ignore_ascii_case("yaml"));
        if is_yaml {
            serde_yaml::from_str(&raw).context("Parsing YAML configuration")
        } else {
            serde_json::from_str(&raw).context("Parsing JSON configuration")
        }
    }

    fn apply(&mut self, overrides: &ConfigOverrides) {
        if let Some(path) = &overrides.data_file {
            self.data_file = path.clone();
        }
        if let Some(dir) = &overrides.reports_dir {
            self.reports_dir = dir.clone();
        }
        if let Some(dir) = &overrides.export_dir {
            self.export_dir = dir.clone();
        }
        if let Some(program) = &overrides.r_script_path {
            self.r_script_path = program.clone();
        }
        if let Some(format) = overrides.output_format {
            self.output_format = format;
        }
    }

    fn ensure_valid(&self) -> Result<()> {
        if self.chart_dpi == 0 {
            bail!("chart_dpi must be greater than zero");
        }
        if self.r_timeout_secs == 0 {
            bail!("r_timeout_secs must be greater than zero");
        }
        Ok(())
    }

    pub fn r_timeout(&self) -> Duration {
        Duration::from_secs(self.r_timeout_secs)
    }

    pub fn graphics_dir(&self) -> PathBuf {
        self.reports_dir.join("graficos")
    }
}
