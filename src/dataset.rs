//! In-memory productivity records and the column metadata that travels with them.

use std::{collections::BTreeMap, fmt};

use serde::{Deserialize, Serialize};

pub const SAFRA: &str = "Safra";
pub const REGIAO: &str = "Regiao";
pub const CULTURA: &str = "Cultura";
pub const SUBTIPO: &str = "Subtipo";
pub const PRODUTIVIDADE: &str = "Produtividade_t_ha";
pub const NIVEL_TECNOLOGICO: &str = "Nivel_Tecnologico";

/// Columns every input is expected to carry, in report order.
pub const EXPECTED_COLUMNS: [&str; 6] = [
    SAFRA,
    REGIAO,
    CULTURA,
    SUBTIPO,
    PRODUTIVIDADE,
    NIVEL_TECNOLOGICO,
];

pub const MIN_PRODUCTIVITY: f64 = 0.0;
pub const MAX_PRODUCTIVITY: f64 = 20.0;

/// Label shown for the group of records whose culture cell is empty.
pub const EMPTY_GROUP: &str = "<empty>";

/// Display label for a culture group key.
pub fn group_label(key: Option<&str>) -> &str {
    key.unwrap_or(EMPTY_GROUP)
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub safra: Option<String>,
    pub regiao: Option<String>,
    pub cultura: Option<String>,
    pub subtipo: Option<String>,
    pub produtividade_t_ha: Option<f64>,
    pub nivel_tecnologico: Option<String>,
    /// Raw cells of input columns outside [`EXPECTED_COLUMNS`], keyed by header.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, String>,
}

impl Record {
    pub fn with_productivity(value: f64) -> Self {
        Self {
            produtividade_t_ha: Some(value),
            ..Self::default()
        }
    }

    pub fn culture(mut self, cultura: &str) -> Self {
        self.cultura = Some(cultura.to_string());
        self
    }

    pub fn subtype(mut self, subtipo: &str) -> Self {
        self.subtipo = Some(subtipo.to_string());
        self
    }

    /// Productivity when present and a real number; NaN counts as missing.
    pub fn productivity(&self) -> Option<f64> {
        self.produtividade_t_ha.filter(|value| !value.is_nan())
    }

    /// Grouping key; `None` keeps empty cultures apart from any real label.
    pub fn culture_key(&self) -> Option<&str> {
        self.cultura.as_deref()
    }

    /// Cell value for `column`, rendered the way it is exported. Numbers keep
    /// full precision so the export reads back to the same values.
    pub fn field(&self, column: &str) -> Option<String> {
        match column {
            SAFRA => self.safra.clone(),
            REGIAO => self.regiao.clone(),
            CULTURA => self.cultura.clone(),
            SUBTIPO => self.subtipo.clone(),
            PRODUTIVIDADE => self.productivity().map(format_exact),
            NIVEL_TECNOLOGICO => self.nivel_tecnologico.clone(),
            other => self.extra.get(other).cloned(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    columns: Vec<String>,
    pub records: Vec<Record>,
    /// Distinct culture values, set once the cleaner marks the column categorical.
    pub culture_domain: Option<Vec<String>>,
    /// Non-empty numeric cells that could not be read as numbers.
    pub unparsed_numeric: usize,
}

impl Dataset {
    pub fn new<I, S>(columns: I, records: Vec<Record>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            records,
            culture_domain: None,
            unparsed_numeric: 0,
        }
    }

    /// Dataset carrying every expected column.
    pub fn with_all_columns(records: Vec<Record>) -> Self {
        Self::new(EXPECTED_COLUMNS, records)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|column| column == name)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn productivity_values(&self) -> Vec<f64> {
        self.records
            .iter()
            .filter_map(Record::productivity)
            .collect()
    }
}

impl fmt::Display for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} record(s), {} column(s)",
            self.records.len(),
            self.columns.len()
        )
    }
}

/// Missing-value tokens recognized in the numeric column. Text columns only
/// treat empty cells as missing.
pub fn is_missing_token(value: &str) -> bool {
    let lowered = value.trim().to_ascii_lowercase();
    matches!(
        lowered.as_str(),
        "" | "na" | "n/a" | "n.a." | "nan" | "null" | "none" | "missing" | "-"
    )
}

/// Parses a productivity cell. `Ok(None)` marks a missing value, `Err` a cell
/// that holds text which is neither a number nor a missing-value token.
pub fn parse_productivity(raw: &str) -> Result<Option<f64>, String> {
    let trimmed = raw.trim();
    if is_missing_token(trimmed) {
        return Ok(None);
    }
    let parsed = trimmed
        .parse::<f64>()
        .or_else(|_| trimmed.replace(',', ".").parse::<f64>())
        .map_err(|_| format!("'{trimmed}' is not a number"))?;
    Ok(Some(parsed).filter(|value| !value.is_nan()))
}

/// Shortest representation that parses back to the same `f64`; used for
/// every persisted table and export.
pub fn format_exact(value: f64) -> String {
    value.to_string()
}

/// Rounded form (at most four decimals) for the console and the HTML report.
pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{value:.0}")
    } else {
        format!("{value:.4}")
            .trim_end_matches('0')
            .trim_end_matches('.')
            .to_string()
    }
}
