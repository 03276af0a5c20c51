//! Tabular loader: turns a delimited-text file or a spreadsheet into a [`Dataset`].
//!
//! The loader is the only place a run can fail outright. A missing file, an
//! unrecognized extension and malformed content are reported as distinct
//! [`LoadError`] variants; everything after loading degrades into diagnostics.

use std::{collections::BTreeMap, fs, io::ErrorKind, path::Path};

#[cfg(feature = "spreadsheet")]
use calamine::{Data, Reader, open_workbook_auto};
use encoding_rs::Encoding;
use log::{debug, info};
use sha2::{Digest, Sha256};

use crate::{
    capabilities::Capabilities,
    dataset::{
        CULTURA, Dataset, EXPECTED_COLUMNS, NIVEL_TECNOLOGICO, PRODUTIVIDADE, REGIAO, Record,
        SAFRA, SUBTIPO, parse_productivity,
    },
    error::LoadError,
    io_utils,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Delimited(u8),
    Spreadsheet,
}

impl SourceFormat {
    pub fn detect(path: &Path) -> Result<Self, LoadError> {
        match io_utils::extension_of(path).as_deref() {
            Some("csv") | Some("txt") | Some("tsv") => Ok(SourceFormat::Delimited(
                io_utils::resolve_input_delimiter(path, None),
            )),
            Some("xlsx") | Some("xls") | Some("xlsm") | Some("xlsb") | Some("ods") => {
                Ok(SourceFormat::Spreadsheet)
            }
            other => Err(LoadError::UnsupportedFormat {
                path: path.to_path_buf(),
                extension: other.unwrap_or_default().to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoadedSource {
    pub dataset: Dataset,
    pub format: SourceFormat,
    /// Hex SHA-256 of the source bytes.
    pub fingerprint: String,
}

pub fn load(
    path: &Path,
    encoding: &'static Encoding,
    capabilities: &Capabilities,
) -> Result<LoadedSource, LoadError> {
    let format = SourceFormat::detect(path)?;
    if format == SourceFormat::Spreadsheet && !capabilities.spreadsheet_reader {
        return Err(LoadError::ReaderUnavailable {
            path: path.to_path_buf(),
            reader: "spreadsheet reader".to_string(),
        });
    }
    let bytes = fs::read(path).map_err(|err| match err.kind() {
        ErrorKind::NotFound => LoadError::MissingInput {
            path: path.to_path_buf(),
        },
        _ => LoadError::parse(path, err.to_string()),
    })?;
    let fingerprint = format!("{:x}", Sha256::digest(&bytes));
    drop(bytes);

    let (headers, rows) = match format {
        SourceFormat::Delimited(delimiter) => {
            debug!(
                "Reading {:?} as delimited text (delimiter '{}', encoding {})",
                path,
                io_utils::printable_delimiter(delimiter),
                encoding.name()
            );
            read_delimited(path, delimiter, encoding)?
        }
        SourceFormat::Spreadsheet => read_spreadsheet(path)?,
    };
    let dataset = build_dataset(headers, rows);
    info!(
        "Loaded {} from {:?}",
        dataset,
        path.file_name().unwrap_or(path.as_os_str())
    );
    Ok(LoadedSource {
        dataset,
        format,
        fingerprint,
    })
}

fn read_delimited(
    path: &Path,
    delimiter: u8,
    encoding: &'static Encoding,
) -> Result<(Vec<String>, Vec<Vec<String>>), LoadError> {
    let mut reader = io_utils::open_decoded_csv_reader(path, delimiter, encoding)
        .map_err(|err| LoadError::parse(path, format!("{err:#}")))?;
    let headers = reader
        .headers()
        .map_err(|err| LoadError::parse(path, format!("reading headers: {err}")))?
        .iter()
        .map(|header| header.trim().to_string())
        .collect::<Vec<_>>();
    let mut rows = Vec::new();
    for (row_idx, record) in reader.records().enumerate() {
        let record = record
            .map_err(|err| LoadError::parse(path, format!("row {}: {err}", row_idx + 2)))?;
        rows.push(record.iter().map(str::to_string).collect());
    }
    Ok((headers, rows))
}

#[cfg(not(feature = "spreadsheet"))]
fn read_spreadsheet(path: &Path) -> Result<(Vec<String>, Vec<Vec<String>>), LoadError> {
    Err(LoadError::ReaderUnavailable {
        path: path.to_path_buf(),
        reader: "spreadsheet reader".to_string(),
    })
}

#[cfg(feature = "spreadsheet")]
fn read_spreadsheet(path: &Path) -> Result<(Vec<String>, Vec<Vec<String>>), LoadError> {
    let mut workbook = open_workbook_auto(path).map_err(|err| match err {
        calamine::Error::Io(io) if io.kind() == ErrorKind::NotFound => LoadError::MissingInput {
            path: path.to_path_buf(),
        },
        other => LoadError::parse(path, other.to_string()),
    })?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| LoadError::parse(path, "workbook has no worksheets"))?
        .map_err(|err| LoadError::parse(path, err.to_string()))?;

    let mut rows = range.rows();
    let headers = match rows.next() {
        Some(row) => row
            .iter()
            .map(|cell| cell_to_string(cell).trim().to_string())
            .collect(),
        None => Vec::new(),
    };
    let rows = rows
        .map(|row| row.iter().map(cell_to_string).collect())
        .collect();
    Ok((headers, rows))
}

#[cfg(feature = "spreadsheet")]
fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(text) => text.clone(),
        Data::Float(value) => value.to_string(),
        Data::Int(value) => value.to_string(),
        Data::Bool(value) => value.to_string(),
        other => other.to_string(),
    }
}

/// Maps raw rows onto [`Record`]s by header name. Headers are matched exactly
/// (after trimming); when a header repeats, the first occurrence wins.
/// Columns outside the expected set are carried verbatim in [`Record::extra`].
pub fn build_dataset(headers: Vec<String>, rows: Vec<Vec<String>>) -> Dataset {
    let position = |name: &str| headers.iter().position(|header| header == name);
    let safra = position(SAFRA);
    let regiao = position(REGIAO);
    let cultura = position(CULTURA);
    let subtipo = position(SUBTIPO);
    let produtividade = position(PRODUTIVIDADE);
    let nivel = position(NIVEL_TECNOLOGICO);
    let extra_columns = headers
        .iter()
        .enumerate()
        .filter(|(idx, header)| {
            !header.is_empty()
                && !EXPECTED_COLUMNS.contains(&header.as_str())
                && position(header.as_str()) == Some(*idx)
        })
        .map(|(idx, header)| (idx, header.clone()))
        .collect::<Vec<_>>();

    let mut unparsed = 0usize;
    let mut records = Vec::with_capacity(rows.len());
    for (row_idx, row) in rows.iter().enumerate() {
        let text = |idx: Option<usize>| {
            idx.and_then(|i| row.get(i))
                .map(|value| value.trim())
                .filter(|value| !value.is_empty())
                .map(str::to_string)
        };
        let extra = extra_columns
            .iter()
            .filter_map(|(idx, header)| row.get(*idx).map(|cell| (header.clone(), cell.clone())))
            .collect::<BTreeMap<_, _>>();
        let produtividade_t_ha = match produtividade.and_then(|i| row.get(i)) {
            Some(raw) => match parse_productivity(raw) {
                Ok(value) => value,
                Err(reason) => {
                    debug!("Row {}: {PRODUTIVIDADE} {reason}; treated as missing", row_idx + 2);
                    unparsed += 1;
                    None
                }
            },
            None => None,
        };
        records.push(Record {
            safra: text(safra),
            regiao: text(regiao),
            cultura: text(cultura),
            subtipo: text(subtipo),
            produtividade_t_ha,
            nivel_tecnologico: text(nivel),
            extra,
        });
    }

    let mut dataset = Dataset::new(headers.into_iter().filter(|h| !h.is_empty()), records);
    dataset.unparsed_numeric = unparsed;
    dataset
}
