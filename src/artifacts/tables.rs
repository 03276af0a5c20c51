//! Statistics tables and the cleaned-dataset export.

use std::{fs::File, io::BufWriter, path::Path};

use anyhow::{Context, Result};
use serde_json::{Map, Value, json};

use crate::{
    config::OutputFormat,
    dataset::{Dataset, format_number},
    io_utils::{self, DEFAULT_CSV_DELIMITER, DEFAULT_TSV_DELIMITER},
    stats::{GLOBAL_HEADERS, GROUP_HEADERS, GroupStats, Precision, SummaryStats},
};

pub fn write_global(path: &Path, format: OutputFormat, stats: &SummaryStats) -> Result<()> {
    match format {
        OutputFormat::Json => write_json(path, &json!([global_object(stats)])),
        _ => write_delimited(path, format, &GLOBAL_HEADERS, &[stats.global_row(Precision::Exact)]),
    }
}

pub fn write_groups(path: &Path, format: OutputFormat, groups: &[GroupStats]) -> Result<()> {
    match format {
        OutputFormat::Json => {
            let rows = groups.iter().map(group_object).collect::<Vec<_>>();
            write_json(path, &Value::Array(rows))
        }
        _ => {
            let rows = groups
                .iter()
                .map(|group| group.row(Precision::Exact))
                .collect::<Vec<_>>();
            write_delimited(path, format, &GROUP_HEADERS, &rows)
        }
    }
}

/// Writes the cleaned records with the columns the input carried, including
/// columns the pipeline does not interpret.
pub fn write_dataset(path: &Path, dataset: &Dataset) -> Result<()> {
    let mut writer = io_utils::open_csv_writer(path, DEFAULT_CSV_DELIMITER)?;
    writer
        .write_record(dataset.columns())
        .context("Writing export headers")?;
    for (idx, record) in dataset.records.iter().enumerate() {
        let row = dataset
            .columns()
            .iter()
            .map(|column| record.field(column).unwrap_or_default());
        writer
            .write_record(row)
            .with_context(|| format!("Writing export row {}", idx + 1))?;
    }
    writer.flush().context("Flushing export writer")?;
    Ok(())
}

fn write_delimited(
    path: &Path,
    format: OutputFormat,
    headers: &[&str],
    rows: &[Vec<String>],
) -> Result<()> {
    let delimiter = match format {
        OutputFormat::Tsv => DEFAULT_TSV_DELIMITER,
        _ => DEFAULT_CSV_DELIMITER,
    };
    let mut writer = io_utils::open_csv_writer(path, delimiter)?;
    writer
        .write_record(headers)
        .with_context(|| format!("Writing headers to {path:?}"))?;
    for row in rows {
        writer
            .write_record(row)
            .with_context(|| format!("Writing row to {path:?}"))?;
    }
    writer.flush().with_context(|| format!("Flushing {path:?}"))?;
    Ok(())
}

fn write_json(path: &Path, value: &Value) -> Result<()> {
    let file = File::create(path).with_context(|| format!("Creating output file {path:?}"))?;
    serde_json::to_writer_pretty(BufWriter::new(file), value)
        .with_context(|| format!("Writing JSON to {path:?}"))
}

fn metric(value: Option<f64>) -> Value {
    value.map_or(Value::Null, |v| json!(v))
}

fn global_object(stats: &SummaryStats) -> Value {
    let mut object = Map::new();
    let values = [
        json!(stats.count),
        metric(stats.mean),
        metric(stats.median),
        metric(stats.std_dev),
        metric(stats.min),
        metric(stats.max),
        metric(stats.q1),
        metric(stats.q3),
    ];
    for (header, value) in GLOBAL_HEADERS.iter().zip(values) {
        object.insert(header.to_string(), value);
    }
    Value::Object(object)
}

fn group_object(group: &GroupStats) -> Value {
    let mut object = Map::new();
    let values = [
        // null for the empty-culture group
        json!(group.group_key),
        json!(group.stats.count),
        metric(group.stats.mean),
        metric(group.stats.median),
        metric(group.stats.std_dev),
        metric(group.stats.min),
        metric(group.stats.max),
    ];
    for (header, value) in GROUP_HEADERS.iter().zip(values) {
        object.insert(header.to_string(), value);
    }
    Value::Object(object)
}

/// Compact rendering used in console summaries.
pub fn describe(stats: &SummaryStats) -> String {
    match (stats.mean, stats.min, stats.max) {
        (Some(mean), Some(min), Some(max)) => format!(
            "n={} mean={} min={} max={}",
            stats.count,
            format_number(mean),
            format_number(min),
            format_number(max)
        ),
        _ => format!("n={}", stats.count),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{PRODUTIVIDADE, Record};
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn global_csv_uses_fixed_column_order_and_blank_for_undefined() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("global.csv");
        write_global(&path, OutputFormat::Csv, &SummaryStats::from_values(&[3.5])).expect("write");
        let contents = fs::read_to_string(&path).expect("read");
        let lines = contents.lines().collect::<Vec<_>>();
        assert_eq!(lines[0], "n,mean,median,std_dev,min,max,q1,q3");
        assert_eq!(lines[1], "1,3.5,3.5,,3.5,3.5,3.5,3.5");
    }

    #[test]
    fn group_tsv_and_json_share_columns() {
        let dir = tempdir().expect("temp dir");
        let groups = vec![GroupStats {
            group_key: Some("Soja".to_string()),
            stats: SummaryStats::from_values(&[2.0, 4.0]),
        }];

        let tsv = dir.path().join("groups.tsv");
        write_groups(&tsv, OutputFormat::Tsv, &groups).expect("write tsv");
        let contents = fs::read_to_string(&tsv).expect("read tsv");
        assert!(contents.starts_with("group_key\tn\tmean\tmedian\tstd_dev\tmin\tmax\n"));
        assert!(contents.contains("Soja\t2\t3\t3\t"));

        let json_path = dir.path().join("groups.json");
        write_groups(&json_path, OutputFormat::Json, &groups).expect("write json");
        let parsed: Value =
            serde_json::from_str(&fs::read_to_string(&json_path).expect("read json")).expect("json");
        assert_eq!(parsed[0]["group_key"], "Soja");
        assert_eq!(parsed[0]["n"], 2);
        assert_eq!(parsed[0]["mean"], 3.0);
    }

    #[test]
    fn json_uses_null_for_not_computable() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("global.json");
        write_global(&path, OutputFormat::Json, &SummaryStats::default()).expect("write");
        let parsed: Value =
            serde_json::from_str(&fs::read_to_string(&path).expect("read")).expect("json");
        assert_eq!(parsed[0]["n"], 0);
        assert!(parsed[0]["median"].is_null());
    }

    #[test]
    fn export_keeps_input_columns() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("base_limpa.csv");
        let dataset = Dataset::new(
            ["Cultura", PRODUTIVIDADE],
            vec![Record::with_productivity(20.0).culture("Milho")],
        );
        write_dataset(&path, &dataset).expect("export");
        assert_eq!(
            fs::read_to_string(&path).expect("read"),
            "Cultura,Produtividade_t_ha\nMilho,20\n"
        );
    }

    #[test]
    fn export_carries_unrecognized_columns_and_exact_values() {
        let dir = tempdir().expect("temp dir");
        let input = dir.path().join("base.csv");
        fs::write(&input, "Cultura,Produtividade_t_ha,Area_ha\nSoja,3.71928465,120\n")
            .expect("write input");
        let dataset = crate::loader::load(
            &input,
            encoding_rs::UTF_8,
            &crate::capabilities::Capabilities::without_external(),
        )
        .expect("load")
        .dataset;

        let path = dir.path().join("base_limpa.csv");
        write_dataset(&path, &dataset).expect("export");
        assert_eq!(
            fs::read_to_string(&path).expect("read"),
            "Cultura,Produtividade_t_ha,Area_ha\nSoja,3.71928465,120\n"
        );
    }

    #[test]
    fn group_csv_keeps_full_precision_and_labels_empty_culture() {
        let dir = tempdir().expect("temp dir");
        let groups = vec![GroupStats {
            group_key: None,
            stats: SummaryStats::from_values(&[1.0 / 3.0]),
        }];
        let path = dir.path().join("groups.csv");
        write_groups(&path, OutputFormat::Csv, &groups).expect("write csv");
        let contents = fs::read_to_string(&path).expect("read");
        let row = contents.lines().nth(1).expect("data row");
        let cells = row.split(',').collect::<Vec<_>>();
        assert_eq!(cells[0], crate::dataset::EMPTY_GROUP);
        assert_eq!(cells[2].parse::<f64>(), Ok(1.0 / 3.0));

        let json_path = dir.path().join("groups.json");
        write_groups(&json_path, OutputFormat::Json, &groups).expect("write json");
        let parsed: Value =
            serde_json::from_str(&fs::read_to_string(&json_path).expect("read json")).expect("json");
        assert!(parsed[0]["group_key"].is_null());
    }

    #[test]
    fn describe_handles_empty_stats() {
        assert_eq!(describe(&SummaryStats::default()), "n=0");
        assert_eq!(
            describe(&SummaryStats::from_values(&[0.0, 20.0])),
            "n=2 mean=10 min=0 max=20"
        );
    }
}
