use std::fs::File;
use std::io::Write;
use std::path::PathBuf;

use agro_report::capabilities::Capabilities;
use agro_report::clean;
use agro_report::dataset::{Dataset, Record};
use agro_report::loader;
use agro_report::stats;
use agro_report::validate::ValidationReport;
use criterion::{BatchSize, Criterion, criterion_group, criterion_main};
use encoding_rs::UTF_8;
use tempfile::TempDir;

const CULTURES: [&str; 5] = ["Soja", "Milho", "Feijão", "Trigo", "Café"];

fn synthetic_records(rows: usize) -> Vec<Record> {
    (0..rows)
        .map(|i| {
            let value = ((i * 7919) % 2300) as f64 / 100.0 - 1.0;
            Record::with_productivity(value).culture(CULTURES[i % CULTURES.len()])
        })
        .collect()
}

fn generate_csv(rows: usize) -> (TempDir, PathBuf) {
    let temp_dir = tempfile::tempdir().expect("temp dir");
    let csv_path = temp_dir.path().join("base_agro.csv");
    let mut file = File::create(&csv_path).expect("create csv");
    writeln!(
        file,
        "Safra,Regiao,Cultura,Subtipo,Produtividade_t_ha,Nivel_Tecnologico"
    )
    .expect("header");
    for i in 0..rows {
        let culture = CULTURES[i % CULTURES.len()];
        let value = ((i * 7919) % 2300) as f64 / 100.0 - 1.0;
        writeln!(file, "{},Sul,{culture},,{value},Medio", 2000 + i % 24).expect("row");
    }
    (temp_dir, csv_path)
}

fn bench_pipeline_stages(c: &mut Criterion) {
    let records = synthetic_records(100_000);
    let (temp_dir, csv_path) = generate_csv(50_000);

    let mut group = c.benchmark_group("stages");

    group.bench_function("clean_100k", |b| {
        b.iter_batched(
            || Dataset::with_all_columns(records.clone()),
            |dataset| {
                let mut report = ValidationReport::new();
                clean::clean(dataset, &mut report)
            },
            BatchSize::LargeInput,
        );
    });

    let mut report = ValidationReport::new();
    let (cleaned, _) = clean::clean(Dataset::with_all_columns(records), &mut report);
    group.bench_function("summarize_100k", |b| {
        b.iter(|| {
            let mut report = ValidationReport::new();
            stats::summarize(&cleaned, &mut report)
        });
    });

    let capabilities = Capabilities::without_external();
    group.bench_function("load_csv_50k", |b| {
        b.iter(|| loader::load(&csv_path, UTF_8, &capabilities).expect("load csv"));
    });

    drop(temp_dir);
    group.finish();
}

criterion_group!(benches, bench_pipeline_stages);
criterion_main!(benches);
