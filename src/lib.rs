pub mod artifacts;
pub mod capabilities;
pub mod charts;
pub mod clean;
pub mod cli;
pub mod config;
pub mod dataset;
pub mod error;
pub mod io_utils;
pub mod loader;
pub mod pipeline;
pub mod runner;
pub mod stats;
pub mod table;
pub mod validate;

use std::{env, sync::OnceLock};

use anyhow::Result;
use clap::Parser;
use log::{LevelFilter, debug, info};

use crate::{
    artifacts::{FsArtifactWriter, tables},
    capabilities::Capabilities,
    cli::{Cli, Commands},
    config::Config,
    pipeline::{ExternalOutcome, RunOptions, RunSummary},
    validate::ValidationReport,
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("agro_report", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Analyze(args) => handle_analyze(&args),
        Commands::Validate(args) => handle_validate(&args),
        Commands::Deps(args) => handle_deps(&args),
    }
}

fn handle_analyze(args: &cli::AnalyzeArgs) -> Result<()> {
    let config = Config::resolve(args.config.config.as_deref(), &args.overrides())?;
    debug!("Resolved configuration: {config:?}");
    let capabilities = if args.complete {
        Capabilities::probe(&config)
    } else {
        Capabilities::without_external()
    };
    let mut writer = FsArtifactWriter::new(&config);
    let summary = pipeline::run(
        &config,
        &capabilities,
        RunOptions {
            run_external: args.complete,
        },
        &mut writer,
    )?;
    print_run_summary(&summary);
    info!("Report written to {:?}", writer.report_path());
    Ok(())
}

fn handle_validate(args: &cli::ValidateArgs) -> Result<()> {
    let config = Config::resolve(args.config.config.as_deref(), &args.overrides())?;
    let (source, report) = pipeline::validate_only(&config)?;
    println!(
        "{} record(s), {} column(s) in {}",
        source.dataset.len(),
        source.dataset.columns().len(),
        config.data_file.display()
    );
    if report.is_empty() {
        println!("Schema complete");
    } else {
        print_diagnostics(&report);
    }
    Ok(())
}

fn handle_deps(args: &cli::DepsArgs) -> Result<()> {
    let config = Config::resolve(args.config.as_deref(), &args.overrides())?;
    let capabilities = Capabilities::probe(&config);
    table::print_table(&["capability", "status"], &capabilities.rows(&config));
    Ok(())
}

fn print_run_summary(summary: &RunSummary) {
    let analysis = &summary.analysis;
    println!(
        "{} record(s) loaded, {} kept ({} dropped, {} clipped)",
        analysis.records_loaded,
        analysis.cleaned.len(),
        analysis.cleaning.dropped,
        analysis.cleaning.clipped
    );
    if let Some(global) = &analysis.statistics.global {
        println!("Global: {}", tables::describe(global));
    }
    if let Some(groups) = &analysis.statistics.by_culture {
        let rows = groups
            .iter()
            .map(|group| group.row(stats::Precision::Rounded))
            .collect::<Vec<_>>();
        table::print_table(&stats::GROUP_HEADERS, &rows);
    }
    if !summary.report().is_empty() {
        print_diagnostics(summary.report());
    }
    let rows = summary
        .artifacts
        .iter()
        .map(|path| vec![path.display().to_string()])
        .collect::<Vec<_>>();
    table::print_table(&["artifact"], &rows);
    match &summary.external {
        ExternalOutcome::NotRequested => {}
        ExternalOutcome::Succeeded(output) => {
            println!("External analysis completed");
            if !output.stdout.trim().is_empty() {
                println!("{}", output.stdout.trim_end());
            }
        }
        ExternalOutcome::Failed(err) => println!("External analysis not completed: {err}"),
    }
}

fn print_diagnostics(report: &ValidationReport) {
    let rows = report
        .entries()
        .iter()
        .map(|diagnostic| {
            vec![
                diagnostic.kind.label().to_string(),
                diagnostic.count.map(|c| c.to_string()).unwrap_or_default(),
                diagnostic.message.clone(),
            ]
        })
        .collect::<Vec<_>>();
    table::print_table(&["check", "count", "message"], &rows);
}
