mod cli;

use std::fs;
use std::io::Write;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use tracelens_core::config::load_dotenv;
use tracelens_core::AnalysisConfig;
use tracelens_ingest::load_tables;
use tracelens_rules::{Aggregator, AnomalyReport};

use crate::cli::{AnalyzeArgs, CliArgs, Command};

fn main() -> Result<()> {
    load_dotenv();
    let args = CliArgs::parse();

    let filter = match &args.log_level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match args.command {
        Command::Analyze(analyze) => run_analyze(&analyze),
        Command::DefaultConfig => {
            let toml = AnalysisConfig::default()
                .to_toml_string()
                .context("failed to render default config")?;
            print!("{}", toml);
            Ok(())
        }
    }
}

fn run_analyze(args: &AnalyzeArgs) -> Result<()> {
    let config = match &args.config {
        Some(path) => AnalysisConfig::load(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => AnalysisConfig::default(),
    };

    // Config problems fail the run before any table is read.
    let aggregator = Aggregator::new(config).context("invalid analysis configuration")?;

    let paths = args.input_paths();
    let tables = load_tables(&paths)
        .with_context(|| format!("failed to load tables from {}", args.input_dir.display()))?;

    let report = if args.parallel {
        aggregator.run_parallel(&tables)
    } else {
        aggregator.run(&tables)
    };

    write_report(&report, args)
}

fn write_report(report: &AnomalyReport, args: &AnalyzeArgs) -> Result<()> {
    let mut json = if args.compact {
        serde_json::to_string(report)
    } else {
        serde_json::to_string_pretty(report)
    }
    .context("failed to serialize report")?;
    json.push('\n');

    match &args.out {
        Some(path) => {
            fs::write(path, json)
                .with_context(|| format!("failed to write report to {}", path.display()))?;
            info!(path = %path.display(), findings = report.findings.len(), "report written");
        }
        None => {
            std::io::stdout()
                .lock()
                .write_all(json.as_bytes())
                .context("failed to write report to stdout")?;
        }
    }
    Ok(())
}
