use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use tracelens_ingest::InputPaths;

/// Performance anomaly detection over trace-extracted metric tables.
///
/// Reads the CSV tables written by the trace extractor and prints an
/// ordered JSON report of findings.
#[derive(Parser, Debug)]
#[command(name = "tracelens", version, about = "Performance anomaly detection for trace metric tables")]
pub struct CliArgs {
    /// Log filter (e.g. `info`, `tracelens_rules=debug`); overrides RUST_LOG
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run every detector over a directory of extracted tables
    Analyze(AnalyzeArgs),
    /// Print the default configuration as TOML
    DefaultConfig,
}

#[derive(Args, Debug)]
pub struct AnalyzeArgs {
    /// Directory holding the extractor's CSV files
    #[arg(long, env = "TRACELENS_INPUT_DIR")]
    pub input_dir: PathBuf,

    /// TOML config file (defaults apply when not set)
    #[arg(long, env = "TRACELENS_CONFIG")]
    pub config: Option<PathBuf>,

    /// Write the report here instead of stdout
    #[arg(long)]
    pub out: Option<PathBuf>,

    /// Single-line JSON instead of pretty-printed
    #[arg(long)]
    pub compact: bool,

    /// Evaluate detectors on the rayon thread pool
    #[arg(long)]
    pub parallel: bool,

    /// Override path of the system metadata table
    #[arg(long)]
    pub system_info: Option<PathBuf>,

    /// Override path of the scheduling slice table
    #[arg(long)]
    pub sched: Option<PathBuf>,

    /// Override path of the long task table
    #[arg(long)]
    pub long_tasks: Option<PathBuf>,

    /// Override path of the per-thread CPU state totals
    #[arg(long)]
    pub thread_cpu_states: Option<PathBuf>,

    /// Override path of the thread state table
    #[arg(long)]
    pub thread_states: Option<PathBuf>,
}

impl AnalyzeArgs {
    /// Default file names under `--input-dir`, with per-table overrides applied.
    pub fn input_paths(&self) -> InputPaths {
        let mut paths = InputPaths::in_dir(&self.input_dir);
        let overrides = [
            (&mut paths.system_info, &self.system_info),
            (&mut paths.sched, &self.sched),
            (&mut paths.long_tasks, &self.long_tasks),
            (&mut paths.thread_cpu_states, &self.thread_cpu_states),
            (&mut paths.thread_states, &self.thread_states),
        ];
        for (slot, value) in overrides {
            if let Some(path) = value {
                *slot = path.clone();
            }
        }
        paths
    }
}
