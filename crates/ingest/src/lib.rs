//! Loading extractor CSV output into typed metric tables.
//!
//! Sub-modules:
//! - [`csv_import`] — arrow CSV reader producing untyped [`RawTable`]s
//! - [`record`] — per-row conversion into the core row types

pub mod csv_import;
pub mod record;

use std::path::{Path, PathBuf};

use tracelens_core::{MetricTable, Result, TableSet};
use tracing::warn;

pub use csv_import::{CsvImporter, RawTable};
pub use record::{FromRecord, Record};

pub const SYSTEM_INFO_FILE: &str = "system_info.csv";
pub const SCHED_FILE: &str = "cpu_sched.csv";
pub const LONG_TASKS_FILE: &str = "long_tasks.csv";
pub const THREAD_CPU_STATES_FILE: &str = "youtube_thread_states.csv";
pub const THREAD_STATES_FILE: &str = "thread_states.csv";

/// Locations of the five input tables.
#[derive(Debug, Clone, PartialEq)]
pub struct InputPaths {
    pub system_info: PathBuf,
    pub sched: PathBuf,
    pub long_tasks: PathBuf,
    pub thread_cpu_states: PathBuf,
    pub thread_states: PathBuf,
}

impl InputPaths {
    /// The extractor's default file names inside `dir`.
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            system_info: dir.join(SYSTEM_INFO_FILE),
            sched: dir.join(SCHED_FILE),
            long_tasks: dir.join(LONG_TASKS_FILE),
            thread_cpu_states: dir.join(THREAD_CPU_STATES_FILE),
            thread_states: dir.join(THREAD_STATES_FILE),
        }
    }
}

/// Load one table. A missing or zero-byte file yields an empty table.
pub fn load_table<R: FromRecord>(path: &Path) -> Result<MetricTable<R>> {
    match CsvImporter::read(path)? {
        Some(raw) => {
            let table: MetricTable<R> = raw.to_table()?;
            let missing = table.missing_columns(R::COLUMNS);
            if !missing.is_empty() {
                warn!(table = R::TABLE, path = %path.display(), ?missing, "table lacks expected columns");
            }
            Ok(table)
        }
        None => {
            warn!(table = R::TABLE, path = %path.display(), "substituting empty table");
            Ok(MetricTable::empty())
        }
    }
}

/// Load all five tables. Only unreadable or malformed files are errors.
pub fn load_tables(paths: &InputPaths) -> Result<TableSet> {
    Ok(TableSet {
        system_info: load_table(&paths.system_info)?,
        sched: load_table(&paths.sched)?,
        long_tasks: load_table(&paths.long_tasks)?,
        thread_cpu_states: load_table(&paths.thread_cpu_states)?,
        thread_states: load_table(&paths.thread_states)?,
    })
}
