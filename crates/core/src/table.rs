//! Typed metric tables produced by the trace extractor.
//!
//! Every table is an ordered list of rows plus the set of columns the source
//! actually provided. Detectors check that set before using a column, so a
//! table with a missing column degrades to an "indeterminate" finding instead
//! of silently reading defaulted values.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Nanoseconds to milliseconds.
pub fn ns_to_ms(ns: i64) -> f64 {
    ns as f64 / 1_000_000.0
}

/// Milliseconds to nanoseconds; `None` when the result does not fit in `i64`.
pub fn ms_to_ns(ms: u64) -> Option<i64> {
    i64::try_from(ms).ok()?.checked_mul(1_000_000)
}

// ── Schema ────────────────────────────────────────────────────

/// Static schema of a row type: table name and its full column list.
pub trait TableSchema {
    const TABLE: &'static str;
    const COLUMNS: &'static [&'static str];
}

/// Columns present in a materialised table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSet(BTreeSet<String>);

impl ColumnSet {
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(columns.into_iter().map(Into::into).collect())
    }

    /// The full column set of a row type.
    pub fn full<R: TableSchema>() -> Self {
        Self::new(R::COLUMNS.iter().copied())
    }

    pub fn contains(&self, column: &str) -> bool {
        self.0.contains(column)
    }

    /// Required columns that are absent, in the order given.
    pub fn missing<'a>(&self, required: &[&'a str]) -> Vec<&'a str> {
        required
            .iter()
            .copied()
            .filter(|c| !self.contains(c))
            .collect()
    }
}

// ── Generic table ─────────────────────────────────────────────

/// Read-only table of rows. Detectors never mutate it.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricTable<R> {
    columns: ColumnSet,
    rows: Vec<R>,
}

impl<R: TableSchema> MetricTable<R> {
    /// Empty table with the full schema (used for missing inputs).
    pub fn empty() -> Self {
        Self {
            columns: ColumnSet::full::<R>(),
            rows: Vec::new(),
        }
    }

    /// Table built from complete rows: every schema column is present.
    pub fn from_rows(rows: Vec<R>) -> Self {
        Self {
            columns: ColumnSet::full::<R>(),
            rows,
        }
    }

    /// Table whose source only provided some columns.
    pub fn with_columns(columns: ColumnSet, rows: Vec<R>) -> Self {
        Self { columns, rows }
    }

    pub fn name(&self) -> &'static str {
        R::TABLE
    }

    /// Required columns this table lacks.
    pub fn missing_columns<'a>(&self, required: &[&'a str]) -> Vec<&'a str> {
        self.columns.missing(required)
    }

    pub fn has_columns(&self, required: &[&str]) -> bool {
        required.iter().all(|c| self.columns.contains(c))
    }
}

impl<R> MetricTable<R> {
    pub fn rows(&self) -> &[R] {
        &self.rows
    }

    pub fn columns(&self) -> &ColumnSet {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, R> {
        self.rows.iter()
    }
}

impl<R: TableSchema> Default for MetricTable<R> {
    fn default() -> Self {
        Self::empty()
    }
}

// ── SchedSlice ────────────────────────────────────────────────

/// One interval a thread spent running on a CPU.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedSlice {
    pub thread_name: String,
    pub process_name: String,
    pub cpu: u32,
    pub ts: i64,
    pub dur: i64,
    pub utid: i64,
    pub end_state: Option<String>,
}

impl SchedSlice {
    pub fn end(&self) -> i64 {
        self.ts.saturating_add(self.dur)
    }
}

impl TableSchema for SchedSlice {
    const TABLE: &'static str = "sched_slice";
    const COLUMNS: &'static [&'static str] = &[
        "thread_name",
        "process_name",
        "cpu",
        "ts",
        "dur",
        "utid",
        "end_state",
    ];
}

// ── ThreadState ───────────────────────────────────────────────

/// Scheduler state classes recognised in `thread_state.state` codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ThreadStateKind {
    Running,
    Runnable,
    InterruptibleSleep,
    UninterruptibleSleep,
    Stopped,
    Parked,
    Other,
}

impl ThreadStateKind {
    /// Classify a raw state code (`Running`, `R`, `R+`, `S`, `D`, `DK`, `T`, `P`, ...).
    pub fn from_code(code: &str) -> Self {
        match code.trim() {
            "Running" => Self::Running,
            "R" | "R+" => Self::Runnable,
            "S" => Self::InterruptibleSleep,
            c if c.starts_with('D') => Self::UninterruptibleSleep,
            "T" | "t" => Self::Stopped,
            "P" => Self::Parked,
            _ => Self::Other,
        }
    }

    pub fn is_sleeping(self) -> bool {
        matches!(self, Self::InterruptibleSleep | Self::UninterruptibleSleep)
    }
}

/// One interval a thread spent in a given scheduler state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreadState {
    pub utid: i64,
    pub thread_name: String,
    pub process_name: String,
    pub ts: i64,
    pub dur: i64,
    pub state: String,
    pub blocked_function: Option<String>,
}

impl ThreadState {
    pub fn kind(&self) -> ThreadStateKind {
        ThreadStateKind::from_code(&self.state)
    }
}

impl TableSchema for ThreadState {
    const TABLE: &'static str = "thread_state";
    const COLUMNS: &'static [&'static str] = &[
        "utid",
        "thread_name",
        "process_name",
        "ts",
        "dur",
        "state",
        "blocked_function",
    ];
}

// ── LongTaskSlice ─────────────────────────────────────────────

/// A named slice longer than the extractor's threshold, pre-filtered to one thread.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LongTaskSlice {
    pub slice_name: String,
    pub thread_name: String,
    pub process_name: String,
    pub ts: i64,
    pub dur: i64,
    pub utid: i64,
    pub upid: i64,
}

impl TableSchema for LongTaskSlice {
    const TABLE: &'static str = "long_tasks";
    const COLUMNS: &'static [&'static str] = &[
        "slice_name",
        "thread_name",
        "process_name",
        "ts",
        "dur",
        "utid",
        "upid",
    ];
}

// ── SystemMetadata ────────────────────────────────────────────

/// A `(name, value)` metadata pair. Only one of the two values is meaningful.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataEntry {
    pub name: String,
    pub str_value: Option<String>,
    pub int_value: Option<i64>,
}

impl TableSchema for MetadataEntry {
    const TABLE: &'static str = "metadata";
    const COLUMNS: &'static [&'static str] = &["name", "str_value", "int_value"];
}

impl MetricTable<MetadataEntry> {
    /// First entry with exactly this name.
    pub fn lookup(&self, name: &str) -> Option<&MetadataEntry> {
        self.rows.iter().find(|e| e.name == name)
    }

    /// Integer value of a key, falling back to a numeric string value.
    pub fn int_value(&self, name: &str) -> Option<i64> {
        let entry = self.lookup(name)?;
        entry.int_value.or_else(|| {
            entry
                .str_value
                .as_deref()
                .and_then(|s| s.trim().parse().ok())
        })
    }
}

// ── Per-thread CPU state totals ───────────────────────────────

/// Pre-summed run/wait totals for one thread of the target process.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ThreadCpuState {
    pub thread_name: String,
    pub total_running_ns: i64,
    pub total_runnable_ns: i64,
    pub total_sleeping_ns: i64,
    pub total_interruptible_sleep_ns: i64,
    pub total_uninterruptible_sleep_ns: i64,
    pub total_stopped_ns: i64,
    pub total_parked_ns: i64,
}

impl ThreadCpuState {
    /// Runnable plus running time.
    pub fn active_ns(&self) -> i64 {
        self.total_runnable_ns.saturating_add(self.total_running_ns)
    }
}

impl TableSchema for ThreadCpuState {
    const TABLE: &'static str = "thread_cpu_states";
    const COLUMNS: &'static [&'static str] = &[
        "thread_name",
        "total_running_ns",
        "total_runnable_ns",
        "total_sleeping_ns",
        "total_interruptible_sleep_ns",
        "total_uninterruptible_sleep_ns",
        "total_stopped_ns",
        "total_parked_ns",
    ];
}

// ── Aliases and bundle ────────────────────────────────────────

pub type SchedSliceTable = MetricTable<SchedSlice>;
pub type ThreadStateTable = MetricTable<ThreadState>;
pub type LongTaskTable = MetricTable<LongTaskSlice>;
pub type SystemMetadataTable = MetricTable<MetadataEntry>;
pub type ThreadCpuStateTable = MetricTable<ThreadCpuState>;

/// All inputs of one anomaly-detection run. Missing inputs are empty tables.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableSet {
    pub system_info: SystemMetadataTable,
    pub sched: SchedSliceTable,
    pub long_tasks: LongTaskTable,
    pub thread_cpu_states: ThreadCpuStateTable,
    pub thread_states: ThreadStateTable,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str, str_value: Option<&str>, int_value: Option<i64>) -> MetadataEntry {
        MetadataEntry {
            name: name.to_string(),
            str_value: str_value.map(str::to_string),
            int_value,
        }
    }

    #[test]
    fn empty_table_has_full_schema() {
        let table = SchedSliceTable::empty();
        assert!(table.is_empty());
        assert!(table.has_columns(SchedSlice::COLUMNS));
        assert_eq!(table.name(), "sched_slice");
    }

    #[test]
    fn missing_columns_reported_in_request_order() {
        let table: SchedSliceTable =
            MetricTable::with_columns(ColumnSet::new(["process_name", "dur"]), vec![]);
        assert_eq!(table.missing_columns(&["ts", "dur", "cpu"]), vec!["ts", "cpu"]);
        assert!(!table.has_columns(&["ts", "dur"]));
    }

    #[test]
    fn metadata_lookup_prefers_int_value() {
        let table = SystemMetadataTable::from_rows(vec![
            entry("trace_uuid", Some("abc"), None),
            entry("perf_samples_skipped", None, Some(12)),
            entry("android_sdk_version", Some("34"), None),
        ]);
        assert_eq!(table.int_value("perf_samples_skipped"), Some(12));
        assert_eq!(table.int_value("android_sdk_version"), Some(34));
        assert_eq!(table.int_value("trace_uuid"), None);
        assert!(table.lookup("missing").is_none());
    }

    #[test]
    fn thread_state_codes_classified() {
        assert_eq!(ThreadStateKind::from_code("Running"), ThreadStateKind::Running);
        assert_eq!(ThreadStateKind::from_code("R+"), ThreadStateKind::Runnable);
        assert_eq!(ThreadStateKind::from_code("S"), ThreadStateKind::InterruptibleSleep);
        assert_eq!(ThreadStateKind::from_code("DK"), ThreadStateKind::UninterruptibleSleep);
        assert_eq!(ThreadStateKind::from_code("P"), ThreadStateKind::Parked);
        assert_eq!(ThreadStateKind::from_code("X"), ThreadStateKind::Other);
        assert!(ThreadStateKind::from_code("D").is_sleeping());
        assert!(!ThreadStateKind::from_code("R").is_sleeping());
    }

    #[test]
    fn active_time_sums_runnable_and_running() {
        let row = ThreadCpuState {
            thread_name: "t".into(),
            total_running_ns: 8,
            total_runnable_ns: 4,
            ..ThreadCpuState::default()
        };
        assert_eq!(row.active_ns(), 12);
    }

    #[test]
    fn ns_to_ms_converts() {
        assert_eq!(ns_to_ms(1_500_000), 1.5);
        assert_eq!(ns_to_ms(0), 0.0);
    }

    #[test]
    fn ms_to_ns_rejects_overflow() {
        assert_eq!(ms_to_ns(100), Some(100_000_000));
        assert_eq!(ms_to_ns(9_223_372_036_854), Some(9_223_372_036_854_000_000));
        assert_eq!(ms_to_ns(9_223_372_036_855), None);
        assert_eq!(ms_to_ns(u64::MAX), None);
    }
}
