//! Typed conversion from [`RawTable`] rows to metric table rows.
//!
//! Absent columns and empty cells read as `0` / empty text. The table keeps
//! track of which columns were present so detectors can tell the difference.

use tracelens_core::{
    ColumnSet, LongTaskSlice, MetadataEntry, MetricTable, Result, SchedSlice, TableSchema,
    ThreadCpuState, ThreadState, TraceLensError,
};

use crate::csv_import::RawTable;

/// One CSV row viewed through its table's header.
pub struct Record<'a> {
    table: &'static str,
    raw: &'a RawTable,
    cells: &'a [Option<String>],
}

impl<'a> Record<'a> {
    fn cell(&self, column: &str) -> Option<&'a str> {
        let idx = self.raw.position(column)?;
        self.cells.get(idx)?.as_deref()
    }

    pub fn text(&self, column: &str) -> String {
        self.cell(column).unwrap_or_default().to_string()
    }

    pub fn opt_text(&self, column: &str) -> Option<String> {
        self.cell(column).map(str::to_string)
    }

    pub fn opt_int(&self, column: &str) -> Result<Option<i64>> {
        self.cell(column)
            .map(|s| parse_int(self.table, column, s))
            .transpose()
    }

    pub fn int(&self, column: &str) -> Result<i64> {
        Ok(self.opt_int(column)?.unwrap_or(0))
    }

    /// Non-negative integer; durations are clamped rather than rejected.
    pub fn duration(&self, column: &str) -> Result<i64> {
        Ok(self.int(column)?.max(0))
    }

    pub fn cpu(&self, column: &str) -> Result<u32> {
        let value = self.int(column)?;
        u32::try_from(value).map_err(|_| TraceLensError::Schema {
            table: self.table.to_string(),
            column: column.to_string(),
            detail: format!("core id {} out of range", value),
        })
    }
}

/// Integer cell, accepting float spellings of whole numbers (`"123.0"`).
fn parse_int(table: &str, column: &str, s: &str) -> Result<i64> {
    if let Ok(v) = s.parse::<i64>() {
        return Ok(v);
    }
    match s.parse::<f64>() {
        Ok(f) if f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64 => Ok(f as i64),
        _ => Err(TraceLensError::Schema {
            table: table.to_string(),
            column: column.to_string(),
            detail: format!("'{}' is not an integer", s),
        }),
    }
}

/// Row types that can be built from a CSV record.
pub trait FromRecord: TableSchema + Sized {
    fn from_record(record: &Record<'_>) -> Result<Self>;
}

impl FromRecord for SchedSlice {
    fn from_record(r: &Record<'_>) -> Result<Self> {
        Ok(Self {
            thread_name: r.text("thread_name"),
            process_name: r.text("process_name"),
            cpu: r.cpu("cpu")?,
            ts: r.int("ts")?,
            dur: r.duration("dur")?,
            utid: r.int("utid")?,
            end_state: r.opt_text("end_state"),
        })
    }
}

impl FromRecord for ThreadState {
    fn from_record(r: &Record<'_>) -> Result<Self> {
        Ok(Self {
            utid: r.int("utid")?,
            thread_name: r.text("thread_name"),
            process_name: r.text("process_name"),
            ts: r.int("ts")?,
            dur: r.duration("dur")?,
            state: r.text("state"),
            blocked_function: r.opt_text("blocked_function"),
        })
    }
}

impl FromRecord for LongTaskSlice {
    fn from_record(r: &Record<'_>) -> Result<Self> {
        Ok(Self {
            slice_name: r.text("slice_name"),
            thread_name: r.text("thread_name"),
            process_name: r.text("process_name"),
            ts: r.int("ts")?,
            dur: r.duration("dur")?,
            utid: r.int("utid")?,
            upid: r.int("upid")?,
        })
    }
}

impl FromRecord for MetadataEntry {
    fn from_record(r: &Record<'_>) -> Result<Self> {
        Ok(Self {
            name: r.text("name"),
            str_value: r.opt_text("str_value"),
            int_value: r.opt_int("int_value")?,
        })
    }
}

impl FromRecord for ThreadCpuState {
    fn from_record(r: &Record<'_>) -> Result<Self> {
        Ok(Self {
            thread_name: r.text("thread_name"),
            total_running_ns: r.duration("total_running_ns")?,
            total_runnable_ns: r.duration("total_runnable_ns")?,
            total_sleeping_ns: r.duration("total_sleeping_ns")?,
            total_interruptible_sleep_ns: r.duration("total_interruptible_sleep_ns")?,
            total_uninterruptible_sleep_ns: r.duration("total_uninterruptible_sleep_ns")?,
            total_stopped_ns: r.duration("total_stopped_ns")?,
            total_parked_ns: r.duration("total_parked_ns")?,
        })
    }
}

impl RawTable {
    /// Convert every row, keeping the header's column set.
    pub fn to_table<R: FromRecord>(&self) -> Result<MetricTable<R>> {
        let rows = self
            .rows
            .iter()
            .map(|cells| {
                R::from_record(&Record {
                    table: R::TABLE,
                    raw: self,
                    cells,
                })
            })
            .collect::<Result<Vec<R>>>()?;
        Ok(MetricTable::with_columns(
            ColumnSet::new(self.columns.iter().cloned()),
            rows,
        ))
    }
}
