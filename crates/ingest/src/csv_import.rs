use std::collections::HashMap;
use std::fs::File;
use std::io::{ErrorKind, Seek, SeekFrom};
use std::path::Path;
use std::sync::Arc;

use arrow::array::{Array, StringArray};
use arrow::csv::reader::Format;
use arrow::csv::ReaderBuilder;
use arrow::datatypes::{DataType, Field, Schema};
use tracelens_core::{Result, TraceLensError};
use tracing::{info, warn};

/// Untyped CSV contents: header names plus one optional string per cell.
///
/// Empty cells are `None`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
    index: HashMap<String, usize>,
}

impl RawTable {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Option<String>>>) -> Self {
        let mut index = HashMap::new();
        for (i, name) in columns.iter().enumerate() {
            index.entry(name.clone()).or_insert(i);
        }
        Self {
            columns,
            rows,
            index,
        }
    }

    /// Position of a column; the first one wins on duplicate headers.
    pub fn position(&self, column: &str) -> Option<usize> {
        self.index.get(column).copied()
    }
}

pub struct CsvImporter;

impl CsvImporter {
    /// Read a CSV file with every column as text.
    ///
    /// Returns `Ok(None)` when the file does not exist or is zero bytes;
    /// both count as a missing input, not a failure.
    pub fn read(path: &Path) -> Result<Option<RawTable>> {
        let mut file = match File::open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!(path = %path.display(), "input file not found");
                return Ok(None);
            }
            Err(e) => return Err(TraceLensError::Io(e)),
        };
        if file.metadata()?.len() == 0 {
            warn!(path = %path.display(), "input file is empty");
            return Ok(None);
        }

        // Header only; types are decided per row type, not inferred.
        let (inferred, _) = Format::default()
            .with_header(true)
            .infer_schema(&mut file, Some(0))
            .map_err(|e| TraceLensError::Arrow(e.to_string()))?;
        let columns: Vec<String> = inferred
            .fields()
            .iter()
            .map(|f| f.name().to_string())
            .collect();
        let schema = Schema::new(
            columns
                .iter()
                .map(|name| Field::new(name, DataType::Utf8, true))
                .collect::<Vec<_>>(),
        );

        file.seek(SeekFrom::Start(0))?;
        let reader = ReaderBuilder::new(Arc::new(schema))
            .with_header(true)
            .build(file)
            .map_err(|e| TraceLensError::Arrow(e.to_string()))?;

        let mut rows = Vec::new();
        for batch_result in reader {
            let batch = batch_result.map_err(|e| TraceLensError::Arrow(e.to_string()))?;

            let arrays: Vec<&StringArray> = (0..batch.num_columns())
                .map(|i| {
                    batch
                        .column(i)
                        .as_any()
                        .downcast_ref::<StringArray>()
                        .ok_or_else(|| {
                            TraceLensError::Arrow(format!("column '{}' is not text", columns[i]))
                        })
                })
                .collect::<Result<_>>()?;

            for row_idx in 0..batch.num_rows() {
                let row = arrays
                    .iter()
                    .map(|arr| {
                        if arr.is_null(row_idx) {
                            return None;
                        }
                        let val = arr.value(row_idx).trim();
                        (!val.is_empty()).then(|| val.to_string())
                    })
                    .collect();
                rows.push(row);
            }
        }

        info!("Read {} rows from {}", rows.len(), path.display());
        Ok(Some(RawTable::new(columns, rows)))
    }
}
