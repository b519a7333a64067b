//! CSV Inspection Module
//!
//! Streams a CSV file once and reports its shape: column names, row count,
//! and how many rows disagree with the header's field count. Rows are mapped
//! to their field count as they are decoded, so memory use does not grow
//! with the file.
//!
//! # Example
//!
//! ```no_run
//! use csv_stream::csv_handler::{Dialect, ReadOptions};
//! use csv_stream::inspector::Inspector;
//! use std::path::Path;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run() -> csv_stream::error::Result<()> {
//! let inspector = Inspector::new(Dialect::rfc4180(), ReadOptions::default());
//! let report = inspector
//!     .inspect(Path::new("data.csv"), &CancellationToken::new())
//!     .await?;
//! println!("{}", report);
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use tokio::io::AsyncRead;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::csv_handler::{CsvReader, Dialect, ReadOptions};
use crate::error::Result;

/// Result of inspecting a CSV source.
///
/// # Fields
///
/// * `columns` - Header names, or `"0"`, `"1"`, ... when the first row is data
/// * `column_count` - Number of columns
/// * `rows` - Data rows (header excluded)
/// * `ragged_rows` - Rows whose field count differs from `column_count`
/// * `first_ragged_row` - 1-based data row index of the first ragged row
/// * `bytes` - Source bytes consumed
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct InspectReport {
    pub columns: Vec<String>,
    pub column_count: usize,
    pub rows: u64,
    pub ragged_rows: u64,
    pub first_ragged_row: Option<u64>,
    pub bytes: u64,
}

impl InspectReport {
    /// Returns true when every row has the header's field count.
    pub fn is_consistent(&self) -> bool {
        self.ragged_rows == 0
    }
}

impl fmt::Display for InspectReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "CSV Inspection Report")?;
        writeln!(f, "=====================")?;
        writeln!(
            f,
            "Status: {}",
            if self.is_consistent() {
                "CONSISTENT"
            } else {
                "RAGGED"
            }
        )?;
        writeln!(f)?;
        writeln!(f, "Columns ({}):", self.column_count)?;
        for (i, name) in self.columns.iter().enumerate() {
            writeln!(f, "  {:>3}. {}", i + 1, name)?;
        }
        writeln!(f)?;
        writeln!(f, "Statistics:")?;
        writeln!(f, "  Rows:              {:>10}", self.rows)?;
        writeln!(f, "  Ragged rows:       {:>10}", self.ragged_rows)?;
        writeln!(f, "  Bytes:             {:>10}", self.bytes)?;
        if let Some(row) = self.first_ragged_row {
            writeln!(f)?;
            writeln!(f, "First ragged row: {}", row)?;
        }
        Ok(())
    }
}

/// Streaming file inspector.
#[derive(Debug, Clone)]
pub struct Inspector {
    dialect: Arc<Dialect>,
    options: ReadOptions,
}

impl Inspector {
    pub fn new(dialect: Arc<Dialect>, options: ReadOptions) -> Self {
        Self { dialect, options }
    }

    /// Inspects a file on disk.
    pub async fn inspect(&self, path: &Path, cancel: &CancellationToken) -> Result<InspectReport> {
        let reader = CsvReader::open(path, self.dialect.clone(), self.options.clone()).await?;
        self.inspect_stream(reader, cancel).await
    }

    /// Inspects any async source through an already configured reader.
    pub async fn inspect_stream<R>(
        &self,
        mut reader: CsvReader<R>,
        cancel: &CancellationToken,
    ) -> Result<InspectReport>
    where
        R: AsyncRead + Unpin,
    {
        let mut report = InspectReport::default();

        reader
            .read(
                |row| row.len(),
                |batch| {
                    let expected = batch.column_names.len();
                    for count in &batch.rows {
                        report.rows += 1;
                        if *count != expected {
                            report.ragged_rows += 1;
                            report.first_ragged_row.get_or_insert(report.rows);
                        }
                    }
                    report.bytes = batch.bytes_read_so_far;
                    debug!(
                        rows = report.rows,
                        progress = format!("{:.1}%", batch.progress_percent()),
                        "Inspected batch"
                    );
                },
                cancel,
            )
            .await?;

        report.columns = reader.column_names().to_vec();
        report.column_count = reader.column_count();
        report.bytes = report.bytes.max(reader.total_bytes());

        info!(
            rows = report.rows,
            columns = report.column_count,
            ragged = report.ragged_rows,
            "Inspection complete"
        );
        Ok(report)
    }
}
