//! CSV Conversion Module
//!
//! Streams a CSV file in one dialect and text encoding into a file in
//! another. Memory use is bounded by a few batches of rows, whatever the
//! file size.
//!
//! # Overview
//!
//! The [`Converter`] runs a [`CsvReader`] on a spawned task and forwards each
//! [`ReadBatch`] over a bounded channel to a [`CsvWriter`] on the calling
//! task. The reader waits for room in the channel before decoding more
//! input, so a slow sink slows the reader down instead of queueing the
//! file. The header row, when present, is written first. Both halves share
//! one cancellation token; an error on either side cancels the other.
//!
//! # Example
//!
//! ```no_run
//! use csv_stream::converter::Converter;
//! use csv_stream::csv_handler::Dialect;
//! use std::path::Path;
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run() -> csv_stream::error::Result<()> {
//! let converter = Converter::new(Dialect::rfc4180(), Arc::new(Dialect::new(';', '"')));
//! let stats = converter
//!     .convert(Path::new("in.csv"), Path::new("out.csv"), &CancellationToken::new())
//!     .await?;
//! println!("Converted {} rows", stats.rows_written);
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::csv_handler::{
    CsvReader, CsvWriter, Dialect, ReadBatch, ReadOptions, Row, WriteOptions,
};
use crate::error::{CsvStreamError, Result};

/// Batches queued between the reader task and the writer.
const BATCHES_IN_FLIGHT: usize = 1;

/// Statistics collected during a conversion.
///
/// # Fields
///
/// * `rows_read` - Data rows decoded from the input (header excluded)
/// * `rows_written` - Data rows written to the output (header excluded)
/// * `header_written` - Whether a header row was copied to the output
/// * `batches` - Read batches forwarded to the writer
/// * `bytes_read` - Input bytes consumed
/// * `bytes_written` - Encoded output bytes
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct ConvertStats {
    pub rows_read: u64,
    pub rows_written: u64,
    pub header_written: bool,
    pub batches: u64,
    pub bytes_read: u64,
    pub bytes_written: u64,
}

impl ConvertStats {
    /// True when every decoded row reached the output.
    pub fn is_success(&self) -> bool {
        self.rows_read == self.rows_written
    }
}

impl fmt::Display for ConvertStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "CSV Conversion Report")?;
        writeln!(f, "=====================")?;
        writeln!(
            f,
            "Status: {}",
            if self.is_success() { "SUCCESS" } else { "PARTIAL" }
        )?;
        writeln!(f)?;
        writeln!(f, "Statistics:")?;
        writeln!(f, "  Rows read:         {:>10}", self.rows_read)?;
        writeln!(f, "  Rows written:      {:>10}", self.rows_written)?;
        writeln!(
            f,
            "  Header written:    {:>10}",
            if self.header_written { "yes" } else { "no" }
        )?;
        writeln!(f, "  Batches:           {:>10}", self.batches)?;
        writeln!(f, "  Bytes read:        {:>10}", self.bytes_read)?;
        writeln!(f, "  Bytes written:     {:>10}", self.bytes_written)?;
        Ok(())
    }
}

/// Dialect conversion driver.
#[derive(Debug, Clone)]
pub struct Converter {
    input_dialect: Arc<Dialect>,
    output_dialect: Arc<Dialect>,
    read_options: ReadOptions,
    write_options: WriteOptions,
}

impl Converter {
    pub fn new(input_dialect: Arc<Dialect>, output_dialect: Arc<Dialect>) -> Self {
        Self {
            input_dialect,
            output_dialect,
            read_options: ReadOptions::default(),
            write_options: WriteOptions::default(),
        }
    }

    pub fn read_options(mut self, options: ReadOptions) -> Self {
        self.read_options = options;
        self
    }

    pub fn write_options(mut self, options: WriteOptions) -> Self {
        self.write_options = options;
        self
    }

    /// Converts `input` into `output`, creating or truncating `output`.
    ///
    /// # Errors
    ///
    /// [`CsvStreamError::Usage`] when both paths name the same file, plus
    /// any error from reading or writing.
    pub async fn convert(
        &self,
        input: &Path,
        output: &Path,
        cancel: &CancellationToken,
    ) -> Result<ConvertStats> {
        if let (Ok(a), Ok(b)) = (
            tokio::fs::canonicalize(input).await,
            tokio::fs::canonicalize(output).await,
        ) {
            if a == b {
                return Err(CsvStreamError::usage(
                    "input and output must be different files",
                ));
            }
        }

        let reader =
            CsvReader::open(input, self.input_dialect.clone(), self.read_options.clone()).await?;
        let sink = File::create(output).await?;
        self.convert_stream(reader, sink, cancel).await
    }

    /// Converts from an already configured reader into any async sink.
    ///
    /// The reader's own dialect and options apply to the input side.
    pub async fn convert_stream<R, W>(
        &self,
        reader: CsvReader<R>,
        sink: W,
        cancel: &CancellationToken,
    ) -> Result<ConvertStats>
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin,
    {
        let session = cancel.child_token();
        // Stops the reader if the writer bails out early.
        let _stop_reader = session.clone().drop_guard();

        let (tx, mut rx) = mpsc::channel::<ReadBatch<Row>>(BATCHES_IN_FLIGHT);
        let read_cancel = session.clone();
        let read_task = tokio::spawn(async move {
            let mut reader = reader;
            reader
                .read_with_backpressure(
                    |row| row,
                    |batch| {
                        let tx = tx.clone();
                        async move {
                            // Fails only once the writer has gone away, and
                            // its drop guard has cancelled the session.
                            let _ = tx.send(batch).await;
                        }
                    },
                    &read_cancel,
                )
                .await?;
            Ok::<_, CsvStreamError>(reader.column_names().to_vec())
        });

        let mut writer = CsvWriter::new(
            sink,
            self.output_dialect.clone(),
            self.write_options.clone(),
            session.clone(),
        )?
        .with_progress(|progress| {
            info!(
                rows = progress.total_rows,
                is_final = progress.is_final,
                "Rows written"
            );
        });

        let mut stats = ConvertStats::default();
        let copy_header = self.read_options.first_row_is_header;

        while let Some(batch) = rx.recv().await {
            if copy_header && !stats.header_written {
                writer.write_row(&batch.column_names).await?;
                stats.header_written = true;
            }

            stats.batches += 1;
            stats.rows_read += batch.rows.len() as u64;
            stats.bytes_read = batch.bytes_read_so_far;
            info!(
                batch = stats.batches,
                rows = stats.rows_read,
                progress = format!("{:.1}%", batch.progress_percent()),
                "Read batch"
            );

            for row in &batch.rows {
                writer.write_row(row).await?;
                stats.rows_written += 1;
            }
        }

        let column_names = read_task.await.map_err(std::io::Error::from)??;

        // A header-only input yields no batches.
        if copy_header && !stats.header_written && !column_names.is_empty() {
            writer.write_row(&column_names).await?;
            stats.header_written = true;
        }

        let summary = writer.close().await?;
        stats.bytes_written = summary.bytes_written;

        info!(
            rows = stats.rows_written,
            bytes_read = stats.bytes_read,
            bytes_written = stats.bytes_written,
            "Conversion complete"
        );
        Ok(stats)
    }
}
