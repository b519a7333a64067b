use std::path::Path;
use std::sync::Arc;

use encoding_rs::{Encoder, EncoderResult, UTF_8};
use tokio::fs::File;
use tokio::io::{AsyncWrite, AsyncWriteExt, BufWriter};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::dialect::Dialect;
use super::encoding::encode_row_into;
use super::progress::WriteNotifier;
use super::record::{Row, WriteOptions, WriteProgress, WriteSummary};
use crate::error::{CsvStreamError, Result};

type ProgressCallback = Box<dyn FnMut(WriteProgress) + Send>;

/// Streaming CSV writer.
///
/// The `CsvWriter` escapes one row at a time and writes it, with a line
/// terminator, to a buffered async sink. Rows are never collected in memory.
///
/// # Features
///
/// - Fields are qualified only when they contain the separator, the
///   qualifier, `\r` or `\n`; qualifiers inside are doubled
/// - The first row fixes the field count for the session; a row with a
///   different count is rejected
/// - Optional progress callback every `batch_size` rows, plus one for the
///   remainder on [`CsvWriter::close`]
/// - Cooperative cancellation, checked before every row
/// - Any `encoding_rs` output encoding except UTF-16 and `replacement`; a
///   character the encoding cannot represent fails the row instead of
///   being substituted
///
/// Any error ends the session: later writes fail with
/// [`CsvStreamError::Usage`]. Dropping a writer without calling `close()`
/// may lose rows still sitting in the buffer.
pub struct CsvWriter<W> {
    sink: BufWriter<W>,
    dialect: Arc<Dialect>,
    options: WriteOptions,
    cancel: CancellationToken,
    on_progress: Option<ProgressCallback>,
    notifier: WriteNotifier,
    /// Field count fixed by the first row written.
    column_count: Option<usize>,
    /// Reused line buffer.
    line: String,
    /// `None` when the sink takes UTF-8 as is.
    encoder: Option<Encoder>,
    /// Reused buffer for the encoded line.
    encoded: Vec<u8>,
    bytes_written: u64,
    failed: bool,
}

impl CsvWriter<File> {
    /// Creates (or truncates) a file and writes to it.
    pub async fn create(
        path: &Path,
        dialect: Arc<Dialect>,
        options: WriteOptions,
        cancel: CancellationToken,
    ) -> Result<Self> {
        let file = File::create(path).await?;
        Self::new(file, dialect, options, cancel)
    }
}

impl<W: AsyncWrite + Unpin> CsvWriter<W> {
    /// Creates a writer over any async byte sink.
    ///
    /// # Errors
    ///
    /// [`CsvStreamError::Usage`] when `options.batch_size` is 0, or when
    /// `options.encoding` is one `encoding_rs` can only decode (UTF-16LE,
    /// UTF-16BE, `replacement`).
    pub fn new(
        sink: W,
        dialect: Arc<Dialect>,
        options: WriteOptions,
        cancel: CancellationToken,
    ) -> Result<Self> {
        if options.batch_size == 0 {
            return Err(CsvStreamError::usage("batch_size must be greater than 0"));
        }
        let encoding = options.encoding;
        if encoding.output_encoding() != encoding {
            return Err(CsvStreamError::usage(format!(
                "{} is not supported as an output encoding",
                encoding.name()
            )));
        }
        let encoder = (encoding != UTF_8).then(|| encoding.new_encoder());

        Ok(Self {
            sink: BufWriter::new(sink),
            notifier: WriteNotifier::new(options.batch_size),
            dialect,
            options,
            cancel,
            on_progress: None,
            column_count: None,
            line: String::with_capacity(1024),
            encoder,
            encoded: Vec::new(),
            bytes_written: 0,
            failed: false,
        })
    }

    /// Installs the progress callback.
    ///
    /// The callback runs on the task that calls `write_row` or `close`.
    pub fn with_progress<F>(mut self, on_progress: F) -> Self
    where
        F: FnMut(WriteProgress) + Send + 'static,
    {
        self.on_progress = Some(Box::new(on_progress));
        self
    }

    /// Escapes and writes one row.
    ///
    /// # Errors
    ///
    /// - [`CsvStreamError::Usage`] for a row with no fields, a row whose
    ///   field count differs from the first row's, or a writer that already
    ///   failed
    /// - [`CsvStreamError::Unencodable`] when a field holds a character the
    ///   output encoding cannot represent; nothing of the row is written
    /// - [`CsvStreamError::Cancelled`] when the cancellation token is set
    /// - [`CsvStreamError::Io`] when the sink fails
    pub async fn write_row<S: AsRef<str>>(&mut self, row: &[S]) -> Result<()> {
        if self.failed {
            return Err(CsvStreamError::usage(
                "writer cannot be used after a failed write",
            ));
        }

        let result = self.write_row_inner(row).await;
        if result.is_err() {
            self.failed = true;
        }
        result
    }

    async fn write_row_inner<S: AsRef<str>>(&mut self, row: &[S]) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(CsvStreamError::Cancelled);
        }
        if row.is_empty() {
            return Err(CsvStreamError::usage("row has no fields"));
        }
        if let Some(expected) = self.column_count {
            if row.len() != expected {
                return Err(CsvStreamError::usage(format!(
                    "row has {} fields, expected {}",
                    row.len(),
                    expected
                )));
            }
        }

        self.line.clear();
        encode_row_into(row, &self.dialect, &mut self.line);
        self.line.push_str(self.options.line_terminator.as_str());

        let bytes: &[u8] = match self.encoder.as_mut() {
            None => self.line.as_bytes(),
            Some(encoder) => {
                if let Err(character) = encode_line(encoder, &self.line, &mut self.encoded) {
                    return Err(CsvStreamError::Unencodable {
                        row: self.notifier.total_rows() + 1,
                        character,
                        encoding: self.options.encoding.name(),
                    });
                }
                &self.encoded
            }
        };
        self.sink.write_all(bytes).await?;
        self.bytes_written += bytes.len() as u64;

        if self.column_count.is_none() {
            self.column_count = Some(row.len());
        }

        if let Some(progress) = self.notifier.record_row() {
            debug!(
                total_rows = progress.total_rows,
                rows = progress.rows_since_last_notice,
                "Write progress"
            );
            if let Some(on_progress) = self.on_progress.as_mut() {
                on_progress(progress);
            }
        }
        Ok(())
    }

    /// Writes rows in order, stopping at the first failure.
    pub async fn write_rows<I, R, S>(&mut self, rows: I) -> Result<()>
    where
        I: IntoIterator<Item = R>,
        R: AsRef<[S]>,
        S: AsRef<str>,
    {
        for row in rows {
            self.write_row(row.as_ref()).await?;
        }
        Ok(())
    }

    /// Converts a model with `model_to_row` and writes the result.
    pub async fn write_model<T, M>(&mut self, model: T, model_to_row: M) -> Result<()>
    where
        M: FnOnce(T) -> Row,
    {
        let row = model_to_row(model);
        self.write_row(&row).await
    }

    /// Converts and writes every model in order.
    pub async fn write_models<T, I, M>(&mut self, models: I, mut model_to_row: M) -> Result<()>
    where
        I: IntoIterator<Item = T>,
        M: FnMut(T) -> Row,
    {
        for model in models {
            let row = model_to_row(model);
            self.write_row(&row).await?;
        }
        Ok(())
    }

    /// Pushes buffered bytes to the sink without closing it.
    pub async fn flush(&mut self) -> Result<()> {
        self.sink.flush().await?;
        Ok(())
    }

    /// Flushes and shuts down the sink.
    ///
    /// If rows were written since the last periodic notification, the
    /// callback receives them once more with `is_final` set. Closing a
    /// writer that never wrote a row is fine.
    pub async fn close(mut self) -> Result<WriteSummary> {
        self.sink.shutdown().await?;

        if !self.failed {
            if let Some(progress) = self.notifier.finish() {
                if let Some(on_progress) = self.on_progress.as_mut() {
                    on_progress(progress);
                }
            }
        }

        let summary = self.summary();
        info!(
            rows = summary.total_rows,
            bytes = summary.bytes_written,
            "CSV write complete"
        );
        Ok(summary)
    }

    /// Field count fixed by the first row, if any row was written.
    pub fn column_count(&self) -> Option<usize> {
        self.column_count
    }

    pub fn total_rows(&self) -> u64 {
        self.notifier.total_rows()
    }

    /// Encoded bytes handed to the sink buffer.
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    pub fn summary(&self) -> WriteSummary {
        WriteSummary {
            total_rows: self.total_rows(),
            bytes_written: self.bytes_written,
            column_count: self.column_count.unwrap_or(0),
        }
    }

    pub fn dialect(&self) -> &Arc<Dialect> {
        &self.dialect
    }
}

/// Encodes `text` into `out` without substitution.
///
/// Returns the first character the encoder has no mapping for.
fn encode_line(encoder: &mut Encoder, text: &str, out: &mut Vec<u8>) -> std::result::Result<(), char> {
    out.clear();
    let mut input = text;
    loop {
        let needed = encoder
            .max_buffer_length_from_utf8_without_replacement(input.len())
            .unwrap_or(input.len().saturating_mul(4) + 16);
        out.reserve(needed);
        let (result, read) = encoder.encode_from_utf8_to_vec_without_replacement(input, out, false);
        input = &input[read..];
        match result {
            EncoderResult::InputEmpty => return Ok(()),
            EncoderResult::OutputFull => continue,
            EncoderResult::Unmappable(character) => return Err(character),
        }
    }
}
