use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use encoding_rs::{CoderResult, Decoder};
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::decoding::{split_fields, RowSplitter};
use super::dialect::Dialect;
use super::progress::BatchNotifier;
use super::record::{ReadBatch, ReadOptions, Row};
use crate::error::{CsvStreamError, Result};

/// Lifecycle of a [`CsvReader`]. Only a `Ready` reader may start a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Ready,
    InProgress,
    Done,
}

/// Streaming CSV reader.
///
/// The `CsvReader` pulls fixed-size chunks from an async byte source,
/// resolves complete rows as they appear and hands mapped rows to a
/// callback in batches. Memory use is bounded by the chunk size plus the
/// longest single row, never by the size of the file.
///
/// # Features
///
/// - Quoted fields may hold separators, doubled qualifiers and raw line
///   breaks, even when a chunk boundary falls in the middle of them
/// - `\n` and `\r\n` line endings; blank lines are skipped
/// - Any `encoding_rs` text encoding, with split multi-byte sequences
///   carried across chunks
/// - Cooperative cancellation, checked once per chunk
///
/// A reader runs exactly one session: a second call to [`CsvReader::read`]
/// fails with [`CsvStreamError::Usage`], even if the first one failed.
pub struct CsvReader<R> {
    /// The underlying byte source.
    source: R,
    dialect: Arc<Dialect>,
    options: ReadOptions,
    /// Source length for progress reporting, 0 when unknown.
    total_bytes: u64,
    state: SessionState,
    column_names: Vec<String>,
    /// Data rows passed through the row mapper.
    total_rows: u64,
}

impl CsvReader<File> {
    /// Opens a file for reading; its length drives progress reporting.
    pub async fn open(
        path: &Path,
        dialect: Arc<Dialect>,
        options: ReadOptions,
    ) -> Result<Self> {
        let file = File::open(path).await?;
        let total_bytes = file.metadata().await?.len();
        Ok(Self::new(file, dialect, options).with_total_bytes(total_bytes))
    }
}

impl<R: AsyncRead + Unpin> CsvReader<R> {
    /// Creates a reader over any async byte source.
    pub fn new(source: R, dialect: Arc<Dialect>, options: ReadOptions) -> Self {
        Self {
            source,
            dialect,
            options,
            total_bytes: 0,
            state: SessionState::Ready,
            column_names: Vec::new(),
            total_rows: 0,
        }
    }

    /// Sets the source length reported in every batch.
    pub fn with_total_bytes(mut self, total_bytes: u64) -> Self {
        self.total_bytes = total_bytes;
        self
    }

    /// Reads the whole source, delivering mapped rows to `on_batch`.
    ///
    /// `row_mapper` turns each data row into the caller's model type.
    /// `on_batch` receives a [`ReadBatch`] every time `batch_size` rows have
    /// been mapped and once more for the remainder at end of stream; only
    /// the last batch has `is_complete` set.
    ///
    /// The first row of the stream either becomes the column names
    /// (`first_row_is_header`) or stays data, in which case the columns are
    /// named `"0"`, `"1"`, ... after its field count. Later rows are not
    /// checked against that count.
    ///
    /// On cancellation, rows already decoded but not yet delivered (a
    /// partial batch, or a full one held back as a possible terminal batch)
    /// are dropped.
    ///
    /// # Errors
    ///
    /// - [`CsvStreamError::Usage`] on a second call, a zero batch size or a
    ///   zero chunk length
    /// - [`CsvStreamError::Cancelled`] if `cancel` is set at entry or
    ///   between two chunks
    /// - [`CsvStreamError::Format`] for an unterminated quoted field at end
    ///   of stream or a badly quoted field
    /// - [`CsvStreamError::Io`] when the source fails
    pub async fn read<T, M, F>(
        &mut self,
        row_mapper: M,
        mut on_batch: F,
        cancel: &CancellationToken,
    ) -> Result<()>
    where
        M: FnMut(Row) -> T,
        F: FnMut(ReadBatch<T>),
    {
        self.read_with_backpressure(
            row_mapper,
            |batch| {
                on_batch(batch);
                std::future::ready(())
            },
            cancel,
        )
        .await
    }

    /// Same as [`CsvReader::read`], except that `on_batch` returns a future
    /// the reader awaits before it decodes any further input.
    ///
    /// A slow consumer therefore paces the reader: nothing more is read from
    /// the source while a batch is being delivered.
    pub async fn read_with_backpressure<T, M, F, Fut>(
        &mut self,
        mut row_mapper: M,
        mut on_batch: F,
        cancel: &CancellationToken,
    ) -> Result<()>
    where
        M: FnMut(Row) -> T,
        F: FnMut(ReadBatch<T>) -> Fut,
        Fut: Future<Output = ()>,
    {
        if self.state != SessionState::Ready {
            return Err(CsvStreamError::usage(
                "read() may only be called once per reader",
            ));
        }
        self.state = SessionState::InProgress;

        let result = self.run(&mut row_mapper, &mut on_batch, cancel).await;
        self.state = SessionState::Done;

        match &result {
            Ok(()) => info!(
                rows = self.total_rows,
                columns = self.column_names.len(),
                bytes = self.total_bytes,
                "CSV read complete"
            ),
            Err(CsvStreamError::Cancelled) => {
                warn!(rows = self.total_rows, "CSV read cancelled")
            }
            Err(e) => debug!(error = %e, "CSV read failed"),
        }
        result
    }

    async fn run<T, M, F, Fut>(
        &mut self,
        row_mapper: &mut M,
        on_batch: &mut F,
        cancel: &CancellationToken,
    ) -> Result<()>
    where
        M: FnMut(Row) -> T,
        F: FnMut(ReadBatch<T>) -> Fut,
        Fut: Future<Output = ()>,
    {
        if self.options.batch_size == 0 {
            return Err(CsvStreamError::usage("batch_size must be greater than 0"));
        }
        if self.options.chunk_buffer_length == 0 {
            return Err(CsvStreamError::usage(
                "chunk_buffer_length must be greater than 0",
            ));
        }

        let chunk_len = self.options.chunk_buffer_length as usize;
        let trim = self.options.trim_fields;
        let first_row_is_header = self.options.first_row_is_header;

        let mut decoder = self.options.encoding.new_decoder_with_bom_removal();
        let mut chunk = vec![0u8; chunk_len];
        // Decoded text: the carried partial row followed by the newest chunk.
        let mut text = String::with_capacity(chunk_len);
        let mut splitter = RowSplitter::new(self.dialect.qualifier());
        let mut spans = Vec::new();
        let mut notifier = BatchNotifier::new(self.options.batch_size, self.total_bytes);
        let mut header_resolved = false;
        let mut bytes_read: u64 = 0;

        loop {
            if cancel.is_cancelled() {
                if notifier.pending_rows() > 0 {
                    debug!(dropped = notifier.pending_rows(), "Undelivered rows dropped");
                }
                return Err(CsvStreamError::Cancelled);
            }

            let n = fill_chunk(&mut self.source, &mut chunk).await?;
            let last = n < chunk_len;
            bytes_read += n as u64;
            decode_into(&mut decoder, &chunk[..n], &mut text, last);

            spans.clear();
            splitter.scan(&text, &mut spans);
            if last {
                spans.extend(splitter.finish(&text)?);
            }
            notifier.set_bytes_read(bytes_read);

            debug!(
                bytes_read,
                rows = spans.len(),
                carry = splitter.carry_len(),
                last,
                "Processed chunk"
            );

            for span in &spans {
                let row = split_fields(span.text(&text), &self.dialect, trim, span.line)?;

                if !header_resolved {
                    header_resolved = true;
                    if first_row_is_header {
                        self.column_names = row;
                        notifier.set_column_names(self.column_names.clone());
                        continue;
                    }
                    self.column_names = (0..row.len()).map(|i| i.to_string()).collect();
                    notifier.set_column_names(self.column_names.clone());
                }

                self.total_rows += 1;
                if let Some(batch) = notifier.push(row_mapper(row)) {
                    on_batch(batch).await;
                }
            }

            let resolved = splitter.discard_resolved();
            text.drain(..resolved);

            if last {
                break;
            }
        }

        if let Some(batch) = notifier.finish() {
            on_batch(batch).await;
        }
        Ok(())
    }

    /// Column names resolved from the first row; empty before it is seen.
    pub fn column_names(&self) -> &[String] {
        &self.column_names
    }

    pub fn column_count(&self) -> usize {
        self.column_names.len()
    }

    /// Data rows mapped so far (the header row excluded).
    pub fn total_rows(&self) -> u64 {
        self.total_rows
    }

    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn dialect(&self) -> &Arc<Dialect> {
        &self.dialect
    }

    /// Releases the underlying source.
    pub fn into_inner(self) -> R {
        self.source
    }
}

/// Reads until `buf` is full or the source is exhausted.
async fn fill_chunk<R: AsyncRead + Unpin>(source: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = source.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

/// Appends the decoded form of `bytes` to `text`.
///
/// Incomplete multi-byte sequences at the end of `bytes` stay inside the
/// decoder until the next chunk; malformed sequences become U+FFFD.
fn decode_into(decoder: &mut Decoder, bytes: &[u8], text: &mut String, last: bool) {
    let mut input = bytes;
    loop {
        let needed = decoder
            .max_utf8_buffer_length(input.len())
            .unwrap_or(input.len().saturating_mul(3) + 16);
        text.reserve(needed);
        let (result, read, _had_replacements) = decoder.decode_to_string(input, text, last);
        input = &input[read..];
        match result {
            CoderResult::InputEmpty => break,
            CoderResult::OutputFull => continue,
        }
    }
}
