//! Batch accumulation and progress notification.
//!
//! [`BatchNotifier`] collects mapped rows on the read side and groups them
//! into batches of `batch_size` for the reader to deliver. [`WriteNotifier`] counts
//! written rows and decides when the write callback should fire.
//!
//! Callbacks run on whatever task drives the reader or writer. Moving the
//! data to another context (a UI thread, a channel) is up to the callback.

use tracing::debug;

use super::record::{ReadBatch, WriteProgress};

/// Accumulates rows and emits [`ReadBatch`]es.
///
/// A batch that reaches `batch_size` is held back until either another row
/// arrives or the stream ends, so that the terminal batch is always the one
/// flagged `is_complete`, even when the row count is an exact multiple of
/// the batch size. A held batch keeps the byte count from the moment it
/// filled; the terminal batch reports every byte consumed.
#[derive(Debug)]
pub struct BatchNotifier<T> {
    batch_size: usize,
    rows: Vec<T>,
    /// Full batch waiting for the next row, with its byte count.
    held: Option<(Vec<T>, u64)>,
    column_names: Vec<String>,
    bytes_read: u64,
    total_bytes: u64,
    batches_emitted: u64,
    rows_emitted: u64,
}

impl<T> BatchNotifier<T> {
    /// `batch_size` must be non-zero; the reader validates it beforehand.
    pub fn new(batch_size: u32, total_bytes: u64) -> Self {
        let batch_size = batch_size.max(1) as usize;
        Self {
            batch_size,
            rows: Vec::with_capacity(batch_size.min(4096)),
            held: None,
            column_names: Vec::new(),
            bytes_read: 0,
            total_bytes,
            batches_emitted: 0,
            rows_emitted: 0,
        }
    }

    /// Sets the column names attached to every following batch.
    pub fn set_column_names(&mut self, names: Vec<String>) {
        self.column_names = names;
    }

    pub fn column_names(&self) -> &[String] {
        &self.column_names
    }

    /// Records how many source bytes have been consumed so far.
    pub fn set_bytes_read(&mut self, bytes: u64) {
        self.bytes_read = bytes;
    }

    /// Adds one mapped row. Returns the previously held full batch, if any.
    pub fn push(&mut self, row: T) -> Option<ReadBatch<T>> {
        let ready = self
            .held
            .take()
            .map(|(full, bytes_read)| self.emit(full, bytes_read, false));

        self.rows.push(row);
        if self.rows.len() == self.batch_size {
            let capacity = self.batch_size.min(4096);
            let full = std::mem::replace(&mut self.rows, Vec::with_capacity(capacity));
            self.held = Some((full, self.bytes_read));
        }
        ready
    }

    /// Returns whatever is left as the terminal batch, or `None` when no
    /// rows remain.
    pub fn finish(&mut self) -> Option<ReadBatch<T>> {
        let rows = match self.held.take() {
            Some((full, _)) => full,
            None if !self.rows.is_empty() => std::mem::take(&mut self.rows),
            None => return None,
        };
        Some(self.emit(rows, self.bytes_read, true))
    }

    /// Rows decoded but not yet handed out.
    pub fn pending_rows(&self) -> usize {
        self.rows.len() + self.held.as_ref().map_or(0, |(full, _)| full.len())
    }

    fn emit(&mut self, rows: Vec<T>, bytes_read: u64, is_complete: bool) -> ReadBatch<T> {
        self.batches_emitted += 1;
        self.rows_emitted += rows.len() as u64;
        debug!(
            batch = self.batches_emitted,
            rows = rows.len(),
            bytes_read,
            is_complete,
            "Emitting read batch"
        );
        ReadBatch {
            column_names: self.column_names.clone(),
            rows,
            bytes_read_so_far: bytes_read,
            total_bytes: self.total_bytes,
            is_complete,
        }
    }

    /// Rows already handed out in batches.
    pub fn rows_emitted(&self) -> u64 {
        self.rows_emitted
    }

    pub fn batches_emitted(&self) -> u64 {
        self.batches_emitted
    }
}

/// Counts written rows and produces [`WriteProgress`] notifications.
///
/// A notification is due each time the running total is an exact multiple
/// of `batch_size`. On close, the rows written since the last periodic
/// notification are reported once, unless there are none.
#[derive(Debug, Clone)]
pub struct WriteNotifier {
    batch_size: u64,
    total_rows: u64,
    since_last_notice: u64,
}

impl WriteNotifier {
    pub fn new(batch_size: u32) -> Self {
        Self {
            batch_size: u64::from(batch_size.max(1)),
            total_rows: 0,
            since_last_notice: 0,
        }
    }

    /// Counts one written row; returns a notification when one is due.
    pub fn record_row(&mut self) -> Option<WriteProgress> {
        self.total_rows += 1;
        self.since_last_notice += 1;
        if self.total_rows % self.batch_size == 0 {
            Some(self.take_notice(false))
        } else {
            None
        }
    }

    /// Final notification carrying the remainder, if any.
    pub fn finish(&mut self) -> Option<WriteProgress> {
        if self.since_last_notice == 0 {
            None
        } else {
            Some(self.take_notice(true))
        }
    }

    fn take_notice(&mut self, is_final: bool) -> WriteProgress {
        let progress = WriteProgress {
            rows_since_last_notice: self.since_last_notice,
            total_rows: self.total_rows,
            is_final,
        };
        self.since_last_notice = 0;
        progress
    }

    pub fn total_rows(&self) -> u64 {
        self.total_rows
    }
}
