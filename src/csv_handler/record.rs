//! Row, batch and option types shared by the streaming reader and writer.
//!
//! Defines [`Row`], the batch handed to read callbacks ([`ReadBatch`]), the
//! write notification ([`WriteProgress`]) and the option structs that
//! configure a session ([`ReadOptions`], [`WriteOptions`]).

use encoding_rs::{Encoding, UTF_8};
use serde::Serialize;

/// Default number of bytes pulled from the source per chunk.
pub const DEFAULT_CHUNK_BUFFER_LENGTH: u32 = 40_960;

/// Default number of rows per batch notification.
pub const DEFAULT_BATCH_SIZE: u32 = 1_000;

/// An ordered sequence of unescaped field values.
pub type Row = Vec<String>;

/// A group of mapped rows delivered to a read callback.
///
/// A fresh batch is built every time `batch_size` rows have accumulated and
/// once more at end of stream for any remainder. Ownership moves to the
/// callback; the reader keeps nothing that refers to it.
///
/// # Fields
///
/// * `column_names` - Header row, or `"0"`, `"1"`, ... when the first row is data
/// * `rows` - Rows produced by the caller's row mapper
/// * `bytes_read_so_far` - Source bytes consumed when the batch's last row was
///   decoded; every byte of the source on the terminal batch
/// * `total_bytes` - Source length, or 0 when unknown
/// * `is_complete` - True only on the terminal batch of the session
#[derive(Debug, Clone, PartialEq)]
pub struct ReadBatch<T> {
    pub column_names: Vec<String>,
    pub rows: Vec<T>,
    pub bytes_read_so_far: u64,
    pub total_bytes: u64,
    pub is_complete: bool,
}

impl<T> ReadBatch<T> {
    /// Percentage of the source consumed, 0 when the total length is unknown.
    pub fn progress_percent(&self) -> f64 {
        if self.total_bytes == 0 {
            return 0.0;
        }
        self.bytes_read_so_far as f64 / self.total_bytes as f64 * 100.0
    }

    /// Number of rows in this batch.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// True when the batch carries no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// A write progress notification.
///
/// `rows_since_last_notice` is what changed since the previous notification;
/// `total_rows` is the running total for the session, so the two never need
/// to be reconciled by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WriteProgress {
    pub rows_since_last_notice: u64,
    pub total_rows: u64,
    /// Set on the notification emitted by `close()`.
    pub is_final: bool,
}

/// Line terminator emitted after every written row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineTerminator {
    /// `\r\n`, as RFC 4180 prescribes.
    Crlf,
    /// `\n`
    Lf,
}

impl LineTerminator {
    /// The host's conventional terminator.
    pub fn host() -> Self {
        if cfg!(windows) {
            LineTerminator::Crlf
        } else {
            LineTerminator::Lf
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LineTerminator::Crlf => "\r\n",
            LineTerminator::Lf => "\n",
        }
    }
}

impl Default for LineTerminator {
    fn default() -> Self {
        LineTerminator::host()
    }
}

/// Options for a read session.
#[derive(Debug, Clone)]
pub struct ReadOptions {
    /// Consume the first row as column names instead of data.
    pub first_row_is_header: bool,
    /// Bytes requested from the source per chunk.
    pub chunk_buffer_length: u32,
    /// Rows per batch notification.
    pub batch_size: u32,
    /// Trim surrounding whitespace from unquoted fields.
    pub trim_fields: bool,
    /// Source text encoding. A leading byte order mark is removed.
    pub encoding: &'static Encoding,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            first_row_is_header: true,
            chunk_buffer_length: DEFAULT_CHUNK_BUFFER_LENGTH,
            batch_size: DEFAULT_BATCH_SIZE,
            trim_fields: false,
            encoding: UTF_8,
        }
    }
}

impl ReadOptions {
    pub fn first_row_is_header(mut self, yes: bool) -> Self {
        self.first_row_is_header = yes;
        self
    }

    pub fn chunk_buffer_length(mut self, bytes: u32) -> Self {
        self.chunk_buffer_length = bytes;
        self
    }

    pub fn batch_size(mut self, rows: u32) -> Self {
        self.batch_size = rows;
        self
    }

    pub fn trim_fields(mut self, yes: bool) -> Self {
        self.trim_fields = yes;
        self
    }

    pub fn encoding(mut self, encoding: &'static Encoding) -> Self {
        self.encoding = encoding;
        self
    }
}

/// Options for a write session.
#[derive(Debug, Clone)]
pub struct WriteOptions {
    /// Rows between progress notifications.
    pub batch_size: u32,
    pub line_terminator: LineTerminator,
    /// Sink text encoding. UTF-16 and `replacement` can only be decoded;
    /// a writer configured with them refuses to start.
    pub encoding: &'static Encoding,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            line_terminator: LineTerminator::default(),
            encoding: UTF_8,
        }
    }
}

impl WriteOptions {
    pub fn batch_size(mut self, rows: u32) -> Self {
        self.batch_size = rows;
        self
    }

    pub fn line_terminator(mut self, terminator: LineTerminator) -> Self {
        self.line_terminator = terminator;
        self
    }

    pub fn encoding(mut self, encoding: &'static Encoding) -> Self {
        self.encoding = encoding;
        self
    }
}

/// Totals reported when a write session is closed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WriteSummary {
    pub total_rows: u64,
    pub bytes_written: u64,
    pub column_count: usize,
}
