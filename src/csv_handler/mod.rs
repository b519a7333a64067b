//! CSV handler module
//!
//! Streaming CSV decoding and encoding over async byte sources and sinks.
//! Rows are read in fixed-size chunks and delivered in batches; written rows
//! are escaped one at a time.

pub mod decoding;
pub mod dialect;
pub mod encoding;
pub mod progress;
pub mod reader;
pub mod record;
pub mod writer;

pub use decoding::{decode_rows, split_fields, unescape_field, RowSpan, RowSplitter};
pub use dialect::{Dialect, RFC4180_QUALIFIER, RFC4180_SEPARATOR};
pub use encoding::{encode_row, encode_row_into, escape_field, needs_qualifying};
pub use progress::{BatchNotifier, WriteNotifier};
pub use reader::{CsvReader, SessionState};
pub use record::{
    LineTerminator, ReadBatch, ReadOptions, Row, WriteOptions, WriteProgress, WriteSummary,
    DEFAULT_BATCH_SIZE, DEFAULT_CHUNK_BUFFER_LENGTH,
};
pub use writer::CsvWriter;
