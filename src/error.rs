//! Error module
//!
//! Defines the error type shared by the streaming reader, the streaming writer
//! and the command-line drivers built on top of them.
//!
//! Every error aborts the session that produced it. Readers and writers are
//! not resumable: a caller that wants to retry creates a fresh instance and
//! starts again from the beginning of the stream.

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, CsvStreamError>;

/// The main error type for csv-stream.
///
/// # Error Categories
///
/// - **Usage**: the caller broke the contract of a reader or writer
/// - **Format**: the input is not well-formed delimited text
/// - **Unencodable**: a written field holds a character the output
///   encoding has no byte sequence for
/// - **Cancelled**: a cancellation token was observed at a chunk or row boundary
/// - **I/O**: the underlying source or sink failed; propagated unchanged
///
/// # Example
///
/// ```rust,ignore
/// use csv_stream::error::CsvStreamError;
///
/// fn example() -> Result<(), CsvStreamError> {
///     // I/O errors convert automatically
///     let file = std::fs::File::open("nonexistent.csv")?;
///     Ok(())
/// }
/// ```
#[derive(Error, Debug)]
pub enum CsvStreamError {
    /// Caller contract violation.
    ///
    /// Raised for a second `read()` on a used reader, a zero batch size or
    /// chunk length, a row whose field count differs from the first row
    /// written, or a write on a writer that already failed.
    #[error("Usage error: {0}")]
    Usage(String),

    /// Malformed input.
    ///
    /// `line` is the 1-based physical line on which the offending row starts.
    #[error("Format error at line {line}: {message}")]
    Format {
        /// Physical line where the bad row begins.
        line: u64,
        /// What was wrong with it.
        message: String,
    },

    /// A row could not be written in the sink's text encoding.
    #[error("Row {row}: {character:?} cannot be encoded as {encoding}")]
    Unencodable {
        /// 1-based row number within the write session.
        row: u64,
        character: char,
        /// Name of the output encoding.
        encoding: &'static str,
    },

    /// Cooperative cancellation was observed.
    #[error("Operation cancelled")]
    Cancelled,

    /// General I/O error from the source or sink.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error (inspection reports).
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid command-line argument error.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl CsvStreamError {
    /// Builds a `Format` error for the row starting on `line`.
    pub(crate) fn format(line: u64, message: impl Into<String>) -> Self {
        CsvStreamError::Format {
            line,
            message: message.into(),
        }
    }

    /// Builds a `Usage` error.
    pub(crate) fn usage(message: impl Into<String>) -> Self {
        CsvStreamError::Usage(message.into())
    }

    /// Returns true for the cancellation outcome.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, CsvStreamError::Cancelled)
    }
}
