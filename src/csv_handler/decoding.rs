//! Row and field resolution by quote parity.
//!
//! A line feed ends a row only while the number of qualifiers seen in that
//! row is even; with an odd count the line feed belongs to a quoted field.
//! The same rule, applied to the separator, splits a row into fields.
//!
//! [`RowSplitter`] keeps that parity, plus its scan position, between calls
//! so a streaming reader can append chunk after chunk to one buffer and
//! only ever scan the new bytes. Resolved rows are reported as byte spans
//! into the caller's buffer; nothing is copied until fields are unescaped.

use super::dialect::Dialect;
use super::record::Row;
use crate::error::{CsvStreamError, Result};

/// A resolved row: a byte range into the scanned buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowSpan {
    /// First byte of the row.
    pub start: usize,
    /// One past the last byte, line terminator excluded.
    pub end: usize,
    /// 1-based physical line on which the row starts.
    pub line: u64,
}

impl RowSpan {
    /// Borrows the row's text out of the buffer it was resolved from.
    pub fn text<'a>(&self, buf: &'a str) -> &'a str {
        &buf[self.start..self.end]
    }
}

/// Incremental row boundary scanner.
///
/// Offsets are relative to the caller's buffer. After handing resolved rows
/// off, the caller drops the resolved prefix of its buffer and calls
/// [`RowSplitter::discard_resolved`] with nothing else in between.
#[derive(Debug, Clone)]
pub struct RowSplitter {
    qualifier: char,
    /// Bytes of the buffer already scanned.
    scanned: usize,
    /// Start of the unterminated row (the carry).
    row_start: usize,
    /// Odd number of qualifiers seen in the current row.
    in_quotes: bool,
    /// Physical line of the scan position.
    line: u64,
    /// Physical line on which the current row started.
    row_line: u64,
}

impl RowSplitter {
    /// Creates a splitter positioned at line 1 of an empty buffer.
    pub fn new(qualifier: char) -> Self {
        Self {
            qualifier,
            scanned: 0,
            row_start: 0,
            in_quotes: false,
            line: 1,
            row_line: 1,
        }
    }

    /// Scans the unscanned tail of `buf`, pushing every completed row onto `rows`.
    ///
    /// A carriage return right before an accepted line feed is dropped, and
    /// rows that end up empty (blank lines) are not reported.
    pub fn scan(&mut self, buf: &str, rows: &mut Vec<RowSpan>) {
        let bytes = buf.as_bytes();
        for (offset, c) in buf[self.scanned..].char_indices() {
            let i = self.scanned + offset;
            if c == self.qualifier {
                self.in_quotes = !self.in_quotes;
            } else if c == '\n' {
                if !self.in_quotes {
                    let mut end = i;
                    if end > self.row_start && bytes[end - 1] == b'\r' {
                        end -= 1;
                    }
                    if end > self.row_start {
                        rows.push(RowSpan {
                            start: self.row_start,
                            end,
                            line: self.row_line,
                        });
                    }
                    self.row_start = i + 1;
                    self.row_line = self.line + 1;
                }
                self.line += 1;
            }
        }
        self.scanned = buf.len();
    }

    /// Resolves the carried row once the source is exhausted.
    ///
    /// The carry is terminated as if a line break followed it. If a quoted
    /// span is still open the input is malformed.
    pub fn finish(&mut self, buf: &str) -> Result<Option<RowSpan>> {
        debug_assert_eq!(self.scanned, buf.len(), "finish() called on unscanned input");
        if self.in_quotes {
            return Err(CsvStreamError::format(
                self.row_line,
                "unterminated quoted field",
            ));
        }
        if self.row_start >= buf.len() {
            return Ok(None);
        }
        let span = RowSpan {
            start: self.row_start,
            end: buf.len(),
            line: self.row_line,
        };
        self.row_start = buf.len();
        Ok(Some(span))
    }

    /// Forgets the resolved prefix of the buffer and returns its length.
    ///
    /// The caller must remove exactly that many bytes from the front of its
    /// buffer so the splitter's offsets stay valid.
    pub fn discard_resolved(&mut self) -> usize {
        let resolved = self.row_start;
        self.scanned -= resolved;
        self.row_start = 0;
        resolved
    }

    /// Bytes of the unterminated row currently carried.
    pub fn carry_len(&self) -> usize {
        self.scanned - self.row_start
    }

    /// True while an unmatched qualifier is open in the carried row.
    pub fn in_quotes(&self) -> bool {
        self.in_quotes
    }
}

/// Splits one resolved row into unescaped fields.
///
/// A separator inside an open quoted span is field content. `line` is only
/// used to locate format errors.
pub fn split_fields(row: &str, dialect: &Dialect, trim: bool, line: u64) -> Result<Row> {
    let separator = dialect.separator();
    let qualifier = dialect.qualifier();
    let mut fields = Vec::new();
    let mut in_quotes = false;
    let mut field_start = 0;

    for (i, c) in row.char_indices() {
        if c == qualifier {
            in_quotes = !in_quotes;
        } else if c == separator && !in_quotes {
            fields.push(unescape_field(&row[field_start..i], dialect, trim, line)?);
            field_start = i + c.len_utf8();
        }
    }
    fields.push(unescape_field(&row[field_start..], dialect, trim, line)?);

    Ok(fields)
}

/// Restores a field's literal value.
///
/// Fields without a qualifier come back as they are (trimmed if `trim`).
/// A field with a qualifier must, once surrounding whitespace is trimmed,
/// start and end with the qualifier; the outer pair is removed and every
/// doubled qualifier collapses to one.
pub fn unescape_field(field: &str, dialect: &Dialect, trim: bool, line: u64) -> Result<String> {
    let qualifier = dialect.qualifier();
    if !field.contains(qualifier) {
        let value = if trim { field.trim() } else { field };
        return Ok(value.to_string());
    }

    let trimmed = field.trim();
    let width = qualifier.len_utf8();
    if trimmed.len() < 2 * width || !trimmed.starts_with(qualifier) || !trimmed.ends_with(qualifier)
    {
        return Err(CsvStreamError::format(
            line,
            format!("malformed quoted field {:?}", field),
        ));
    }

    Ok(trimmed[width..trimmed.len() - width]
        .replace(dialect.double_qualifier_str(), dialect.qualifier_str()))
}

/// Decodes a complete, in-memory text into rows.
///
/// Convenience for small inputs; streaming callers drive [`RowSplitter`]
/// through the reader instead.
///
/// # Examples
///
/// ```
/// use csv_stream::csv_handler::{decode_rows, Dialect};
///
/// let rows = decode_rows("a,\"b\nc\",d\r\n\r\ne,f", &Dialect::default()).unwrap();
/// assert_eq!(rows, vec![vec!["a", "b\nc", "d"], vec!["e", "f"]]);
/// ```
pub fn decode_rows(text: &str, dialect: &Dialect) -> Result<Vec<Row>> {
    let mut splitter = RowSplitter::new(dialect.qualifier());
    let mut spans = Vec::new();
    splitter.scan(text, &mut spans);
    spans.extend(splitter.finish(text)?);

    spans
        .iter()
        .map(|span| split_fields(span.text(text), dialect, false, span.line))
        .collect()
}
