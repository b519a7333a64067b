//! Field and row escaping.
//!
//! Pure functions that turn fields into delimited text. A field is wrapped
//! in qualifiers only when it has to be: when it contains the separator,
//! the qualifier, a carriage return or a line feed. Inside a wrapped field
//! every qualifier is doubled.

use std::borrow::Cow;

use super::dialect::Dialect;

/// Returns true when `field` must be wrapped in qualifiers.
///
/// # Examples
///
/// ```
/// use csv_stream::csv_handler::{needs_qualifying, Dialect};
///
/// let dialect = Dialect::default();
/// assert!(!needs_qualifying("hello", &dialect));
/// assert!(needs_qualifying("he,llo", &dialect));
/// assert!(needs_qualifying("he\"llo", &dialect));
/// assert!(needs_qualifying("line1\nline2", &dialect));
/// ```
#[must_use]
pub fn needs_qualifying(field: &str, dialect: &Dialect) -> bool {
    let separator = dialect.separator();
    let qualifier = dialect.qualifier();
    field
        .chars()
        .any(|c| c == separator || c == qualifier || c == '\r' || c == '\n')
}

/// Escapes a single field.
///
/// Fields that need no quoting are returned borrowed.
///
/// # Examples
///
/// ```
/// use csv_stream::csv_handler::{escape_field, Dialect};
///
/// let dialect = Dialect::default();
/// assert_eq!(escape_field("hello", &dialect), "hello");
/// assert_eq!(escape_field("he,llo", &dialect), "\"he,llo\"");
/// assert_eq!(escape_field("he\"llo", &dialect), "\"he\"\"llo\"");
/// assert_eq!(escape_field("", &dialect), "");
/// ```
#[must_use]
pub fn escape_field<'a>(field: &'a str, dialect: &Dialect) -> Cow<'a, str> {
    if field.is_empty() || !needs_qualifying(field, dialect) {
        return Cow::Borrowed(field);
    }

    let mut escaped = String::with_capacity(field.len() + 2);
    push_qualified(field, dialect, &mut escaped);
    Cow::Owned(escaped)
}

/// Appends `field`, wrapped and with its qualifiers doubled, to `out`.
fn push_qualified(field: &str, dialect: &Dialect, out: &mut String) {
    out.push_str(dialect.qualifier_str());
    out.push_str(&field.replace(dialect.qualifier_str(), dialect.double_qualifier_str()));
    out.push_str(dialect.qualifier_str());
}

/// Appends the escaped form of `row` to `out`, without a line terminator.
///
/// `out` is not cleared, so a writer can reuse one buffer for every row.
/// A row made of one empty field is written as an empty qualified field so
/// it does not read back as a blank line (blank lines are skipped on read).
pub fn encode_row_into<S: AsRef<str>>(row: &[S], dialect: &Dialect, out: &mut String) {
    if let [only] = row {
        if only.as_ref().is_empty() {
            out.push_str(dialect.double_qualifier_str());
            return;
        }
    }

    for (i, field) in row.iter().enumerate() {
        if i > 0 {
            out.push(dialect.separator());
        }
        let field = field.as_ref();
        if needs_qualifying(field, dialect) {
            push_qualified(field, dialect, out);
        } else {
            out.push_str(field);
        }
    }
}

/// Escapes `row` into a freshly allocated line, without a line terminator.
///
/// # Examples
///
/// ```
/// use csv_stream::csv_handler::{encode_row, Dialect};
///
/// let dialect = Dialect::default();
/// assert_eq!(encode_row(&["a", "b,c", ""], &dialect), "a,\"b,c\",");
/// ```
#[must_use]
pub fn encode_row<S: AsRef<str>>(row: &[S], dialect: &Dialect) -> String {
    let mut line = String::with_capacity(row.iter().map(|f| f.as_ref().len() + 1).sum());
    encode_row_into(row, dialect, &mut line);
    line
}
