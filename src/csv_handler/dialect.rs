//! Field separator and qualifier pair.
//!
//! A [`Dialect`] is shared by reference (through an `Arc`) between every
//! reader and writer that speaks the same flavour of delimited text. The
//! qualifier string and its doubled form are computed once here so the
//! per-field escape and unescape paths never allocate them.

use std::fmt;
use std::sync::{Arc, OnceLock};

/// RFC 4180 field separator.
pub const RFC4180_SEPARATOR: char = ',';

/// RFC 4180 field qualifier.
pub const RFC4180_QUALIFIER: char = '"';

/// Separator and qualifier characters plus their precomputed string forms.
///
/// Construction never fails. The two characters should differ: with a
/// dialect whose separator equals its qualifier, every separator reads as
/// a quote, so written output does not read back as the same rows. The
/// command line rejects such a pair before building a dialect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dialect {
    separator: char,
    qualifier: char,
    qualifier_str: String,
    double_qualifier_str: String,
}

impl Dialect {
    /// Creates a dialect from a separator and a qualifier.
    pub fn new(separator: char, qualifier: char) -> Self {
        Self {
            separator,
            qualifier,
            qualifier_str: qualifier.to_string(),
            double_qualifier_str: [qualifier, qualifier].iter().collect(),
        }
    }

    /// The shared RFC 4180 dialect (`,` separator, `"` qualifier).
    pub fn rfc4180() -> Arc<Dialect> {
        static RFC4180: OnceLock<Arc<Dialect>> = OnceLock::new();
        RFC4180
            .get_or_init(|| Arc::new(Dialect::new(RFC4180_SEPARATOR, RFC4180_QUALIFIER)))
            .clone()
    }

    /// Field delimiter.
    pub fn separator(&self) -> char {
        self.separator
    }

    /// Quoting character.
    pub fn qualifier(&self) -> char {
        self.qualifier
    }

    /// The qualifier as a one-character string.
    pub fn qualifier_str(&self) -> &str {
        &self.qualifier_str
    }

    /// Two qualifiers back to back, the escaped form of a literal qualifier.
    pub fn double_qualifier_str(&self) -> &str {
        &self.double_qualifier_str
    }
}

impl Default for Dialect {
    fn default() -> Self {
        Dialect::new(RFC4180_SEPARATOR, RFC4180_QUALIFIER)
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "separator {:?}, qualifier {:?}",
            self.separator, self.qualifier
        )
    }
}
