//! CLI argument parsing module
//!
//! Handles command-line argument parsing using `clap` derive macros.
//! This module defines the `Mode` enum for operation modes and the `Args` struct
//! containing all CLI arguments with validation logic.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use encoding_rs::Encoding;

use crate::csv_handler::{Dialect, LineTerminator, ReadOptions, WriteOptions};

/// Operation mode for csv-stream.
///
/// - **Inspect**: Stream a file and report its columns and row counts
/// - **Convert**: Re-encode a file into another dialect or text encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Mode {
    /// Report columns, row count and ragged rows
    Inspect,
    /// Convert a file to another dialect
    Convert,
}

/// Line ending used for converted output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LineEnding {
    /// Platform default (CRLF on Windows, LF elsewhere)
    Host,
    Crlf,
    Lf,
}

impl From<LineEnding> for LineTerminator {
    fn from(ending: LineEnding) -> Self {
        match ending {
            LineEnding::Host => LineTerminator::host(),
            LineEnding::Crlf => LineTerminator::Crlf,
            LineEnding::Lf => LineTerminator::Lf,
        }
    }
}

/// Command-line arguments for csv-stream.
///
/// Use the `validate()` method after parsing to ensure argument combinations are valid.
///
/// # Example
///
/// ```rust,ignore
/// use clap::Parser;
/// use csv_stream::cli::Args;
///
/// let args = Args::parse();
/// args.validate()?;
/// ```
#[derive(Parser, Debug)]
#[command(name = "csv-stream")]
#[command(about = "Stream, inspect and convert large CSV files")]
#[command(version)]
pub struct Args {
    /// Operation mode: inspect or convert
    #[arg(long, value_enum)]
    pub mode: Mode,

    /// Input CSV file
    #[arg(long)]
    pub file: PathBuf,

    /// Output file path for convert mode
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Field separator of the input
    #[arg(long, default_value = ",")]
    pub separator: char,

    /// Text qualifier of the input
    #[arg(long, default_value = "\"")]
    pub qualifier: char,

    /// Field separator of the output (defaults to --separator)
    #[arg(long)]
    pub out_separator: Option<char>,

    /// Text qualifier of the output (defaults to --qualifier)
    #[arg(long)]
    pub out_qualifier: Option<char>,

    /// Treat the first row as data instead of column names
    #[arg(long, default_value = "false")]
    pub no_header: bool,

    /// Trim whitespace around unquoted fields
    #[arg(long, default_value = "false")]
    pub trim: bool,

    /// Bytes read from the input per chunk
    #[arg(long, default_value = "40960")]
    pub chunk_size: u32,

    /// Rows per progress batch
    #[arg(long, default_value = "1000")]
    pub batch_size: u32,

    /// Text encoding of the input (WHATWG label, e.g. utf-8, windows-1252)
    #[arg(long, default_value = "utf-8")]
    pub encoding: String,

    /// Text encoding of the output (defaults to --encoding)
    #[arg(long)]
    pub out_encoding: Option<String>,

    /// Line ending of the output
    #[arg(long, value_enum, default_value = "host")]
    pub line_ending: LineEnding,

    /// Print the inspect report as JSON
    #[arg(long, default_value = "false")]
    pub json: bool,

    /// Enable debug logging
    #[arg(short, long, default_value = "false")]
    pub verbose: bool,
}

impl Args {
    /// Validate argument combinations.
    ///
    /// - Separator and qualifier must differ and must not be a line break
    /// - `--output` is required for convert mode and must differ from `--file`
    /// - Chunk and batch sizes must be non-zero
    /// - Encoding labels must be known to `encoding_rs`, and the output
    ///   encoding must be one it can write
    pub fn validate(&self) -> Result<(), String> {
        check_dialect("input", self.separator, self.qualifier)?;
        check_dialect("output", self.output_separator(), self.output_qualifier())?;

        if self.chunk_size == 0 {
            return Err("--chunk-size must be greater than 0".to_string());
        }
        if self.batch_size == 0 {
            return Err("--batch-size must be greater than 0".to_string());
        }

        if Encoding::for_label(self.encoding.as_bytes()).is_none() {
            return Err(format!("Unknown encoding: {}", self.encoding));
        }
        if let Some(label) = &self.out_encoding {
            match Encoding::for_label(label.as_bytes()) {
                None => return Err(format!("Unknown output encoding: {}", label)),
                Some(encoding) if encoding.output_encoding() != encoding => {
                    return Err(format!(
                        "Output encoding {} can be read but not written",
                        encoding.name()
                    ));
                }
                Some(_) => {}
            }
        }

        match self.mode {
            Mode::Inspect => {
                if self.output.is_some() {
                    return Err("--output cannot be used with inspect mode".to_string());
                }
            }
            Mode::Convert => {
                let output = match &self.output {
                    Some(output) => output,
                    None => return Err("--output is required for convert mode".to_string()),
                };
                if output == &self.file {
                    return Err("--output must differ from --file".to_string());
                }
                if self.json {
                    return Err("--json is only supported in inspect mode".to_string());
                }
            }
        }

        Ok(())
    }

    pub fn output_separator(&self) -> char {
        self.out_separator.unwrap_or(self.separator)
    }

    pub fn output_qualifier(&self) -> char {
        self.out_qualifier.unwrap_or(self.qualifier)
    }

    pub fn input_dialect(&self) -> Arc<Dialect> {
        Arc::new(Dialect::new(self.separator, self.qualifier))
    }

    pub fn output_dialect(&self) -> Arc<Dialect> {
        Arc::new(Dialect::new(self.output_separator(), self.output_qualifier()))
    }

    /// Input encoding, UTF-8 if the label is unknown.
    pub fn input_encoding(&self) -> &'static Encoding {
        Encoding::for_label(self.encoding.as_bytes()).unwrap_or(encoding_rs::UTF_8)
    }

    /// Output encoding, falling back to the input encoding. An input
    /// encoding that cannot be written (UTF-16) falls back to UTF-8.
    pub fn output_encoding(&self) -> &'static Encoding {
        self.out_encoding
            .as_ref()
            .and_then(|label| Encoding::for_label(label.as_bytes()))
            .unwrap_or_else(|| self.input_encoding().output_encoding())
    }

    pub fn read_options(&self) -> ReadOptions {
        ReadOptions::default()
            .first_row_is_header(!self.no_header)
            .chunk_buffer_length(self.chunk_size)
            .batch_size(self.batch_size)
            .trim_fields(self.trim)
            .encoding(self.input_encoding())
    }

    pub fn write_options(&self) -> WriteOptions {
        WriteOptions::default()
            .batch_size(self.batch_size)
            .line_terminator(self.line_ending.into())
            .encoding(self.output_encoding())
    }
}

fn check_dialect(side: &str, separator: char, qualifier: char) -> Result<(), String> {
    if separator == qualifier {
        return Err(format!(
            "Invalid {} dialect: separator and qualifier are both {:?}",
            side, separator
        ));
    }
    for c in [separator, qualifier] {
        if c == '\r' || c == '\n' {
            return Err(format!(
                "Invalid {} dialect: {:?} cannot be used as separator or qualifier",
                side, c
            ));
        }
    }
    Ok(())
}
