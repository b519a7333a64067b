//! csv-stream library
//!
//! Streaming CSV reading and writing over tokio byte streams. Large files
//! are decoded chunk by chunk and delivered to the caller in batches of
//! mapped rows; rows are written one at a time with RFC 4180 escaping.
//!
//! The [`csv_handler`] module holds the codec. [`converter`] and
//! [`inspector`] are file-level drivers built on it, used by the
//! `csv-stream` binary through [`cli`].

pub mod cli;
pub mod converter;
pub mod csv_handler;
pub mod error;
pub mod inspector;
