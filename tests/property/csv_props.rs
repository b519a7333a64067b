//! Property-based tests for CSV encoding and decoding
//!
//! Rows are drawn from an alphabet that is dense in separators, qualifiers,
//! carriage returns and line feeds, written with `CsvWriter`, and read back
//! with `CsvReader`. The `csv` crate serves as an independent RFC 4180
//! implementation to check both directions against.

use std::sync::Arc;

use proptest::prelude::*;
use tokio_util::sync::CancellationToken;

use csv_stream::csv_handler::{
    escape_field, needs_qualifying, unescape_field, CsvReader, CsvWriter, Dialect, LineTerminator,
    ReadOptions, Row, WriteOptions,
};

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("Failed to build runtime")
}

/// Strategy for field values built from CSV-significant characters
fn field_strategy(alphabet: Vec<char>) -> impl Strategy<Value = String> {
    prop::collection::vec(prop::sample::select(alphabet), 0..8)
        .prop_map(|chars| chars.into_iter().collect())
}

fn rfc_alphabet() -> Vec<char> {
    vec!['a', 'Z', '7', ' ', ',', '"', '\r', '\n', 'é', '€']
}

/// Strategy for a table whose rows all have the same field count
fn table_strategy(alphabet: Vec<char>, min_cols: usize) -> impl Strategy<Value = Vec<Row>> {
    (min_cols..5usize).prop_flat_map(move |cols| {
        prop::collection::vec(
            prop::collection::vec(field_strategy(alphabet.clone()), cols),
            1..20,
        )
    })
}

fn terminator_strategy() -> impl Strategy<Value = LineTerminator> {
    prop_oneof![Just(LineTerminator::Crlf), Just(LineTerminator::Lf)]
}

async fn write_table(rows: &[Row], dialect: Arc<Dialect>, terminator: LineTerminator) -> Vec<u8> {
    let mut out = Vec::new();
    let mut writer = CsvWriter::new(
        &mut out,
        dialect,
        WriteOptions::default().line_terminator(terminator),
        CancellationToken::new(),
    )
    .expect("Failed to create writer");
    writer.write_rows(rows).await.expect("Failed to write rows");
    writer.close().await.expect("Failed to close writer");
    out
}

async fn read_table(bytes: &[u8], dialect: Arc<Dialect>, chunk: u32) -> Vec<Row> {
    let options = ReadOptions::default()
        .first_row_is_header(false)
        .chunk_buffer_length(chunk);
    let mut reader = CsvReader::new(bytes, dialect, options);
    let mut rows = Vec::new();
    reader
        .read(|row| row, |batch| rows.extend(batch.rows), &CancellationToken::new())
        .await
        .expect("Failed to read rows");
    rows
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    // Whatever the field contents, a written table reads back unchanged.
    #[test]
    fn property_written_rows_read_back_unchanged(
        rows in table_strategy(rfc_alphabet(), 1),
        terminator in terminator_strategy(),
        chunk in 1u32..64,
    ) {
        let rt = runtime();
        let bytes = rt.block_on(write_table(&rows, Dialect::rfc4180(), terminator));
        let decoded = rt.block_on(read_table(&bytes, Dialect::rfc4180(), chunk));
        prop_assert_eq!(decoded, rows);
    }

    // Same for a non-default separator and qualifier, with the RFC 4180
    // characters now ordinary content.
    #[test]
    fn property_custom_dialect_roundtrip(
        rows in table_strategy(vec!['x', ';', '\'', ',', '"', '\n', '\r', ' '], 1),
        terminator in terminator_strategy(),
    ) {
        let dialect = Arc::new(Dialect::new(';', '\''));
        let rt = runtime();
        let bytes = rt.block_on(write_table(&rows, dialect.clone(), terminator));
        let decoded = rt.block_on(read_table(&bytes, dialect, 7));
        prop_assert_eq!(decoded, rows);
    }

    // Fields are qualified exactly when they contain a separator, a
    // qualifier, CR or LF, and unescaping restores the original.
    #[test]
    fn property_escaping_rules(field in field_strategy(rfc_alphabet())) {
        let dialect = Dialect::default();
        let special = field.contains(',') || field.contains('"')
            || field.contains('\r') || field.contains('\n');
        prop_assert_eq!(needs_qualifying(&field, &dialect), special);

        let escaped = escape_field(&field, &dialect);
        if special {
            prop_assert!(escaped.starts_with('"') && escaped.ends_with('"'));
            let inner = &escaped[1..escaped.len() - 1];
            prop_assert_eq!(inner.matches('"').count(), 2 * field.matches('"').count());
        } else {
            prop_assert_eq!(escaped.as_ref(), field.as_str());
        }

        let restored = unescape_field(&escaped, &dialect, false, 1)
            .expect("escaped field should unescape");
        prop_assert_eq!(restored, field);
    }

    // An independent RFC 4180 parser agrees with what CsvWriter produced.
    #[test]
    fn property_oracle_parses_written_output(
        rows in table_strategy(rfc_alphabet(), 1),
        terminator in terminator_strategy(),
    ) {
        let bytes = runtime().block_on(write_table(&rows, Dialect::rfc4180(), terminator));

        let mut oracle = csv::ReaderBuilder::new()
            .has_headers(false)
            .from_reader(bytes.as_slice());
        let parsed: Vec<Row> = oracle
            .records()
            .map(|r| r.expect("oracle rejected output").iter().map(String::from).collect())
            .collect();
        prop_assert_eq!(parsed, rows);
    }

    // CsvReader agrees with what an independent RFC 4180 writer produced.
    #[test]
    fn property_reads_oracle_output(
        rows in table_strategy(rfc_alphabet(), 2),
        chunk in 1u32..32,
    ) {
        let mut oracle = csv::WriterBuilder::new()
            .terminator(csv::Terminator::CRLF)
            .from_writer(Vec::new());
        for row in &rows {
            oracle.write_record(row).expect("oracle write failed");
        }
        let bytes = oracle.into_inner().expect("oracle flush failed");

        let decoded = runtime().block_on(read_table(&bytes, Dialect::rfc4180(), chunk));
        prop_assert_eq!(decoded, rows);
    }
}

#[test]
fn test_single_empty_field_survives_roundtrip() {
    let rows: Vec<Row> = vec![vec![String::new()], vec!["x".to_string()], vec![String::new()]];
    let rt = runtime();
    let bytes = rt.block_on(write_table(&rows, Dialect::rfc4180(), LineTerminator::Lf));
    assert_eq!(bytes, b"\"\"\nx\n\"\"\n");
    assert_eq!(rt.block_on(read_table(&bytes, Dialect::rfc4180(), 2)), rows);
}
