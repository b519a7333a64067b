//! Property-based tests for chunked reading
//!
//! The rows a reader produces must not depend on where chunk boundaries
//! fall: not inside quoted spans, not between CR and LF, not inside a
//! multi-byte character. Batch bookkeeping must hold for any batch size.

use proptest::prelude::*;
use tokio_util::sync::CancellationToken;

use csv_stream::csv_handler::{decode_rows, CsvReader, Dialect, ReadBatch, ReadOptions, Row};

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("Failed to build runtime")
}

/// Strategy for well-formed CSV text: quoted and unquoted fields, CRLF and
/// LF terminators, blank lines and an optional final line break.
fn csv_text_strategy() -> impl Strategy<Value = String> {
    let unquoted = "[a-z0-9 é€]{0,6}";
    let quoted = "[a-z,\r\n\"é€ ]{0,6}".prop_map(|s| format!("\"{}\"", s.replace('"', "\"\"")));
    let field = prop_oneof![unquoted.prop_map(|s| s), quoted];
    let row = prop::collection::vec(field, 1..4).prop_map(|fields| fields.join(","));
    let terminator = prop_oneof![Just("\n"), Just("\r\n"), Just("\n\n")];

    (
        prop::collection::vec((row, terminator), 1..15),
        any::<bool>(),
    )
        .prop_map(|(rows, trailing)| {
            let mut text = String::new();
            let count = rows.len();
            for (i, (row, terminator)) in rows.into_iter().enumerate() {
                text.push_str(&row);
                if trailing || i + 1 < count {
                    text.push_str(terminator);
                }
            }
            text
        })
}

async fn read_batches(
    bytes: &[u8],
    chunk: u32,
    batch_size: u32,
) -> (Vec<ReadBatch<Row>>, Vec<String>) {
    let options = ReadOptions::default()
        .first_row_is_header(false)
        .chunk_buffer_length(chunk)
        .batch_size(batch_size);
    let mut reader =
        CsvReader::new(bytes, Dialect::rfc4180(), options).with_total_bytes(bytes.len() as u64);
    let mut batches = Vec::new();
    reader
        .read(|row| row, |batch| batches.push(batch), &CancellationToken::new())
        .await
        .expect("Failed to read rows");
    (batches, reader.column_names().to_vec())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    // Streaming with any chunk length yields the rows of a one-shot decode.
    #[test]
    fn property_rows_independent_of_chunk_length(
        text in csv_text_strategy(),
        chunk in 1u32..48,
    ) {
        let expected = decode_rows(&text, &Dialect::default()).expect("text is well formed");
        let (batches, _) = runtime().block_on(read_batches(text.as_bytes(), chunk, 1000));
        let rows: Vec<Row> = batches.into_iter().flat_map(|b| b.rows).collect();
        prop_assert_eq!(rows, expected);
    }

    // Every batch is full except possibly the last, exactly one batch is
    // complete, and byte progress only moves forward.
    #[test]
    fn property_batch_bookkeeping(
        text in csv_text_strategy(),
        chunk in 1u32..48,
        batch_size in 1u32..6,
    ) {
        let total = decode_rows(&text, &Dialect::default()).expect("text is well formed").len();
        let (batches, columns) =
            runtime().block_on(read_batches(text.as_bytes(), chunk, batch_size));

        let expected_batches = total.div_ceil(batch_size as usize);
        prop_assert_eq!(batches.len(), expected_batches);
        prop_assert_eq!(batches.iter().filter(|b| b.is_complete).count(), usize::from(total > 0));

        for (i, batch) in batches.iter().enumerate() {
            let last = i + 1 == batches.len();
            prop_assert_eq!(batch.is_complete, last);
            if !last {
                prop_assert_eq!(batch.rows.len(), batch_size as usize);
            }
            prop_assert_eq!(&batch.column_names, &columns);
            prop_assert_eq!(batch.total_bytes, text.len() as u64);
        }

        let progress: Vec<u64> = batches.iter().map(|b| b.bytes_read_so_far).collect();
        prop_assert!(progress.windows(2).all(|w| w[0] <= w[1]));
        if let Some(last) = batches.last() {
            prop_assert_eq!(last.bytes_read_so_far, text.len() as u64);
        }
    }

    // A chunk boundary inside a multi-byte UTF-8 character is carried over
    // to the next chunk.
    #[test]
    fn property_multibyte_split_is_invisible(
        words in prop::collection::vec("[a-zé€ü]{1,5}", 1..10),
        chunk in 1u32..9,
    ) {
        let text = format!("{}\n", words.join(","));
        let (batches, _) = runtime().block_on(read_batches(text.as_bytes(), chunk, 1000));
        let rows: Vec<Row> = batches.into_iter().flat_map(|b| b.rows).collect();
        prop_assert_eq!(rows, vec![words]);
    }
}
