//! Integration tests for the converter, the inspector and the csv-stream binary

use std::path::Path;
use std::process::Command;
use std::sync::Arc;

use tempfile::tempdir;
use tokio_util::sync::CancellationToken;

use csv_stream::converter::Converter;
use csv_stream::csv_handler::{Dialect, LineTerminator, ReadOptions, WriteOptions};
use csv_stream::error::CsvStreamError;
use csv_stream::inspector::Inspector;

fn tab_separated() -> Arc<Dialect> {
    Arc::new(Dialect::new('\t', '"'))
}

/// Runs the binary and returns (exit code, stdout).
fn run_cli(args: &[&str]) -> (i32, String) {
    let output = Command::new(env!("CARGO_BIN_EXE_csv-stream"))
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to run csv-stream");
    (
        output.status.code().unwrap_or(-1),
        String::from_utf8_lossy(&output.stdout).into_owned(),
    )
}

fn path_str(path: &Path) -> &str {
    path.to_str().expect("temp paths are UTF-8")
}

#[tokio::test]
async fn test_convert_tsv_to_csv_matches_csv_crate() {
    let dir = tempdir().expect("Failed to create temp dir");
    let input = dir.path().join("in.tsv");
    let output = dir.path().join("out.csv");
    std::fs::write(
        &input,
        "id\ttitle\tnote\n1\tHello, world\t\"tab\there\"\n2\t\"says \"\"hi\"\"\"\t\n3\tplain\t\"two\nlines\"\n",
    )
    .unwrap();

    let converter = Converter::new(tab_separated(), Dialect::rfc4180())
        .read_options(ReadOptions::default().chunk_buffer_length(8).batch_size(2))
        .write_options(WriteOptions::default().line_terminator(LineTerminator::Crlf));
    let stats = converter
        .convert(&input, &output, &CancellationToken::new())
        .await
        .expect("Conversion failed");

    assert_eq!(stats.rows_read, 3);
    assert_eq!(stats.rows_written, 3);
    assert_eq!(stats.batches, 2);
    assert!(stats.header_written);

    let mut oracle = csv::Reader::from_path(&output).expect("Failed to open output");
    assert_eq!(
        oracle.headers().unwrap().iter().collect::<Vec<_>>(),
        vec!["id", "title", "note"]
    );
    let rows: Vec<Vec<String>> = oracle
        .records()
        .map(|r| r.unwrap().iter().map(String::from).collect())
        .collect();
    assert_eq!(
        rows,
        vec![
            vec!["1", "Hello, world", "tab\there"],
            vec!["2", "says \"hi\"", ""],
            vec!["3", "plain", "two\nlines"],
        ]
    );
}

#[tokio::test]
async fn test_convert_then_inspect() {
    let dir = tempdir().expect("Failed to create temp dir");
    let input = dir.path().join("in.csv");
    let output = dir.path().join("out.csv");

    let mut content = String::from("a,b,c\n");
    for i in 0..5_000 {
        if i % 1_000 == 999 {
            content.push_str(&format!("{},ragged\n", i));
        } else {
            content.push_str(&format!("{},\"x;{}\",z\n", i, i));
        }
    }
    std::fs::write(&input, &content).unwrap();

    let semicolon = Arc::new(Dialect::new(';', '\''));
    Converter::new(Dialect::rfc4180(), semicolon.clone())
        .read_options(ReadOptions::default().chunk_buffer_length(512))
        .write_options(WriteOptions::default().line_terminator(LineTerminator::Lf))
        .convert(&input, &output, &CancellationToken::new())
        .await
        .expect("Conversion failed");

    let converted = std::fs::read_to_string(&output).unwrap();
    assert!(converted.starts_with("a;b;c\n0;'x;0';z\n"));

    let report = Inspector::new(semicolon, ReadOptions::default())
        .inspect(&output, &CancellationToken::new())
        .await
        .expect("Inspection failed");
    assert_eq!(report.columns, vec!["a", "b", "c"]);
    assert_eq!(report.rows, 5_000);
    assert_eq!(report.ragged_rows, 5);
    assert_eq!(report.first_ragged_row, Some(1_000));
    assert_eq!(report.bytes, converted.len() as u64);
}

#[tokio::test]
async fn test_cancelled_conversion() {
    let dir = tempdir().expect("Failed to create temp dir");
    let input = dir.path().join("in.csv");
    let output = dir.path().join("out.csv");
    std::fs::write(&input, "a\n1\n2\n").unwrap();

    let cancel = CancellationToken::new();
    cancel.cancel();
    let err = Converter::new(Dialect::rfc4180(), tab_separated())
        .convert(&input, &output, &cancel)
        .await
        .unwrap_err();
    assert!(err.is_cancelled());
}

#[tokio::test]
async fn test_convert_to_legacy_encoding_stops_at_unmappable_character() {
    let dir = tempdir().expect("Failed to create temp dir");
    let input = dir.path().join("in.csv");
    let output = dir.path().join("out.csv");
    std::fs::write(&input, "name,city\nZoë,Besançon\nHaruki,東京\n").unwrap();

    let err = Converter::new(Dialect::rfc4180(), Arc::new(Dialect::new(';', '"')))
        .write_options(
            WriteOptions::default()
                .encoding(encoding_rs::WINDOWS_1252)
                .line_terminator(LineTerminator::Lf),
        )
        .convert(&input, &output, &CancellationToken::new())
        .await
        .unwrap_err();

    // Header and first data row are rows 1 and 2 of the output.
    assert!(matches!(
        err,
        CsvStreamError::Unencodable {
            row: 3,
            character: '東',
            ..
        }
    ));
}

#[test]
fn test_cli_inspect_json() {
    let dir = tempdir().expect("Failed to create temp dir");
    let input = dir.path().join("data.csv");
    std::fs::write(&input, "id,name\n1,Ann\n2,Bo\n3\n").unwrap();

    let (code, stdout) = run_cli(&["--mode", "inspect", "--file", path_str(&input), "--json"]);
    assert_eq!(code, 0);

    let report: serde_json::Value = serde_json::from_str(&stdout).expect("stdout is JSON");
    assert_eq!(report["columns"], serde_json::json!(["id", "name"]));
    assert_eq!(report["rows"], 3);
    assert_eq!(report["ragged_rows"], 1);
}

#[test]
fn test_cli_convert() {
    let dir = tempdir().expect("Failed to create temp dir");
    let input = dir.path().join("data.csv");
    let output = dir.path().join("data.psv");
    std::fs::write(&input, "k,v\n1,\"a|b\"\n").unwrap();

    let (code, stdout) = run_cli(&[
        "--mode",
        "convert",
        "--file",
        path_str(&input),
        "--output",
        path_str(&output),
        "--out-separator",
        "|",
        "--line-ending",
        "lf",
    ]);
    assert_eq!(code, 0);
    assert!(stdout.contains("CSV Conversion Report"));
    assert_eq!(std::fs::read_to_string(&output).unwrap(), "k|v\n1|\"a|b\"\n");
}

#[test]
fn test_cli_exit_codes() {
    let dir = tempdir().expect("Failed to create temp dir");
    let malformed = dir.path().join("bad.csv");
    std::fs::write(&malformed, "a,b\n1,\"open\n").unwrap();
    let missing = dir.path().join("missing.csv");

    // Argument error: convert without --output
    let (code, _) = run_cli(&["--mode", "convert", "--file", path_str(&malformed)]);
    assert_eq!(code, 1);

    // Malformed input
    let (code, _) = run_cli(&["--mode", "inspect", "--file", path_str(&malformed)]);
    assert_eq!(code, 2);

    // Missing input file
    let (code, _) = run_cli(&["--mode", "inspect", "--file", path_str(&missing)]);
    assert_eq!(code, 3);
}

#[test]
fn test_cli_output_encoding_errors() {
    let dir = tempdir().expect("Failed to create temp dir");
    let input = dir.path().join("data.csv");
    let output = dir.path().join("out.csv");
    std::fs::write(&input, "k,v\n1,日本\n").unwrap();

    // UTF-16 can be read but not written
    let (code, _) = run_cli(&[
        "--mode",
        "convert",
        "--file",
        path_str(&input),
        "--output",
        path_str(&output),
        "--out-encoding",
        "utf-16le",
    ]);
    assert_eq!(code, 1);

    // Characters windows-1252 has no byte for
    let (code, _) = run_cli(&[
        "--mode",
        "convert",
        "--file",
        path_str(&input),
        "--output",
        path_str(&output),
        "--out-encoding",
        "windows-1252",
    ]);
    assert_eq!(code, 2);
}
