//! csv-stream - Stream, inspect and convert large CSV files
//!
//! This CLI tool provides two operational modes:
//! - **Inspect**: Stream a file and report its columns, row count and ragged rows
//! - **Convert**: Re-encode a file into another separator, qualifier or text encoding
//!
//! # Exit Codes
//!
//! | Code | Meaning |
//! |------|---------|
//! | 0 | Success |
//! | 1 | Configuration/argument error |
//! | 2 | Malformed CSV input |
//! | 3 | File I/O error |
//! | 4 | Cancelled (Ctrl+C / SIGTERM) |

use std::process::ExitCode;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use csv_stream::cli::{Args, Mode};
use csv_stream::converter::Converter;
use csv_stream::error::CsvStreamError;
use csv_stream::inspector::Inspector;

/// Exit code for success
const EXIT_SUCCESS: u8 = 0;
/// Exit code for configuration/argument errors
const EXIT_CONFIG_ERROR: u8 = 1;
/// Exit code for malformed CSV input or text the output encoding cannot hold
const EXIT_FORMAT_ERROR: u8 = 2;
/// Exit code for file I/O errors
const EXIT_IO_ERROR: u8 = 3;
/// Exit code for a cancelled run
const EXIT_CANCELLED: u8 = 4;

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(args.verbose);

    if let Err(e) = args.validate() {
        eprintln!("Error: Configuration error: {}", e);
        eprintln!("  Hint: Use --help for usage information");
        return ExitCode::from(EXIT_CONFIG_ERROR);
    }

    match run(args).await {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::from(error_to_exit_code(&e))
        }
    }
}

/// Installs the stderr log subscriber.
///
/// `--verbose` forces debug output; otherwise `RUST_LOG` applies, defaulting to `info`.
fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Main application logic.
///
/// Wires Ctrl+C and SIGTERM to a cancellation token, then dispatches to the
/// selected mode.
async fn run(args: Args) -> Result<(), CsvStreamError> {
    let cancel = CancellationToken::new();

    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if let Err(e) = wait_for_shutdown_signal().await {
            eprintln!("Error setting up signal handler: {}", e);
            return;
        }
        signal_cancel.cancel();
    });

    match args.mode {
        Mode::Inspect => run_inspect_mode(&args, &cancel).await,
        Mode::Convert => run_convert_mode(&args, &cancel).await,
    }
}

/// Wait for SIGINT (Ctrl+C) or SIGTERM signals.
async fn wait_for_shutdown_signal() -> Result<(), CsvStreamError> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigint = signal(SignalKind::interrupt())?;
        let mut sigterm = signal(SignalKind::terminate())?;

        tokio::select! {
            _ = sigint.recv() => {
                warn!("Received SIGINT (Ctrl+C), cancelling");
            }
            _ = sigterm.recv() => {
                warn!("Received SIGTERM, cancelling");
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        warn!("Received Ctrl+C, cancelling");
    }

    Ok(())
}

/// Run in inspect mode.
///
/// Prints the report as text, or as JSON with `--json`.
async fn run_inspect_mode(args: &Args, cancel: &CancellationToken) -> Result<(), CsvStreamError> {
    info!(file = %args.file.display(), "Inspecting");

    let inspector = Inspector::new(args.input_dialect(), args.read_options());
    let report = inspector.inspect(&args.file, cancel).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", report);
    }

    if !report.is_consistent() {
        warn!(
            ragged = report.ragged_rows,
            "Some rows do not match the header's field count"
        );
    }
    Ok(())
}

/// Run in convert mode.
async fn run_convert_mode(args: &Args, cancel: &CancellationToken) -> Result<(), CsvStreamError> {
    let output = args
        .output
        .as_ref()
        .ok_or_else(|| CsvStreamError::InvalidArgument("--output is required".to_string()))?;

    info!(
        input = %args.file.display(),
        output = %output.display(),
        "Converting"
    );

    let converter = Converter::new(args.input_dialect(), args.output_dialect())
        .read_options(args.read_options())
        .write_options(args.write_options());
    let stats = converter.convert(&args.file, output, cancel).await?;

    println!("{}", stats);
    Ok(())
}

/// Map an error to the process exit code.
fn error_to_exit_code(error: &CsvStreamError) -> u8 {
    match error {
        CsvStreamError::InvalidArgument(_) => EXIT_CONFIG_ERROR,
        CsvStreamError::Usage(_) => EXIT_CONFIG_ERROR,
        CsvStreamError::Format { .. } => EXIT_FORMAT_ERROR,
        CsvStreamError::Unencodable { .. } => EXIT_FORMAT_ERROR,
        CsvStreamError::Io(_) => EXIT_IO_ERROR,
        CsvStreamError::Json(_) => EXIT_IO_ERROR,
        CsvStreamError::Cancelled => EXIT_CANCELLED,
    }
}
