use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod report;
mod trace;
use trace::{ScanOptions, info as trace_info, read_trace_as_vec, scan as trace_scan};
use trace::test_roundtrip as trace_test_roundtrip;

/// paulascan command line tools
#[derive(Parser)]
#[command(
    name = env!("CARGO_PKG_NAME"),
    version = env!("CARGO_PKG_VERSION"),
    author = env!("CARGO_PKG_AUTHORS"),
    about = env!("CARGO_PKG_DESCRIPTION"),
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show summary info for a register trace (accepts .pscn or .gz; use '-' for stdin)
    Info {
        /// Input file to read (use '-' for stdin)
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
    /// Replay a trace through the scanner and print the reconstructed song
    Scan {
        /// Input file to read (use '-' for stdin)
        #[arg(value_name = "FILE")]
        file: PathBuf,
        /// JSON file with scan settings; missing fields keep their defaults
        #[arg(long = "config", value_name = "CONFIG")]
        config: Option<PathBuf>,
        /// Stop after this many seconds of audio
        #[arg(long = "max-seconds")]
        max_seconds: Option<u32>,
        /// Stop after this many rows
        #[arg(long = "max-rows")]
        max_rows: Option<usize>,
        /// Number of rows to print (0 prints all)
        #[arg(long = "rows", default_value_t = 64)]
        rows: usize,
        /// Print the full result as JSON instead of tables
        #[arg(long = "json")]
        json: bool,
    },
    /// Run parse -> serialize -> re-parse roundtrip test and compare binaries
    Test {
        /// Input file to read (use '-' for stdin)
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Info { file } => {
            let bytes = read_trace_as_vec(&file)?;
            trace_info(&file, bytes)?;
        }
        Commands::Scan {
            file,
            config,
            max_seconds,
            max_rows,
            rows,
            json,
        } => {
            let bytes = read_trace_as_vec(&file)?;
            let options = ScanOptions {
                config,
                max_seconds,
                max_rows,
                rows,
                json,
            };
            trace_scan(&file, bytes, &options)?;
        }
        Commands::Test { file } => {
            let bytes = read_trace_as_vec(&file)?;
            trace_test_roundtrip(&file, bytes)?;
        }
    }

    Ok(())
}
