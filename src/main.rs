mod errors;
mod repl;
mod storage;

use clap::Parser;
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(name = "marbledb", version = VERSION, about = "A tiny persistent B+tree table.")]
struct Cli {
    /// Path to the database file. Created if it doesn't exist.
    database: PathBuf,

    /// Where to write logs.
    #[arg(long, env = "MARBLEDB_LOG_FILE", default_value = "marbledb.log")]
    log_file: PathBuf,

    /// Default tracing filter, overridden by RUST_LOG if set.
    #[arg(long, env = "MARBLEDB_LOG_LEVEL", default_value = "info")]
    log_level: String,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let file = OpenOptions::new()
        .append(true)
        .create(true)
        .open(&cli.log_file)
        .expect("Failed to open log file");

    tracing_subscriber::fmt()
        .with_writer(file)
        .with_ansi(false)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level)),
        )
        .init();

    match repl::run(&cli.database) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e}");
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}
