//! tabula binary: a line-oriented REPL over a single-table database file.
//!
//! # Usage
//!
//! ```bash
//! tabula mydb.db
//!
//! # smaller fan-out for taller trees, and a tighter page limit
//! tabula mydb.db --internal-max-keys 3 --max-pages 400
//!
//! # storage logs go to stderr
//! RUST_LOG=tabula_storage=debug tabula mydb.db
//! ```

use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tabula_storage::TableConfig;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, Parser)]
#[command(name = "tabula", version, about = "Single-table B+tree database REPL")]
struct Cli {
    /// Database file, created if it does not exist.
    db_file: PathBuf,

    /// Maximum number of pages the file may grow to, header page included.
    #[arg(long, default_value_t = tabula_storage::TABLE_MAX_PAGES)]
    max_pages: u32,

    /// Keys an internal node holds before it splits.
    #[arg(long, default_value_t = tabula_storage::node::INTERNAL_NODE_MAX_KEYS)]
    internal_max_keys: usize,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging();

    let config = TableConfig {
        max_pages: cli.max_pages,
        internal_max_keys: cli.internal_max_keys,
    };

    let stdin = io::stdin();
    match tabula::run(&cli.db_file, config, stdin.lock(), io::stdout()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %err, db_file = %cli.db_file.display(), "session failed");
            eprintln!("Error: {err}");
            ExitCode::FAILURE
        }
    }
}

/// Logs go to stderr so the transcript on stdout stays clean.
fn init_logging() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_writer(io::stderr))
        .init();
}
