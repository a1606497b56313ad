//! packfs binary entry point.
//!
//! Parses arguments, initializes logging on stderr and runs the selected
//! subcommand against stdout. See the `packfs_cli` crate for the commands.

use anyhow::Result;
use clap::Parser;
use packfs_cli::{Cli, run};

fn main() -> Result<()> {
    // Logs go to stderr so `cat` output stays clean
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    tracing::debug!("Running {:?}", cli.command);

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    run(cli, &mut out)
}
