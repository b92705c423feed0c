//! apigrade - API description grading CLI
//!
//! Grades OpenAPI documents against a weighted rule catalog, gated by
//! prerequisites, and reports a score with a letter grade.

use anyhow::Result;
use apigrade::cli::{self, Cli};
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins over --log-level
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    cli::run(cli)
}
