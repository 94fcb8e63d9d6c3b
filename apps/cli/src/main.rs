//! sitesmith CLI: runs the plan → data → html → evaluate pipeline.
//!
//! Exit codes: 0 success, 1 unexpected error, 2 configuration error,
//! 3 halted on a missing required artifact, 4 finished with failed stages.

mod commands;

use std::process::ExitCode;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
