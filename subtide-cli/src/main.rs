//! Subtide CLI - Command-line interface
//!
//! Provides command-line access to Subtide: the HTTP shell, one-shot
//! extraction runs, and content identifier derivation.

mod commands;

use clap::Parser;
use subtide_core::tracing_setup::{CliLogLevel, init_tracing};

#[derive(Parser)]
#[command(name = "subtide")]
#[command(about = "Subtitle extraction with content-addressed artifacts")]
struct Cli {
    /// Console log level
    #[arg(long, value_enum, default_value_t = CliLogLevel::Info)]
    log_level: CliLogLevel,

    #[command(subcommand)]
    command: commands::Commands,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    init_tracing(cli.log_level.as_tracing_level(), None)?;
    commands::run_command(cli.command).await?;

    Ok(())
}
