//! rmap - concurrent TCP port scanner with service fingerprinting
//!
//! Binary entry point: parses the CLI, initializes logging, and hands the
//! normalized options to the orchestration layer.

use anyhow::Result;
use clap::Parser;
use colored::Colorize;
use rmap::{app, cli::Cli, logging};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init_logging(false)?;

    let options = match cli.into_options() {
        Ok(options) => options,
        Err(e) => {
            eprintln!("{} {e}", "error:".red().bold());
            std::process::exit(2);
        }
    };

    if let Err(e) = app::run(options).await {
        eprintln!("{} {e}", "error:".red().bold());
        std::process::exit(1);
    }
    Ok(())
}
