//! Filinglens CLI
//!
//! Plain-English question answering over ingested SEC filings.

use anyhow::Result;
use clap::Parser;
use filinglens_core::{Config, FilingLensError};

mod app;
mod commands;
mod output;

use app::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let default_level = if cli.verbose {
        tracing::Level::INFO
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(default_level.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = Config::load()?;

    let result = match cli.command {
        Commands::Ask(args) => commands::ask::run(args, config, cli.format, cli.verbose).await,
        Commands::Config(args) => commands::config::run(args, config),
    };

    if let Err(e) = result {
        if let Some(domain) = e.downcast_ref::<FilingLensError>() {
            eprintln!("Error: {domain}");
            std::process::exit(domain.exit_code());
        }
        return Err(e);
    }

    Ok(())
}
