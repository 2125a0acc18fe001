//! CLI argument definitions

use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "filinglens")]
#[command(
    author,
    version,
    about = "Ask plain-English questions about ingested SEC filings"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output format
    #[arg(long, global = true, value_enum, default_value = "cli")]
    pub format: OutputFormat,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Ask a question about the ingested filings
    Ask(AskArgs),

    /// Manage configuration
    Config(ConfigArgs),
}

#[derive(Args)]
pub struct AskArgs {
    /// The question, as free text
    #[arg(required = true)]
    pub question: Vec<String>,

    /// Candidate chunks fetched per retrieval round
    #[arg(long)]
    pub top_k: Option<usize>,

    /// Maximum query rewrite cycles before giving up
    #[arg(long)]
    pub max_rewrites: Option<u32>,

    /// Fail with an error instead of a degraded answer when no relevant
    /// evidence is found
    #[arg(long)]
    pub strict: bool,

    /// Hide the source excerpts in the output
    #[arg(long)]
    pub no_sources: bool,
}

#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print the effective configuration
    Show,
    /// Write a default config file
    Init,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable terminal output
    Cli,
    /// Machine-readable JSON
    Json,
}
