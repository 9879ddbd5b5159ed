//! Command line argument parsing for the feedrank CLI using clap.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};

/// Feedrank - BM25 ranking with relevance feedback
#[derive(Parser, Debug, Clone)]
#[command(name = "feedrank")]
#[command(about = "BM25 ranking with pseudo and explicit relevance feedback")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(long_about = None)]
pub struct FeedrankArgs {
    /// Verbosity level (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (overrides verbose)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Engine configuration file (JSON)
    #[arg(short, long, value_name = "CONFIG_FILE", env = "FEEDRANK_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(short = 'f', long = "format", default_value = "human", global = true)]
    pub output_format: OutputFormat,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

impl FeedrankArgs {
    /// The default `tracing` directive implied by the verbosity flags.
    pub fn log_directive(&self) -> &'static str {
        if self.quiet {
            return "error";
        }
        match self.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }
}

/// Available CLI commands
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Add documents from a JSONL file and commit
    Index(IndexArgs),

    /// Rank a free-text query
    Search(SearchArgs),

    /// Rank the query reformulated from explicit feedback
    Feedback(FeedbackArgs),

    /// Show field statistics
    Stats(StatsArgs),
}

/// Arguments for indexing
#[derive(Parser, Debug, Clone)]
pub struct IndexArgs {
    /// Path to the index directory (created if missing)
    #[arg(value_name = "INDEX_PATH")]
    pub index_path: PathBuf,

    /// Document file, one JSON object per line
    #[arg(value_name = "DOCUMENT_FILE")]
    pub document_file: PathBuf,

    /// Replace documents whose id is already indexed
    #[arg(long)]
    pub update: bool,
}

/// Arguments for searching
#[derive(Parser, Debug, Clone)]
pub struct SearchArgs {
    /// Path to the index directory
    #[arg(value_name = "INDEX_PATH")]
    pub index_path: PathBuf,

    /// Query string
    #[arg(value_name = "QUERY")]
    pub query: String,

    /// Expand the query from its own top results
    #[arg(short, long)]
    pub pseudo: bool,

    /// Maximum number of results (overrides the configuration)
    #[arg(short, long)]
    pub limit: Option<usize>,
}

/// Arguments for user feedback
#[derive(Parser, Debug, Clone)]
pub struct FeedbackArgs {
    /// Path to the index directory
    #[arg(value_name = "INDEX_PATH")]
    pub index_path: PathBuf,

    /// Comma-separated internal ids; a leading '-' marks a document as not relevant
    #[arg(value_name = "SPEC", allow_hyphen_values = true)]
    pub spec: String,

    /// Maximum number of results (overrides the configuration)
    #[arg(short, long)]
    pub limit: Option<usize>,
}

/// Arguments for statistics
#[derive(Parser, Debug, Clone)]
pub struct StatsArgs {
    /// Path to the index directory
    #[arg(value_name = "INDEX_PATH")]
    pub index_path: PathBuf,

    /// Field to report on (defaults to the configured default field)
    #[arg(long)]
    pub field: Option<String>,
}

/// Output formats
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable output
    Human,
    /// JSON output
    Json,
}
