//! Feedrank CLI binary.

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use feedrank::cli::args::FeedrankArgs;
use feedrank::cli::commands::execute_command;

fn main() -> anyhow::Result<()> {
    let args = FeedrankArgs::parse();

    // RUST_LOG wins over the verbosity flags.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("feedrank={}", args.log_directive())));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let command = format!("{:?}", args.command);
    execute_command(args).with_context(|| format!("command failed: {command}"))?;
    Ok(())
}
