#![deny(missing_docs)]

//! # OasPipe CLI
//!
//! Command Line Interface over the document loader and generation pipeline.
//!
//! Supported Commands:
//! - `inspect`: Loads documents, runs every phase and reports the grouped
//!   resources and composed models.

use clap::{ArgAction, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::error::CliResult;

mod error;
mod inspect;

#[derive(Parser, Debug)]
#[clap(author, version, about = "OpenAPI loading and generation pipeline CLI")]
struct Cli {
    /// Raise log verbosity (-v info, -vv debug, -vvv trace). `RUST_LOG` wins.
    #[clap(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Load documents, run the pipeline and print what it built.
    Inspect(inspect::InspectArgs),
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> CliResult<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    match &cli.command {
        Commands::Inspect(args) => runtime.block_on(inspect::execute(args))?,
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_cli_structure() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_verbosity_counts() {
        let cli = Cli::parse_from(["oaspipe", "-vv", "inspect", "api.yaml"]);
        assert_eq!(cli.verbose, 2);
    }
}
