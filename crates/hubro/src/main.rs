//! Hubro CLI - live-editing client for Hubro content servers.
//!
//! Provides commands for:
//! - `edit`: Mirror a document into a local file and stream live previews
//! - `save`: Save a local file to the server
//! - `create`: Create a new draft document

mod commands;
mod error;
mod output;
mod preview;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use commands::{CreateArgs, EditArgs, SaveArgs};
use error::CliError;
use output::Output;

/// Hubro - live-editing client.
#[derive(Parser)]
#[command(name = "hubro", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Edit a document with live preview.
    Edit(EditArgs),
    /// Save a document to the server.
    Save(SaveArgs),
    /// Create a new draft document.
    Create(CreateArgs),
}

impl Commands {
    fn verbose(&self) -> bool {
        match self {
            Self::Edit(args) => args.connect.verbose,
            Self::Save(args) => args.connect.verbose,
            Self::Create(args) => args.connect.verbose,
        }
    }

    async fn execute(self) -> Result<(), CliError> {
        match self {
            Self::Edit(args) => args.execute().await,
            Self::Save(args) => args.execute().await,
            Self::Create(args) => args.execute().await,
        }
    }
}

fn main() {
    let cli = Cli::parse();
    let output = Output::new();

    // --verbose enables INFO level, otherwise use RUST_LOG or default to WARN
    let filter = if cli.command.verbose() {
        EnvFilter::new("info")
    } else {
        EnvFilter::from_default_env()
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let result = tokio::runtime::Runtime::new()
        .map_err(CliError::from)
        .and_then(|rt| rt.block_on(cli.command.execute()));

    if let Err(err) = result {
        output.error(&format!("Error: {err}"));
        std::process::exit(1);
    }
}
