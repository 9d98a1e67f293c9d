//! Shopfront CLI - Database migrations and catalog tools.
//!
//! # Usage
//!
//! ```bash
//! # Run backend database migrations
//! shopfront-cli migrate
//!
//! # Replace or merge a store's catalog from a rows file
//! shopfront-cli ingest replace --store 1 --file rows.json
//! shopfront-cli ingest merge --store 1 --file rows.json --source-name recount.xlsx
//!
//! # Export a store's catalog as rows
//! shopfront-cli export --store 1
//!
//! # Create a bearer session
//! shopfront-cli session create --merchant 1
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use shopfront_core::{CustomerId, IngestMode, StoreId};

mod commands;

#[derive(Parser)]
#[command(name = "shopfront-cli")]
#[command(author, version, about = "Shopfront CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Apply a rows file to a store's catalog
    Ingest {
        #[command(subcommand)]
        mode: IngestCommand,
    },
    /// Print a store's catalog as rows
    Export {
        /// Store id
        #[arg(short, long)]
        store: StoreId,
    },
    /// Manage bearer sessions
    Session {
        #[command(subcommand)]
        action: SessionAction,
    },
}

#[derive(Subcommand)]
enum IngestCommand {
    /// Remove every product, then insert every row (destructive)
    Replace(IngestArgs),
    /// Update products matched by name and insert the rest
    Merge(IngestArgs),
}

#[derive(Args)]
struct IngestArgs {
    /// Store id
    #[arg(short, long)]
    store: StoreId,

    /// JSON rows file
    #[arg(short, long)]
    file: PathBuf,

    /// Name recorded in the inventory snapshot (defaults to the file name)
    #[arg(long)]
    source_name: Option<String>,
}

#[derive(Subcommand)]
enum SessionAction {
    /// Create a session for a merchant or a customer
    Create {
        /// Token to issue (random when omitted)
        #[arg(short, long)]
        token: Option<String>,

        /// Merchant store id
        #[arg(long, conflicts_with = "customer", required_unless_present = "customer")]
        merchant: Option<StoreId>,

        /// Customer id
        #[arg(long)]
        customer: Option<CustomerId>,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Ingest { mode } => {
            let (mode, args) = match mode {
                IngestCommand::Replace(args) => (IngestMode::Replace, args),
                IngestCommand::Merge(args) => (IngestMode::Merge, args),
            };
            commands::catalog::ingest(mode, args.store, &args.file, args.source_name).await?;
        }
        Commands::Export { store } => commands::catalog::export(store).await?,
        Commands::Session { action } => match action {
            SessionAction::Create {
                token,
                merchant,
                customer,
            } => {
                let principal = commands::session::principal(merchant, customer)
                    .ok_or("exactly one of --merchant or --customer is required")?;
                commands::session::create(token, principal).await?;
            }
        },
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_ingest() {
        let cli = Cli::try_parse_from([
            "shopfront-cli",
            "ingest",
            "merge",
            "--store",
            "3",
            "--file",
            "rows.json",
        ])
        .unwrap();
        assert!(matches!(
            cli.command,
            Commands::Ingest {
                mode: IngestCommand::Merge(IngestArgs { store, .. })
            } if store == StoreId::new(3)
        ));
    }
}
