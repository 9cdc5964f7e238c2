//! Network disruption CLI
//!
//! A command-line tool for validating, compiling and describing network
//! disruption intents, and for inspecting cloud provider ip range catalogs.

mod commands;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{catalog, intent};
use disruption_lib::CloudProvider;
use std::path::PathBuf;

/// Network disruption CLI
#[derive(Parser)]
#[command(name = "netdisrupt")]
#[command(author, version, about = "CLI for network disruption intents", long_about = None)]
pub struct Cli {
    /// Output format
    #[arg(long, short, global = true, env = "NETDISRUPT_FORMAT", default_value = "table")]
    pub format: output::OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Validate an intent file and report every violation
    Validate {
        /// Intent JSON file
        file: PathBuf,

        /// Check that referenced Services and ports exist in the cluster
        #[arg(long)]
        check_services: bool,
    },

    /// Print the injector argument vector of an intent file
    Compile {
        /// Intent JSON file
        file: PathBuf,

        /// Provider ip ranges document used to expand cloud targets
        #[arg(long = "catalog", value_name = "PROVIDER=FILE")]
        catalogs: Vec<catalog::CatalogSource>,
    },

    /// Print the human readable description of an intent file
    Describe {
        /// Intent JSON file
        file: PathBuf,
    },

    /// Cloud ip ranges catalog commands
    #[command(subcommand)]
    Catalog(CatalogCommands),
}

#[derive(Subcommand)]
pub enum CatalogCommands {
    /// Parse a downloaded provider document and summarize it
    Check {
        /// Provider (AWS, GCP, Datadog)
        #[arg(long)]
        provider: CloudProvider,

        /// Provider ip ranges document
        #[arg(long)]
        file: PathBuf,

        /// Version to compare the document against
        #[arg(long)]
        cached_version: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Validate {
            file,
            check_services,
        } => {
            if !intent::validate_intent(&file, check_services, cli.format).await? {
                std::process::exit(1);
            }
        }
        Commands::Compile { file, catalogs } => {
            intent::compile_intent(&file, &catalogs, cli.format)?;
        }
        Commands::Describe { file } => {
            intent::describe_intent(&file, cli.format)?;
        }
        Commands::Catalog(catalog_cmd) => match catalog_cmd {
            CatalogCommands::Check {
                provider,
                file,
                cached_version,
            } => {
                catalog::check_catalog(provider, &file, cached_version.as_deref(), cli.format)?;
            }
        },
    }

    Ok(())
}
