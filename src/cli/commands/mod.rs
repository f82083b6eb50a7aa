//! CLI commands implementation.
//!
//! This module contains the CLI parser and dispatches to command-specific modules.

mod check;
mod search;
mod serve;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::{load_settings_with_options, LoadOptions};

#[derive(Parser)]
#[command(name = "jobgate")]
#[command(about = "Rate limited job search gateway")]
#[command(version)]
pub struct Cli {
    /// Config file path (TOML, overrides JOBGATE_CONFIG)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve {
        /// Address to bind to: PORT, HOST, or HOST:PORT (default: 127.0.0.1:3040)
        #[arg(default_value = "127.0.0.1:3040")]
        bind: String,
    },

    /// Run one upstream search and print normalized listings
    Search {
        /// Search keywords
        query: String,
        /// Location to search in
        #[arg(short, long, default_value = "")]
        location: String,
        /// Only remote jobs (overrides --location)
        #[arg(short, long)]
        remote: bool,
        /// Page number (1-based)
        #[arg(short, long, default_value = "1")]
        page: u32,
        /// Results per page (max 50)
        #[arg(short = 'n', long, default_value = "10")]
        limit: u32,
        /// Print raw JSON instead of a summary
        #[arg(long)]
        json: bool,
    },

    /// Record one hit against the limiter and print the decision
    Check {
        /// Caller identifier (IP address or user id)
        identifier: String,
        /// Rate limit context
        #[arg(long, default_value = "api")]
        context: String,
    },
}

pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let options = LoadOptions {
        config_path: cli.config,
    };
    let settings = load_settings_with_options(options).await?;

    match cli.command {
        Commands::Serve { bind } => serve::cmd_serve(&settings, &bind).await,
        Commands::Search {
            query,
            location,
            remote,
            page,
            limit,
            json,
        } => {
            search::cmd_search(
                &settings,
                search::SearchArgs {
                    query,
                    location,
                    remote,
                    page,
                    limit,
                    json,
                },
            )
            .await
        }
        Commands::Check {
            identifier,
            context,
        } => check::cmd_check(&settings, &identifier, &context).await,
    }
}
