//! Command-line interface for svcdex.

mod commands;

use clap::{Parser, Subcommand};

/// svcdex - service directory with hybrid local/remote search
#[derive(Parser)]
#[command(name = "svcdex")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP API until interrupted
    #[command(alias = "daemon", alias = "-d")]
    Serve,

    /// Run one search through the local store and remote fallback
    #[command(alias = "s")]
    Search {
        /// Search text
        #[arg(required = true)]
        query: Vec<String>,
        /// Restrict to a category id
        #[arg(long)]
        category: Option<String>,
        /// Restrict to a location
        #[arg(long)]
        location: Option<String>,
        #[arg(long, default_value = "1")]
        page: u64,
        #[arg(long)]
        limit: Option<u64>,
        /// Search as the account owning this API key
        #[arg(long)]
        api_key: Option<String>,
    },

    /// Check database and remote service reachability
    Health,

    /// Create default config file
    #[command(alias = "--init")]
    Init,

    /// Manage user accounts
    User {
        #[command(subcommand)]
        command: UserCommands,
    },
}

#[derive(Subcommand)]
pub enum UserCommands {
    /// Create an account and print its API key
    Add {
        username: String,
        /// Mark the account as verified
        #[arg(long)]
        verified: bool,
    },
}

pub use commands::*;
