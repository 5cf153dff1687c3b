//! Command-line interface definitions using clap

use clap::{Parser, Subcommand};

/// Flash offer claim & targeting engine
#[derive(Parser, Debug)]
#[command(name = "flash-offers")]
#[command(version)]
#[command(about = "Capacity-bounded venue offers with race-safe claims", long_about = None)]
pub struct Cli {
    /// Configuration file path (default: config.toml)
    #[arg(long, short = 'c', global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available commands
#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Run the HTTP server (default)
    Serve,

    /// Expire ended offers and stale claims, then send due pushes, once
    Sweep,

    /// Write a sample configuration file
    ConfigGen {
        /// Output path (default: config.example.toml)
        output_path: Option<String>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}
