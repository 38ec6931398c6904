//! CLI argument definitions using clap
//!
//! This module contains all the clap structs and enums for parsing CLI arguments.
//! The actual command implementations are in the `commands` module.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Recur - Find the recurring charges hiding in a bank export
#[derive(Parser)]
#[command(name = "recur")]
#[command(about = "Recurring transaction detector", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Detection config file (defaults to the data-dir override, then built-in values)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Detect recurring series in a CSV export
    Detect {
        /// CSV file to read
        #[arg(short, long)]
        file: PathBuf,

        /// CSV format: generic, chase, bofa (auto-detected if not specified)
        #[arg(long)]
        format: Option<String>,

        /// IANA timezone of the account (e.g. America/Chicago)
        #[arg(short, long, default_value = "UTC")]
        timezone: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,

        /// Show every scored window per cluster, not just the winners
        #[arg(long)]
        explain: bool,

        /// Hide series that have ended
        #[arg(long)]
        active_only: bool,
    },

    /// List candidate windows for an anchor date
    Windows {
        /// Anchor date (YYYY-MM-DD)
        #[arg(short, long)]
        date: String,

        /// IANA timezone the date is in
        #[arg(short, long, default_value = "UTC")]
        timezone: String,

        /// Number of upcoming occurrences to show per window
        #[arg(short, long, default_value = "4")]
        count: usize,
    },

    /// Show effective detection settings
    Config,
}
