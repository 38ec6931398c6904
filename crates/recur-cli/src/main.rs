//! Recur CLI - Recurring transaction detector
//!
//! Usage:
//!   recur detect --file CSV           Detect recurring series (auto-detects format)
//!   recur windows --date 2024-01-15   List candidate windows for a date
//!   recur config                      Show effective detection settings

mod cli;
mod commands;


use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .init();

    match cli.command {
        Commands::Detect {
            file,
            format,
            timezone,
            json,
            explain,
            active_only,
        } => commands::cmd_detect(
            &file,
            format.as_deref(),
            &timezone,
            cli.config.as_deref(),
            commands::DetectOutput {
                json,
                explain,
                active_only,
            },
        ),
        Commands::Windows {
            date,
            timezone,
            count,
        } => commands::cmd_windows(&date, &timezone, count),
        Commands::Config => commands::cmd_config(cli.config.as_deref()),
    }
}
