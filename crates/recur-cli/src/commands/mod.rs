//! CLI command implementations
//!
//! Commands are organized by domain:
//! - `config` - Effective detection settings
//! - `detect` - CSV import and recurring series detection
//! - `windows` - Candidate window listing for an anchor date

pub mod config;
pub mod detect;
pub mod windows;

// Re-export command functions for main.rs
pub use config::*;
pub use detect::*;
pub use windows::*;

use anyhow::Result;
use chrono_tz::Tz;

/// Parse an IANA timezone name (e.g. "America/Chicago")
pub fn parse_timezone(name: &str) -> Result<Tz> {
    name.parse()
        .map_err(|_| recur_core::Error::InvalidTimezone(name.to_string()).into())
}

/// Truncate a string to a maximum number of characters, adding "..." if truncated
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// Format minor units as a currency amount
pub fn format_amount(minor: i64) -> String {
    let sign = if minor < 0 { "-" } else { "" };
    let abs = minor.unsigned_abs();
    format!("{}${}.{:02}", sign, abs / 100, abs % 100)
}
