//! Window listing command implementation

use anyhow::{Context, Result};
use chrono::NaiveDate;
use chrono_tz::Tz;
use recur_core::import::local_midnight;
use recur_core::{get_windows_for_date, Window};

use super::parse_timezone;

pub fn cmd_windows(date: &str, timezone: &str, count: usize) -> Result<()> {
    let tz = parse_timezone(timezone)?;
    let date = NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .context("Invalid --date format (use YYYY-MM-DD)")?;

    let windows = upcoming_windows(date, tz, count)?;

    println!("📅 Candidate windows anchored at {} ({})", date, tz);
    println!("   ─────────────────────────────────────────────────────────────");

    for (window, upcoming) in &windows {
        println!(
            "   {:<12} ±{:>2}d │ {}",
            window.window_type.as_str(),
            window.fuzzy,
            window.rule.describe()
        );
        let dates: Vec<String> = upcoming.iter().map(|d| d.to_string()).collect();
        println!("      {}", dates.join(", "));
    }

    Ok(())
}

/// Every candidate window for a local date, with its first `count` occurrences
pub fn upcoming_windows(
    date: NaiveDate,
    timezone: Tz,
    count: usize,
) -> Result<Vec<(Window, Vec<NaiveDate>)>> {
    let anchor = local_midnight(date, timezone)?;

    Ok(get_windows_for_date(anchor, timezone)
        .into_iter()
        .map(|window| {
            let upcoming = window.rule.occurrences().take(count).collect();
            (window, upcoming)
        })
        .collect())
}
