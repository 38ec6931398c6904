//! Detection command implementation

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use chrono_tz::Tz;
use recur_core::{
    detect_import_format, parse_csv, ClusterReport, Detection, DetectionConfig, ImportFormat,
    RecurringTransaction, Transaction,
};
use serde_json::json;

use super::{format_amount, parse_timezone, truncate};

/// How `cmd_detect` presents its results
#[derive(Debug, Clone, Copy, Default)]
pub struct DetectOutput {
    pub json: bool,
    pub explain: bool,
    pub active_only: bool,
}

pub fn cmd_detect(
    file: &Path,
    format: Option<&str>,
    timezone: &str,
    config_path: Option<&Path>,
    output: DetectOutput,
) -> Result<()> {
    let tz = parse_timezone(timezone)?;
    let (config, source) =
        DetectionConfig::load(config_path).context("Failed to load detection config")?;
    let transactions = load_transactions(file, format, tz)?;

    if !output.json {
        println!(
            "🔍 Scanning {} transactions from {}...",
            transactions.len(),
            file.display()
        );
        println!("   Timezone: {}", tz);
        println!("   Config: {}", source);
    }

    if output.explain {
        let threshold = config.confidence_threshold;
        let mut detection = Detection::with_timezone(tz, config);
        for tx in &transactions {
            detection.add_transaction(tx);
        }

        let mut reports = detection.evaluate_all();
        if output.active_only {
            reports.retain(|r| !r.best().is_some_and(|best| best.ended));
        }

        if output.json {
            println!("{}", serde_json::to_string_pretty(&reports_to_json(&reports))?);
        } else {
            print_reports(&reports, threshold);
        }
        return Ok(());
    }

    let results = find_series(&transactions, tz, config, output.active_only);

    if output.json {
        println!("{}", serde_json::to_string_pretty(&results)?);
        return Ok(());
    }

    let by_id: HashMap<u64, &Transaction> = transactions.iter().map(|t| (t.id, t)).collect();
    print_results(&results, &by_id);

    Ok(())
}

/// Read a CSV export, auto-detecting its format unless one is given
pub fn load_transactions(
    file: &Path,
    format: Option<&str>,
    timezone: Tz,
) -> Result<Vec<Transaction>> {
    let content = fs::read_to_string(file)
        .with_context(|| format!("Failed to open file: {}", file.display()))?;

    let format: ImportFormat = if let Some(format) = format {
        format.parse().map_err(anyhow::Error::msg)?
    } else {
        let header = content.lines().next().unwrap_or_default();
        detect_import_format(header).ok_or_else(|| {
            anyhow::anyhow!(
                "Could not auto-detect CSV format from header.\n\
                 Specify --format with one of: generic, chase, bofa"
            )
        })?
    };

    parse_csv(content.as_bytes(), format, timezone)
        .with_context(|| format!("Failed to parse {} CSV: {}", format, file.display()))
}

/// Run a detection session over `transactions`
pub fn find_series(
    transactions: &[Transaction],
    timezone: Tz,
    config: DetectionConfig,
    active_only: bool,
) -> Vec<RecurringTransaction> {
    let mut detection = Detection::with_timezone(timezone, config);
    for tx in transactions {
        detection.add_transaction(tx);
    }

    let mut results = detection.get_recurring_transactions();
    if active_only {
        results.retain(|r| !r.ended);
    }
    results
}

fn print_results(results: &[RecurringTransaction], by_id: &HashMap<u64, &Transaction>) {
    println!();
    if results.is_empty() {
        println!("No recurring series found.");
        return;
    }

    println!("🔁 Recurring Series");
    println!("   ─────────────────────────────────────────────────────────────────────");

    for series in results {
        let status_icon = if series.ended { "⏹️ " } else { "✅" };
        let amount_str = series
            .matches
            .last()
            .and_then(|id| by_id.get(id))
            .map(|t| format_amount(t.amount))
            .unwrap_or_else(|| "?".to_string());

        println!(
            "   {} {:24} │ {:>10} │ {:<12} │ next {} │ {:>3.0}%",
            status_icon,
            truncate(&series.name, 24),
            amount_str,
            series.window.as_str(),
            series.next,
            series.confidence * 100.0
        );
        println!(
            "      {} since {} ({} matched)",
            series.rule.describe(),
            series.first,
            series.matches.len()
        );
    }

    let active = results.iter().filter(|r| !r.ended).count();
    println!();
    println!("   {} active, {} ended", active, results.len() - active);
}

fn print_reports(reports: &[ClusterReport<'_>], threshold: f64) {
    if reports.is_empty() {
        println!();
        println!("No clusters formed.");
        return;
    }

    for (index, report) in reports.iter().enumerate() {
        let name = report
            .transactions
            .last()
            .map(|t| t.display_name())
            .unwrap_or("?");

        println!();
        println!(
            "📦 Cluster {}: {} ({} transactions)",
            index + 1,
            truncate(name, 40),
            report.transactions.len()
        );

        let best = report.best();
        if report.candidates.is_empty() {
            println!("   No window matched");
        }

        for candidate in &report.candidates {
            let is_best = best.is_some_and(|b| std::ptr::eq(b, candidate));
            let marker = match (is_best, candidate.confidence > threshold) {
                (true, true) => "✅",
                (true, false) => "➖",
                _ => "  ",
            };
            println!(
                "   {} {:<12} {:>7.3} │ {:>2} hits │ {}{}",
                marker,
                candidate.window.as_str(),
                candidate.confidence,
                candidate.matches.len(),
                candidate.rule.describe(),
                if candidate.ended { " (ended)" } else { "" }
            );
        }
    }

    println!();
    println!("   Threshold: confidence > {}", threshold);
}

fn reports_to_json(reports: &[ClusterReport<'_>]) -> serde_json::Value {
    reports
        .iter()
        .map(|report| {
            json!({
                "transactions": report.transactions.iter().map(|t| t.id).collect::<Vec<u64>>(),
                "best": report.best(),
                "candidates": report.candidates,
            })
        })
        .collect()
}
