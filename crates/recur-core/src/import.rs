//! CSV import for bank transaction exports
//!
//! Supported layouts:
//! - Generic: `id,date,name,merchant,amount` (id and merchant may be empty)
//! - Chase: `Transaction Date,Post Date,Description,Category,Type,Amount,Memo`
//! - Bank of America: `Date,Description,Amount,Running Bal.`
//!
//! Dates are calendar dates in the account timezone; each becomes that
//! day's local midnight. Amounts become signed minor units (cents).

use std::io::Read;

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use csv::ReaderBuilder;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::models::Transaction;

/// Supported CSV layouts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportFormat {
    Generic,
    Chase,
    Bofa,
}

impl ImportFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Generic => "generic",
            Self::Chase => "chase",
            Self::Bofa => "bofa",
        }
    }
}

impl std::str::FromStr for ImportFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "generic" | "csv" => Ok(Self::Generic),
            "chase" => Ok(Self::Chase),
            "bofa" | "bankofamerica" => Ok(Self::Bofa),
            _ => Err(format!("Unknown import format: {}", s)),
        }
    }
}

impl std::fmt::Display for ImportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Detect the CSV layout from its header line
///
/// Returns None if the format is not recognized.
pub fn detect_import_format(header: &str) -> Option<ImportFormat> {
    let header = header.trim().trim_start_matches('\u{feff}');

    if header.starts_with("Transaction Date,Post Date,Description,Category,Type,Amount") {
        return Some(ImportFormat::Chase);
    }

    if header.starts_with("Date,Description,Amount") {
        return Some(ImportFormat::Bofa);
    }

    let columns: Vec<String> = header
        .split(',')
        .map(|c| c.trim().to_lowercase())
        .collect();
    let has = |name: &str| columns.iter().any(|c| c == name);
    if has("date") && has("name") && has("amount") {
        return Some(ImportFormat::Generic);
    }

    None
}

/// Parse CSV data into transactions
pub fn parse_csv<R: Read>(
    reader: R,
    format: ImportFormat,
    timezone: Tz,
) -> Result<Vec<Transaction>> {
    let transactions = match format {
        ImportFormat::Generic => parse_generic(reader, timezone)?,
        ImportFormat::Chase => parse_positional(reader, timezone, 0, 2, 5)?,
        ImportFormat::Bofa => parse_positional(reader, timezone, 0, 1, 2)?,
    };
    debug!("Parsed {} {} transactions", transactions.len(), format);
    Ok(transactions)
}

#[derive(Debug, Deserialize)]
struct GenericRow {
    #[serde(default)]
    id: Option<u64>,
    date: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    merchant: Option<String>,
    amount: String,
}

fn parse_generic<R: Read>(reader: R, timezone: Tz) -> Result<Vec<Transaction>> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    // Column names are matched case-insensitively
    let headers: csv::StringRecord = rdr
        .headers()?
        .iter()
        .map(|h| h.trim().to_lowercase())
        .collect();
    rdr.set_headers(headers);

    let records = rdr
        .deserialize::<GenericRow>()
        .collect::<std::result::Result<Vec<_>, _>>()?;

    // Rows without an id are numbered after the largest explicit one
    let mut next_id = records
        .iter()
        .filter_map(|r| r.id)
        .max()
        .map_or(Some(1), |max| max.checked_add(1));
    let mut transactions = Vec::new();

    for (row, record) in records.into_iter().enumerate() {
        let name = record.name.unwrap_or_default();
        let merchant = record.merchant.filter(|m| !m.is_empty());

        if name.is_empty() && merchant.is_none() {
            warn!("Skipping row {}: no description or merchant", row + 1);
            continue;
        }

        let id = match record.id {
            Some(id) => id,
            None => {
                let id = next_id.ok_or_else(|| {
                    Error::Import(format!("Row {}: no free id left to assign", row + 1))
                })?;
                next_id = id.checked_add(1);
                id
            }
        };

        transactions.push(Transaction {
            id,
            original_name: name,
            original_merchant_name: merchant,
            date: local_midnight(parse_date(&record.date)?, timezone)?,
            amount: parse_amount(&record.amount)?,
        });
    }

    Ok(transactions)
}

/// Parse a bank layout with fixed column positions. Ids are assigned from
/// the row number.
fn parse_positional<R: Read>(
    reader: R,
    timezone: Tz,
    date_column: usize,
    description_column: usize,
    amount_column: usize,
) -> Result<Vec<Transaction>> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let mut transactions = Vec::new();

    for (row, result) in rdr.records().enumerate() {
        let record = result?;

        let date_str = record
            .get(date_column)
            .ok_or_else(|| Error::Import("Missing date".into()))?;
        let date = parse_date(date_str)?;

        let description = record
            .get(description_column)
            .ok_or_else(|| Error::Import("Missing description".into()))?
            .trim()
            .to_string();
        if description.is_empty() {
            warn!("Skipping row {}: empty description", row + 1);
            continue;
        }

        let amount_str = record
            .get(amount_column)
            .ok_or_else(|| Error::Import("Missing amount".into()))?;

        transactions.push(Transaction {
            id: row as u64 + 1,
            original_name: description,
            original_merchant_name: None,
            date: local_midnight(date, timezone)?,
            amount: parse_amount(amount_str)?,
        });
    }

    Ok(transactions)
}

/// Parse a date string in any of the common bank formats
pub fn parse_date(s: &str) -> Result<NaiveDate> {
    let s = s.trim();

    let formats = [
        "%m/%d/%Y", // 01/15/2024
        "%m/%d/%y", // 01/15/24
        "%Y-%m-%d", // 2024-01-15
        "%m-%d-%Y", // 01-15-2024
    ];

    for fmt in formats {
        if let Ok(date) = NaiveDate::parse_from_str(s, fmt) {
            return Ok(date);
        }
    }

    Err(Error::Import(format!("Unable to parse date: {}", s)))
}

/// Parse an amount string into minor units, handling currency symbols,
/// thousands separators, and accounting-style parentheses
pub fn parse_amount(s: &str) -> Result<i64> {
    let invalid = || Error::Import(format!("Unable to parse amount: {}", s));
    let cleaned = s.trim().replace(['$', ',', ' '], "");

    let (negative, digits) = if let Some(inner) = cleaned
        .strip_prefix('(')
        .and_then(|rest| rest.strip_suffix(')'))
    {
        (true, inner)
    } else if let Some(rest) = cleaned.strip_prefix('-') {
        (true, rest)
    } else {
        (false, cleaned.strip_prefix('+').unwrap_or(&cleaned))
    };

    let (whole, fraction) = digits.split_once('.').unwrap_or((digits, ""));
    let all_digits = |part: &str| part.chars().all(|c| c.is_ascii_digit());
    if (whole.is_empty() && fraction.is_empty())
        || !all_digits(whole)
        || !all_digits(fraction)
        || fraction.len() > 2
    {
        return Err(invalid());
    }

    let whole: i64 = if whole.is_empty() {
        0
    } else {
        whole.parse().map_err(|_| invalid())?
    };
    let cents: i64 = match fraction.len() {
        0 => 0,
        1 => fraction.parse::<i64>().map_err(|_| invalid())? * 10,
        _ => fraction.parse().map_err(|_| invalid())?,
    };

    let value = whole
        .checked_mul(100)
        .and_then(|v| v.checked_add(cents))
        .ok_or_else(invalid)?;
    Ok(if negative { -value } else { value })
}

/// Start of `date` in `timezone`, as a UTC instant. Days that skip
/// midnight for daylight saving start at 01:00.
pub fn local_midnight(date: NaiveDate, timezone: Tz) -> Result<DateTime<Utc>> {
    let midnight = date.and_time(NaiveTime::MIN);
    timezone
        .from_local_datetime(&midnight)
        .earliest()
        .or_else(|| {
            timezone
                .from_local_datetime(&(midnight + Duration::hours(1)))
                .earliest()
        })
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| {
            Error::InvalidData(format!("{} has no local midnight in {}", date, timezone))
        })
}
