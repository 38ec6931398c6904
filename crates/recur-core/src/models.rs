//! Domain models for recur

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::rules::RecurrenceRule;

/// A bank transaction as handed to the detector.
///
/// Owned by the caller; a detection session only borrows it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: u64,
    /// Raw description as reported by the bank
    pub original_name: String,
    /// Cleaned merchant name, when the bank data provider supplies one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_merchant_name: Option<String>,
    /// Posting instant
    pub date: DateTime<Utc>,
    /// Signed amount in minor currency units (negative = money out)
    pub amount: i64,
}

impl Transaction {
    /// Merchant name if present, otherwise the raw description
    pub fn display_name(&self) -> &str {
        match self.original_merchant_name.as_deref() {
            Some(merchant) if !merchant.trim().is_empty() => merchant,
            _ => &self.original_name,
        }
    }

    /// Calendar date of the transaction in the account timezone
    pub fn local_date(&self, timezone: &Tz) -> NaiveDate {
        self.date.with_timezone(timezone).date_naive()
    }
}

/// Cadence of a candidate recurrence window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowType {
    Weekly,
    BiWeekly,
    SemiMonthly,
    Monthly,
    BiMonthly,
    Quarterly,
    SemiYearly,
    Yearly,
}

impl WindowType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Weekly => "weekly",
            Self::BiWeekly => "bi_weekly",
            Self::SemiMonthly => "semi_monthly",
            Self::Monthly => "monthly",
            Self::BiMonthly => "bi_monthly",
            Self::Quarterly => "quarterly",
            Self::SemiYearly => "semi_yearly",
            Self::Yearly => "yearly",
        }
    }

    /// Days a real posting date may drift from the scheduled date.
    ///
    /// Grows with the period: weekend and holiday shifts matter more the
    /// rarer the charge is.
    pub fn fuzzy(&self) -> i64 {
        match self {
            Self::Weekly | Self::BiWeekly => 2,
            Self::SemiMonthly => 3,
            Self::Monthly | Self::BiMonthly => 5,
            Self::Quarterly => 7,
            Self::SemiYearly => 10,
            Self::Yearly => 14,
        }
    }

    pub fn all() -> &'static [WindowType] {
        &[
            Self::Weekly,
            Self::BiWeekly,
            Self::SemiMonthly,
            Self::Monthly,
            Self::BiMonthly,
            Self::Quarterly,
            Self::SemiYearly,
            Self::Yearly,
        ]
    }
}

impl std::str::FromStr for WindowType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "weekly" => Ok(Self::Weekly),
            "bi_weekly" | "biweekly" => Ok(Self::BiWeekly),
            "semi_monthly" | "semimonthly" => Ok(Self::SemiMonthly),
            "monthly" => Ok(Self::Monthly),
            "bi_monthly" | "bimonthly" => Ok(Self::BiMonthly),
            "quarterly" => Ok(Self::Quarterly),
            "semi_yearly" | "semiyearly" => Ok(Self::SemiYearly),
            "yearly" | "annual" => Ok(Self::Yearly),
            _ => Err(format!("Unknown window type: {}", s)),
        }
    }
}

impl std::fmt::Display for WindowType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A recurring series detected in a set of transactions
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecurringTransaction {
    /// Merchant name (or description) of the most recent transaction
    pub name: String,
    pub window: WindowType,
    /// Snapshot of the rule that best explains the series
    pub rule: RecurrenceRule,
    /// First scheduled date that matched a transaction
    pub first: NaiveDate,
    /// Last scheduled date that matched a transaction
    pub last: NaiveDate,
    /// Predicted next occurrence
    pub next: NaiveDate,
    /// True once `next` is overdue by more than the tolerance allows
    pub ended: bool,
    /// (hits - penalty * misses) / transactions; at most 1.0, may be negative
    pub confidence: f64,
    /// Ids of matched transactions, in schedule order
    pub matches: Vec<u64>,
}
