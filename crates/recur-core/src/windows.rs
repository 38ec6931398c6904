//! Candidate recurrence windows
//!
//! For an anchor date, propose every schedule a recurring series could
//! plausibly follow. The caller scores each one against a cluster and keeps
//! the best fit; nothing here looks at the transactions themselves.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use chrono_tz::Tz;
use tracing::warn;

use crate::error::Result;
use crate::models::WindowType;
use crate::rules::{MonthDay, RecurrenceRule};

/// A candidate schedule: what kind it is, how to expand it, and how many
/// days a real posting may drift from it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Window {
    pub window_type: WindowType,
    pub rule: RecurrenceRule,
    pub fuzzy: i64,
}

impl Window {
    fn new(window_type: WindowType, rule: Result<RecurrenceRule>) -> Option<Self> {
        match rule {
            Ok(rule) => Some(Self {
                window_type,
                rule,
                fuzzy: window_type.fuzzy(),
            }),
            Err(e) => {
                warn!("Skipping {} window: {}", window_type, e);
                None
            }
        }
    }
}

/// Every candidate window anchored at `anchor`, as seen in `timezone`
pub fn get_windows_for_date(anchor: DateTime<Utc>, timezone: Tz) -> Vec<Window> {
    windows_for_local_date(anchor.with_timezone(&timezone).date_naive())
}

/// Every candidate window anchored at a local calendar date, in a fixed
/// order (ties in scoring go to the earlier candidate)
pub fn windows_for_local_date(date: NaiveDate) -> Vec<Window> {
    let day = MonthDay::Day(date.day());

    collect_windows([
        (WindowType::Weekly, RecurrenceRule::weekly(date, 1)),
        (WindowType::BiWeekly, RecurrenceRule::weekly(date, 2)),
        (
            WindowType::SemiMonthly,
            RecurrenceRule::semi_monthly(date, [MonthDay::Day(1), MonthDay::Day(15)]),
        ),
        (
            WindowType::SemiMonthly,
            RecurrenceRule::semi_monthly(date, [MonthDay::Day(15), MonthDay::Last]),
        ),
        (WindowType::Monthly, RecurrenceRule::monthly(date, 1, day)),
        (WindowType::BiMonthly, RecurrenceRule::monthly(date, 2, day)),
        (WindowType::Quarterly, RecurrenceRule::monthly(date, 3, day)),
        (WindowType::SemiYearly, RecurrenceRule::monthly(date, 6, day)),
        (WindowType::Yearly, RecurrenceRule::monthly(date, 12, day)),
    ])
}

/// Build windows from already-constructed rules, skipping any that failed
fn collect_windows(
    candidates: impl IntoIterator<Item = (WindowType, Result<RecurrenceRule>)>,
) -> Vec<Window> {
    candidates
        .into_iter()
        .filter_map(|(window_type, rule)| Window::new(window_type, rule))
        .collect()
}
