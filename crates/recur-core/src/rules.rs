//! Recurrence rules
//!
//! A small closed set of calendar rules, each expanding from a start date
//! (the rule's DTSTART) into an ascending sequence of occurrence dates:
//! - Weekly: every N weeks on the start date's weekday
//! - Monthly: every N months on a day-of-month (clamped to short months)
//! - SemiMonthly: two fixed days in every month
//!
//! Occurrences never precede the start date.

use chrono::{Datelike, Days, NaiveDate, Weekday};
use serde::{Serialize, Serializer};

use crate::error::{Error, Result};

/// Day-of-month selector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonthDay {
    /// A fixed day (1-31); clamps to the last day in shorter months
    Day(u32),
    /// The last day of the month
    Last,
}

impl MonthDay {
    fn validate(&self) -> Result<()> {
        match self {
            Self::Day(day) if !(1..=31).contains(day) => Err(Error::InvalidRule(format!(
                "day of month must be between 1 and 31, got {}",
                day
            ))),
            _ => Ok(()),
        }
    }

    fn resolve(&self, year: i32, month: u32) -> Option<NaiveDate> {
        let last = days_in_month(year, month)?;
        let day = match self {
            Self::Day(day) => (*day).min(last),
            Self::Last => last,
        };
        NaiveDate::from_ymd_opt(year, month, day)
    }

    fn rrule_value(&self) -> String {
        match self {
            Self::Day(day) => day.to_string(),
            Self::Last => "-1".to_string(),
        }
    }

    fn describe(&self) -> String {
        match self {
            Self::Day(day) => ordinal(*day),
            Self::Last => "last day".to_string(),
        }
    }
}

/// A recurrence rule anchored at a start date
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecurrenceRule {
    Weekly {
        start: NaiveDate,
        interval: u32,
    },
    Monthly {
        start: NaiveDate,
        interval: u32,
        day: MonthDay,
    },
    SemiMonthly {
        start: NaiveDate,
        days: [MonthDay; 2],
    },
}

impl RecurrenceRule {
    /// Every `interval` weeks on the weekday of `start`
    pub fn weekly(start: NaiveDate, interval: u32) -> Result<Self> {
        check_interval(interval)?;
        Ok(Self::Weekly { start, interval })
    }

    /// Every `interval` months on `day`
    pub fn monthly(start: NaiveDate, interval: u32, day: MonthDay) -> Result<Self> {
        check_interval(interval)?;
        day.validate()?;
        Ok(Self::Monthly {
            start,
            interval,
            day,
        })
    }

    /// Twice a month on the two given days
    pub fn semi_monthly(start: NaiveDate, days: [MonthDay; 2]) -> Result<Self> {
        days[0].validate()?;
        days[1].validate()?;
        if days[0] == days[1] {
            return Err(Error::InvalidRule(
                "semi-monthly rule needs two distinct days".into(),
            ));
        }
        Ok(Self::SemiMonthly { start, days })
    }

    pub fn start(&self) -> NaiveDate {
        match self {
            Self::Weekly { start, .. }
            | Self::Monthly { start, .. }
            | Self::SemiMonthly { start, .. } => *start,
        }
    }

    /// Ascending, unbounded sequence of occurrence dates from the start date.
    ///
    /// Ends only if the calendar itself runs out.
    pub fn occurrences(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        let start = self.start();
        (0u32..)
            .map_while(move |period| self.period(period))
            .flatten()
            .filter(move |date| *date >= start)
    }

    /// Occurrences between `after` and `before`
    pub fn between(&self, after: NaiveDate, before: NaiveDate, inclusive: bool) -> Vec<NaiveDate> {
        self.occurrences()
            .skip_while(|date| {
                if inclusive {
                    *date < after
                } else {
                    *date <= after
                }
            })
            .take_while(|date| {
                if inclusive {
                    *date <= before
                } else {
                    *date < before
                }
            })
            .collect()
    }

    /// First occurrence after `date`
    pub fn after(&self, date: NaiveDate, inclusive: bool) -> Option<NaiveDate> {
        self.occurrences().find(|occurrence| {
            if inclusive {
                *occurrence >= date
            } else {
                *occurrence > date
            }
        })
    }

    /// Plain-language summary, e.g. "every 2 weeks on Friday"
    pub fn describe(&self) -> String {
        match self {
            Self::Weekly { start, interval } => {
                let weekday = weekday_name(start.weekday());
                if *interval == 1 {
                    format!("every week on {}", weekday)
                } else {
                    format!("every {} weeks on {}", interval, weekday)
                }
            }
            Self::Monthly { interval, day, .. } => {
                if *interval == 1 {
                    format!("every month on the {}", day.describe())
                } else {
                    format!("every {} months on the {}", interval, day.describe())
                }
            }
            Self::SemiMonthly { days, .. } => format!(
                "twice a month on the {} and {}",
                days[0].describe(),
                days[1].describe()
            ),
        }
    }

    /// Dates produced by the `period`-th step of the rule, ascending.
    fn period(&self, period: u32) -> Option<Vec<NaiveDate>> {
        match self {
            Self::Weekly { start, interval } => {
                let days = 7 * u64::from(*interval) * u64::from(period);
                Some(vec![start.checked_add_days(Days::new(days))?])
            }
            Self::Monthly {
                start,
                interval,
                day,
            } => {
                let (year, month) = shift_month(*start, u64::from(*interval) * u64::from(period))?;
                Some(vec![day.resolve(year, month)?])
            }
            Self::SemiMonthly { start, days } => {
                let (year, month) = shift_month(*start, u64::from(period))?;
                let mut dates = vec![days[0].resolve(year, month)?, days[1].resolve(year, month)?];
                dates.sort();
                // Day(30) and Last land on the same date in February
                dates.dedup();
                Some(dates)
            }
        }
    }
}

impl std::fmt::Display for RecurrenceRule {
    /// RFC 5545 style snapshot: a DTSTART line followed by an RRULE line
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "DTSTART:{}\nRRULE:", self.start().format("%Y%m%d"))?;
        match self {
            Self::Weekly { start, interval } => write!(
                f,
                "FREQ=WEEKLY;INTERVAL={};BYDAY={}",
                interval,
                weekday_code(start.weekday())
            ),
            Self::Monthly { interval, day, .. } => write!(
                f,
                "FREQ=MONTHLY;INTERVAL={};BYMONTHDAY={}",
                interval,
                day.rrule_value()
            ),
            Self::SemiMonthly { days, .. } => write!(
                f,
                "FREQ=MONTHLY;INTERVAL=1;BYMONTHDAY={},{}",
                days[0].rrule_value(),
                days[1].rrule_value()
            ),
        }
    }
}

impl Serialize for RecurrenceRule {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

fn check_interval(interval: u32) -> Result<()> {
    if interval == 0 {
        return Err(Error::InvalidRule("interval must be at least 1".into()));
    }
    Ok(())
}

/// Year and month `months` months after the month containing `date`
fn shift_month(date: NaiveDate, months: u64) -> Option<(i32, u32)> {
    let months = i64::try_from(months).ok()?;
    let index = i64::from(date.year()) * 12 + i64::from(date.month0()) + months;
    let year = i32::try_from(index.div_euclid(12)).ok()?;
    let month = u32::try_from(index.rem_euclid(12)).ok()? + 1;
    Some((year, month))
}

fn days_in_month(year: i32, month: u32) -> Option<u32> {
    let (next_year, next_month) = if month == 12 {
        (year.checked_add(1)?, 1)
    } else {
        (year, month + 1)
    };
    let first_of_next = NaiveDate::from_ymd_opt(next_year, next_month, 1)?;
    Some(first_of_next.pred_opt()?.day())
}

fn weekday_code(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Mon => "MO",
        Weekday::Tue => "TU",
        Weekday::Wed => "WE",
        Weekday::Thu => "TH",
        Weekday::Fri => "FR",
        Weekday::Sat => "SA",
        Weekday::Sun => "SU",
    }
}

fn weekday_name(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

fn ordinal(day: u32) -> String {
    let suffix = match (day % 10, day % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    };
    format!("{}{}", day, suffix)
}
