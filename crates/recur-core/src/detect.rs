//! Recurring transaction detection
//!
//! A `Detection` session collects transactions for one account and, on
//! request, runs the whole pipeline from scratch:
//! 1. Vectorize descriptions and cluster them (DBSCAN)
//! 2. Anchor every candidate window at each cluster's first transaction
//! 3. Walk each window's schedule, counting hits and misses
//! 4. Keep the best-scoring window per cluster if it clears the threshold
//!
//! Nothing is cached between calls, so repeated calls over the same
//! transactions return the same result.

use chrono::{DateTime, Days, NaiveDate, Utc};
use chrono_tz::Tz;
use tracing::{debug, info};

use crate::config::DetectionConfig;
use crate::dbscan::Dbscan;
use crate::error::{Error, Result};
use crate::models::{RecurringTransaction, Transaction};
use crate::preprocess::Preprocessor;
use crate::windows::{get_windows_for_date, Window};

/// Detection session for a single account
#[derive(Debug)]
pub struct Detection<'a> {
    timezone: Tz,
    config: DetectionConfig,
    preprocessor: Preprocessor<'a>,
    latest_observed_date: Option<DateTime<Utc>>,
}

/// Every scored candidate for one cluster
#[derive(Debug, Clone)]
pub struct ClusterReport<'a> {
    /// Cluster members, oldest first
    pub transactions: Vec<&'a Transaction>,
    /// One entry per window that matched at least once, in generation order
    pub candidates: Vec<RecurringTransaction>,
}

impl ClusterReport<'_> {
    /// Highest-confidence candidate; the earliest generated one wins ties
    pub fn best(&self) -> Option<&RecurringTransaction> {
        self.candidates
            .iter()
            .fold(None, |best: Option<&RecurringTransaction>, candidate| match best {
                Some(current) if current.confidence >= candidate.confidence => Some(current),
                _ => Some(candidate),
            })
    }
}

impl<'a> Detection<'a> {
    /// Create a session for an IANA timezone name (e.g. "America/Chicago")
    pub fn new(timezone: &str) -> Result<Self> {
        Self::with_config(timezone, DetectionConfig::default())
    }

    pub fn with_config(timezone: &str, config: DetectionConfig) -> Result<Self> {
        let tz: Tz = timezone
            .parse()
            .map_err(|_| Error::InvalidTimezone(timezone.to_string()))?;
        config.validate()?;
        Ok(Self::with_timezone(tz, config))
    }

    pub fn with_timezone(timezone: Tz, config: DetectionConfig) -> Self {
        Self {
            timezone,
            config,
            preprocessor: Preprocessor::new(),
            latest_observed_date: None,
        }
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    pub fn config(&self) -> &DetectionConfig {
        &self.config
    }

    pub fn add_transaction(&mut self, transaction: &'a Transaction) {
        self.preprocessor.add_transaction(transaction);
        if self
            .latest_observed_date
            .is_none_or(|latest| transaction.date > latest)
        {
            self.latest_observed_date = Some(transaction.date);
        }
    }

    /// Most recent transaction date seen so far
    pub fn latest_observed_date(&self) -> Option<DateTime<Utc>> {
        self.latest_observed_date
    }

    pub fn len(&self) -> usize {
        self.preprocessor.len()
    }

    pub fn is_empty(&self) -> bool {
        self.preprocessor.is_empty()
    }

    /// Best window per cluster, for clusters that clear the confidence threshold
    pub fn get_recurring_transactions(&self) -> Vec<RecurringTransaction> {
        let reports = self.evaluate_all();
        let clusters = reports.len();

        let results: Vec<RecurringTransaction> = reports
            .iter()
            .filter_map(ClusterReport::best)
            .filter(|best| best.confidence > self.config.confidence_threshold)
            .cloned()
            .collect();

        info!(
            "Detected {} recurring series from {} transactions in {} clusters",
            results.len(),
            self.len(),
            clusters
        );

        results
    }

    /// Score every candidate window for every cluster
    pub fn evaluate_all(&self) -> Vec<ClusterReport<'a>> {
        let Some(latest) = self.latest_observed_date else {
            return Vec::new();
        };
        let latest = latest.with_timezone(&self.timezone).date_naive();

        let dbscan = Dbscan::new(
            self.preprocessor.get_datums(),
            self.config.epsilon,
            self.config.min_neighbors,
        );
        let clusters = dbscan.calculate();

        clusters
            .iter()
            .filter_map(|cluster| {
                let mut transactions: Vec<&'a Transaction> = cluster
                    .items
                    .iter()
                    .map(|&index| dbscan.dataset()[index].transaction)
                    .collect();
                // Stable: same-day transactions keep input order
                transactions.sort_by_key(|t| t.date);

                let first = transactions.first()?;
                let candidates: Vec<RecurringTransaction> =
                    get_windows_for_date(first.date, self.timezone)
                        .iter()
                        .filter_map(|window| self.score_window(window, &transactions, latest))
                        .collect();

                debug!(
                    "Cluster '{}' ({} transactions): {} windows matched",
                    first.display_name(),
                    transactions.len(),
                    candidates.len()
                );

                Some(ClusterReport {
                    transactions,
                    candidates,
                })
            })
            .collect()
    }

    /// Walk a window's schedule over the cluster's date range. Returns None
    /// when no scheduled date matched a transaction.
    fn score_window(
        &self,
        window: &Window,
        transactions: &[&'a Transaction],
        latest: NaiveDate,
    ) -> Option<RecurringTransaction> {
        let dates: Vec<NaiveDate> = transactions
            .iter()
            .map(|t| t.local_date(&self.timezone))
            .collect();
        let fuzz = Days::new(window.fuzzy.unsigned_abs());
        let start = *dates.first()?;
        let end = *dates.last()?;
        let from = start.checked_sub_days(fuzz).unwrap_or(NaiveDate::MIN);
        let until = end.checked_add_days(fuzz).unwrap_or(NaiveDate::MAX);
        let tolerance_hours = window.fuzzy * 24;

        let mut hits: Vec<NaiveDate> = Vec::new();
        let mut matches: Vec<u64> = Vec::new();
        let mut misses = 0usize;

        for occurrence in window.rule.between(from, until, false) {
            let hit = transactions
                .iter()
                .zip(&dates)
                .find(|(_, date)| (**date - occurrence).num_hours().abs() <= tolerance_hours);

            match hit {
                Some((transaction, _)) => {
                    hits.push(occurrence);
                    matches.push(transaction.id);
                }
                None => misses += 1,
            }
        }

        let first = *hits.first()?;
        let last = *hits.last()?;
        let next = window.rule.after(last, false)?;
        let overdue = window
            .fuzzy
            .unsigned_abs()
            .saturating_mul(u64::from(self.config.ended_fuzz_multiplier));
        // No cutoff before the start of the calendar means nothing has ended
        let cutoff = latest.checked_sub_days(Days::new(overdue));
        let confidence = (hits.len() as f64 - self.config.miss_penalty * misses as f64)
            / transactions.len() as f64;

        debug!(
            "  {} {}: {} hits, {} misses, confidence {:.3}",
            window.window_type,
            window.rule.describe(),
            hits.len(),
            misses,
            confidence
        );

        let latest_transaction = transactions.last()?;
        Some(RecurringTransaction {
            name: latest_transaction.display_name().to_string(),
            window: window.window_type,
            rule: window.rule.clone(),
            first,
            last,
            next,
            ended: cutoff.is_some_and(|cutoff| next < cutoff),
            confidence,
            matches,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::WindowType;
    use chrono::TimeZone;

    fn make_tx(id: u64, name: &str, date: (i32, u32, u32), amount: i64) -> Transaction {
        Transaction {
            id,
            original_name: name.to_string(),
            original_merchant_name: None,
            date: Utc.with_ymd_and_hms(date.0, date.1, date.2, 12, 0, 0).unwrap(),
            amount,
        }
    }

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn session<'a>(txs: &'a [Transaction]) -> Detection<'a> {
        let mut detection = Detection::new("UTC").unwrap();
        for tx in txs {
            detection.add_transaction(tx);
        }
        detection
    }

    #[test]
    fn test_invalid_timezone_rejected() {
        let err = Detection::new("Mars/Olympus_Mons").unwrap_err();
        assert!(matches!(err, Error::InvalidTimezone(_)));
        assert!(Detection::new("America/Chicago").is_ok());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = DetectionConfig {
            epsilon: 0.0,
            ..Default::default()
        };
        assert!(matches!(
            Detection::with_config("UTC", config),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_empty_session() {
        let detection = Detection::new("UTC").unwrap();
        assert!(detection.is_empty());
        assert!(detection.latest_observed_date().is_none());
        assert!(detection.get_recurring_transactions().is_empty());
    }

    #[test]
    fn test_watermark_is_monotonic() {
        let txs = vec![
            make_tx(1, "A", (2023, 3, 1), -100),
            make_tx(2, "B", (2023, 5, 1), -100),
            make_tx(3, "C", (2023, 4, 1), -100),
        ];
        let mut detection = Detection::new("UTC").unwrap();

        detection.add_transaction(&txs[0]);
        assert_eq!(detection.latest_observed_date(), Some(txs[0].date));
        detection.add_transaction(&txs[1]);
        assert_eq!(detection.latest_observed_date(), Some(txs[1].date));
        detection.add_transaction(&txs[2]);
        assert_eq!(detection.latest_observed_date(), Some(txs[1].date));
        assert_eq!(detection.len(), 3);
    }

    #[test]
    fn test_confidence_formula() {
        // Every 14 days: weekly sees 3 hits and 2 misses
        let txs = vec![
            make_tx(1, "LAWN CARE", (2023, 1, 2), -4000),
            make_tx(2, "LAWN CARE", (2023, 1, 16), -4000),
            make_tx(3, "LAWN CARE", (2023, 1, 30), -4000),
        ];
        let reports = session(&txs).evaluate_all();
        assert_eq!(reports.len(), 1);

        let weekly = reports[0]
            .candidates
            .iter()
            .find(|c| c.window == WindowType::Weekly)
            .unwrap();
        assert!((weekly.confidence - (3.0 - 1.1 * 2.0) / 3.0).abs() < 1e-12);

        let best = reports[0].best().unwrap();
        assert_eq!(best.window, WindowType::BiWeekly);
        assert_eq!(best.confidence, 1.0);
        assert_eq!(best.matches, vec![1, 2, 3]);
        assert_eq!(best.first, ymd(2023, 1, 2));
        assert_eq!(best.last, ymd(2023, 1, 30));
        assert_eq!(best.next, ymd(2023, 2, 13));
        assert!(!best.ended);
    }

    #[test]
    fn test_ties_go_to_earlier_window() {
        // Jan 1 and Jan 15 fit both every-two-weeks and the 1st/15th
        let txs = vec![
            make_tx(1, "PAYROLL ACME", (2023, 1, 1), 250000),
            make_tx(2, "PAYROLL ACME", (2023, 1, 15), 250000),
        ];
        let reports = session(&txs).evaluate_all();
        let report = &reports[0];

        let semi_monthly = report
            .candidates
            .iter()
            .find(|c| c.window == WindowType::SemiMonthly)
            .unwrap();
        assert_eq!(semi_monthly.confidence, 1.0);

        let best = report.best().unwrap();
        assert_eq!(best.window, WindowType::BiWeekly);
        assert_eq!(best.confidence, 1.0);
    }

    #[test]
    fn test_zero_hit_windows_are_dropped() {
        let txs = vec![
            make_tx(1, "STREAMING", (2023, 1, 10), -999),
            make_tx(2, "STREAMING", (2023, 2, 10), -999),
        ];
        let reports = session(&txs).evaluate_all();
        // Both semi-monthly schedules start after Jan 10 and never land
        // within 3 days of either transaction
        let candidates = &reports[0].candidates;
        assert_eq!(candidates.len(), 7);
        assert!(candidates
            .iter()
            .all(|c| c.window != WindowType::SemiMonthly && !c.matches.is_empty()));
    }

    #[test]
    fn test_single_transaction_cluster_is_evaluated() {
        let config = DetectionConfig {
            min_neighbors: 0,
            ..Default::default()
        };
        let txs = vec![make_tx(1, "ONE OFF", (2023, 6, 1), -5000)];
        let mut detection = Detection::with_config("UTC", config).unwrap();
        detection.add_transaction(&txs[0]);

        let results = detection.get_recurring_transactions();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].window, WindowType::Weekly);
        assert_eq!(results[0].matches, vec![1]);
    }

    #[test]
    fn test_name_from_latest_transaction() {
        let mut txs = vec![
            make_tx(1, "SPOTIFY P0A1B2", (2023, 1, 5), -1099),
            make_tx(2, "SPOTIFY P0C3D4", (2023, 2, 5), -1099),
            make_tx(3, "SPOTIFY P0E5F6", (2023, 3, 5), -1099),
        ];
        txs[2].original_merchant_name = Some("Spotify".to_string());
        txs[1].original_merchant_name = Some("Spotify USA".to_string());

        let results = session(&txs).get_recurring_transactions();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].name, "Spotify");
    }

    #[test]
    fn test_ended_series() {
        let txs = vec![
            make_tx(1, "MEAL KIT", (2023, 3, 1), -6000),
            make_tx(2, "MEAL KIT", (2023, 3, 8), -6000),
            make_tx(3, "MEAL KIT", (2023, 3, 15), -6000),
            make_tx(4, "HARDWARE STORE", (2023, 5, 1), -2500),
        ];
        let results = session(&txs).get_recurring_transactions();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].window, WindowType::Weekly);
        assert_eq!(results[0].next, ymd(2023, 3, 22));
        assert!(results[0].ended);
    }

    #[test]
    fn test_huge_ended_multiplier_does_not_panic() {
        let config = DetectionConfig {
            ended_fuzz_multiplier: u32::MAX,
            ..Default::default()
        };
        assert!(matches!(
            Detection::with_config("UTC", config.clone()),
            Err(Error::Config(_))
        ));

        // Unvalidated sessions still score without overflowing the calendar
        let txs = vec![
            make_tx(1, "NETFLIX", (2023, 1, 15), -1549),
            make_tx(2, "NETFLIX", (2023, 2, 15), -1549),
            make_tx(3, "NETFLIX", (2023, 3, 15), -1549),
        ];
        let mut detection = Detection::with_timezone(chrono_tz::UTC, config);
        for tx in &txs {
            detection.add_transaction(tx);
        }
        let results = detection.get_recurring_transactions();
        assert_eq!(results.len(), 1);
        assert!(!results[0].ended);
    }

    #[test]
    fn test_local_dates_follow_timezone() {
        // Posted late evening Pacific time, which is the next day in UTC
        let txs: Vec<Transaction> = (0..4)
            .map(|i| Transaction {
                id: i + 1,
                original_name: "RENT PORTAL".to_string(),
                original_merchant_name: None,
                date: Utc.with_ymd_and_hms(2023, 1 + i as u32, 2, 5, 0, 0).unwrap(),
                amount: -185000,
            })
            .collect();

        let mut detection = Detection::new("America/Los_Angeles").unwrap();
        for tx in &txs {
            detection.add_transaction(tx);
        }
        let results = detection.get_recurring_transactions();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].window, WindowType::Monthly);
        assert_eq!(results[0].first, ymd(2023, 1, 1));
        assert_eq!(results[0].next, ymd(2023, 5, 1));
    }
}
