//! Dissimilarity between two transactions
//!
//! Combines how differently two transactions are described with how far
//! apart their amounts are. Both parts live in `[0, 1]` and are joined as a
//! Euclidean norm, so the result lives in `[0, sqrt(2)]`.

use std::collections::BTreeMap;

use crate::dbscan::Datum;

/// Distance used by the clustering engine. Symmetric, and zero for a datum
/// compared with itself.
pub fn distance(a: &Datum<'_>, b: &Datum<'_>) -> f64 {
    let text = text_distance(a.vector(), b.vector());
    let amount = amount_distance(a.transaction.amount, b.transaction.amount);
    (text * text + amount * amount).sqrt()
}

/// Cosine distance between two L2-normalized term vectors
pub fn text_distance(a: &BTreeMap<String, f64>, b: &BTreeMap<String, f64>) -> f64 {
    if a == b {
        return 0.0;
    }
    if a.is_empty() || b.is_empty() {
        return 1.0;
    }
    (1.0 - dot(a, b)).clamp(0.0, 1.0)
}

/// Relative amount difference, capped at 1.0
pub fn amount_distance(a: i64, b: i64) -> f64 {
    if a == b {
        return 0.0;
    }
    let (a, b) = (a as f64, b as f64);
    let scale = a.abs().max(b.abs());
    ((a - b).abs() / scale).min(1.0)
}

/// Sparse dot product. Common terms are visited in sorted key order from
/// either side, so swapping the arguments yields the identical float.
fn dot(a: &BTreeMap<String, f64>, b: &BTreeMap<String, f64>) -> f64 {
    a.iter()
        .filter_map(|(term, weight)| b.get(term).map(|other| weight * other))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Transaction;
    use crate::preprocess::Preprocessor;
    use chrono::{TimeZone, Utc};

    fn make_tx(id: u64, name: &str, amount: i64) -> Transaction {
        Transaction {
            id,
            original_name: name.to_string(),
            original_merchant_name: None,
            date: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            amount,
        }
    }

    fn vector(terms: &[(&str, f64)]) -> BTreeMap<String, f64> {
        terms.iter().map(|(t, w)| (t.to_string(), *w)).collect()
    }

    #[test]
    fn test_amount_distance() {
        assert_eq!(amount_distance(-1599, -1599), 0.0);
        assert_eq!(amount_distance(0, 0), 0.0);
        assert!((amount_distance(-1000, -900) - 0.1).abs() < 1e-12);
        assert_eq!(amount_distance(-1000, 1000), 1.0);
        assert_eq!(amount_distance(-1000, -900), amount_distance(-900, -1000));
    }

    #[test]
    fn test_text_distance_edges() {
        let empty = BTreeMap::new();
        let gym = vector(&[("gym", 1.0)]);
        assert_eq!(text_distance(&empty, &empty), 0.0);
        assert_eq!(text_distance(&gym, &empty), 1.0);
        assert_eq!(text_distance(&gym, &gym), 0.0);
        assert_eq!(text_distance(&gym, &vector(&[("water", 1.0)])), 1.0);
    }

    #[test]
    fn test_text_distance_is_symmetric() {
        let a = vector(&[("city", 0.3), ("gym", 0.7), ("north", 0.648)]);
        let b = vector(&[("city", 0.5), ("water", 0.866)]);
        assert_eq!(text_distance(&a, &b), text_distance(&b, &a));
        assert!((dot(&a, &b) - 0.15).abs() < 1e-12);
    }

    #[test]
    fn test_distance_properties() {
        let txs = vec![
            make_tx(1, "NETFLIX.COM", -1599),
            make_tx(2, "NETFLIX.COM 8839", -1599),
            make_tx(3, "NETFLIX.COM", -2299),
            make_tx(4, "SHELL OIL 5531", -4512),
        ];
        let mut pre = Preprocessor::new();
        for tx in &txs {
            pre.add_transaction(tx);
        }
        let datums = pre.get_datums();

        for a in &datums {
            assert_eq!(distance(a, a), 0.0);
            for b in &datums {
                assert_eq!(distance(a, b), distance(b, a));
                assert!(distance(a, b) >= 0.0);
            }
        }

        // Same description and amount
        assert_eq!(distance(&datums[0], &datums[1]), 0.0);
        // Same description, price went up ~30%
        let raised = distance(&datums[0], &datums[2]);
        assert!(raised > 0.25 && raised < 0.35);
        // Unrelated merchant
        assert!(distance(&datums[0], &datums[3]) > 1.0);
    }
}
