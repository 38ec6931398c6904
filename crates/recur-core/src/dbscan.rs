//! Density-based clustering (DBSCAN)
//!
//! Groups transactions that sit in dense neighbourhoods of the combined
//! text/amount distance. A point with at least `min_neighbors` other points
//! within `epsilon` is a core point; clusters grow breadth-first from core
//! points, absorbing non-core neighbours as border members. Points that are
//! neither core nor reachable from one are noise and never appear in output.
//!
//! Pairwise distances are computed on demand: each point's neighbourhood is
//! queried once, so the whole pass is quadratic in the number of datums.
//!
//! Output is deterministic for a fixed input order. Points are visited in
//! input order, neighbourhoods are returned in input order, and a border
//! point reachable from two clusters belongs to whichever claims it first.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use tracing::debug;

use crate::distance::distance;
use crate::models::Transaction;

/// A transaction paired with its term-weight vector
#[derive(Debug, Clone)]
pub struct Datum<'a> {
    pub transaction: &'a Transaction,
    vector: BTreeMap<String, f64>,
}

impl<'a> Datum<'a> {
    pub fn new(transaction: &'a Transaction, vector: BTreeMap<String, f64>) -> Self {
        Self {
            transaction,
            vector,
        }
    }

    pub fn vector(&self) -> &BTreeMap<String, f64> {
        &self.vector
    }
}

/// Indices into the dataset of the datums grouped together
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cluster {
    pub items: BTreeSet<usize>,
}

impl Cluster {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Label {
    Unvisited,
    Noise,
    Member(usize),
}

pub struct Dbscan<'a> {
    dataset: Vec<Datum<'a>>,
    epsilon: f64,
    min_neighbors: usize,
}

impl<'a> Dbscan<'a> {
    pub fn new(dataset: Vec<Datum<'a>>, epsilon: f64, min_neighbors: usize) -> Self {
        Self {
            dataset,
            epsilon,
            min_neighbors,
        }
    }

    pub fn dataset(&self) -> &[Datum<'a>] {
        &self.dataset
    }

    /// Run the clustering pass. Clusters are ordered by their first point.
    pub fn calculate(&self) -> Vec<Cluster> {
        let mut labels = vec![Label::Unvisited; self.dataset.len()];
        let mut clusters: Vec<Cluster> = Vec::new();

        for index in 0..self.dataset.len() {
            if labels[index] != Label::Unvisited {
                continue;
            }

            let neighbors = self.neighbors(index);
            if neighbors.len() < self.min_neighbors {
                // May still be claimed as a border point of a later cluster
                labels[index] = Label::Noise;
                continue;
            }

            let cluster_id = clusters.len();
            labels[index] = Label::Member(cluster_id);
            let mut items = BTreeSet::from([index]);
            let mut queue: VecDeque<usize> = neighbors.into();

            while let Some(candidate) = queue.pop_front() {
                match labels[candidate] {
                    Label::Member(_) => continue,
                    Label::Noise => {
                        // Border point: joins, but does not expand
                        labels[candidate] = Label::Member(cluster_id);
                        items.insert(candidate);
                    }
                    Label::Unvisited => {
                        labels[candidate] = Label::Member(cluster_id);
                        items.insert(candidate);

                        let reachable = self.neighbors(candidate);
                        if reachable.len() >= self.min_neighbors {
                            queue.extend(reachable);
                        }
                    }
                }
            }

            debug!("Cluster {} formed with {} items", cluster_id, items.len());
            clusters.push(Cluster { items });
        }

        let noise = labels.iter().filter(|l| **l == Label::Noise).count();
        debug!(
            "DBSCAN: {} datums, {} clusters, {} noise points",
            self.dataset.len(),
            clusters.len(),
            noise
        );

        clusters
    }

    /// Every other point within epsilon of `index`, in input order
    fn neighbors(&self, index: usize) -> Vec<usize> {
        let point = &self.dataset[index];
        self.dataset
            .iter()
            .enumerate()
            .filter(|(other, _)| *other != index)
            .filter(|(_, datum)| distance(point, datum) <= self.epsilon)
            .map(|(other, _)| other)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
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

    fn cluster(txs: &[Transaction], epsilon: f64, min_neighbors: usize) -> Vec<Cluster> {
        let mut pre = Preprocessor::new();
        for tx in txs {
            pre.add_transaction(tx);
        }
        Dbscan::new(pre.get_datums(), epsilon, min_neighbors).calculate()
    }

    fn items(cluster: &Cluster) -> Vec<usize> {
        cluster.items.iter().copied().collect()
    }

    #[test]
    fn test_empty_dataset() {
        assert!(cluster(&[], 0.3, 1).is_empty());
    }

    #[test]
    fn test_groups_and_excludes_noise() {
        let txs = vec![
            make_tx(1, "NETFLIX", -1599),
            make_tx(2, "SHELL OIL", -4200),
            make_tx(3, "NETFLIX", -1599),
            make_tx(4, "SPOTIFY", -1099),
            make_tx(5, "SPOTIFY", -1099),
            make_tx(6, "NETFLIX", -1599),
        ];
        let clusters = cluster(&txs, 0.3, 1);
        assert_eq!(clusters.len(), 2);
        assert_eq!(items(&clusters[0]), vec![0, 2, 5]);
        assert_eq!(items(&clusters[1]), vec![3, 4]);
        assert!(clusters.iter().all(|c| !c.items.contains(&1)));
    }

    #[test]
    fn test_amount_separates_same_merchant() {
        let txs = vec![
            make_tx(1, "CITY GYM", -1200),
            make_tx(2, "CITY GYM", -4500),
            make_tx(3, "CITY GYM", -1200),
            make_tx(4, "CITY GYM", -4500),
        ];
        let clusters = cluster(&txs, 0.3, 1);
        assert_eq!(clusters.len(), 2);
        assert_eq!(items(&clusters[0]), vec![0, 2]);
        assert_eq!(items(&clusters[1]), vec![1, 3]);
    }

    #[test]
    fn test_density_chain_follows_drifting_amounts() {
        // Each step is within 20% of the previous one, the ends are not
        let txs = vec![
            make_tx(1, "CITY POWER", -5000),
            make_tx(2, "CITY POWER", -6000),
            make_tx(3, "CITY POWER", -7200),
            make_tx(4, "CITY POWER", -8600),
        ];
        let clusters = cluster(&txs, 0.3, 1);
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].len(), 4);
    }

    #[test]
    fn test_border_points_do_not_expand() {
        // Only index 2 is core (three neighbours). Index 3 is a border
        // point; its other neighbour, index 4, must stay noise.
        let txs = vec![
            make_tx(1, "CITY WATER", -870),
            make_tx(2, "CITY WATER", -900),
            make_tx(3, "CITY WATER", -1000),
            make_tx(4, "CITY WATER", -1150),
            make_tx(5, "CITY WATER", -1330),
        ];
        let clusters = cluster(&txs, 0.16, 3);
        assert_eq!(clusters.len(), 1);
        assert_eq!(items(&clusters[0]), vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_noise_point_absorbed_as_border() {
        // Point 0 is visited first and marked noise, then claimed by the
        // cluster that grows from the core point at index 1.
        let txs = vec![
            make_tx(1, "CITY WATER", -1000),
            make_tx(2, "CITY WATER", -1150),
            make_tx(3, "CITY WATER", -1300),
        ];
        let clusters = cluster(&txs, 0.16, 2);
        assert_eq!(clusters.len(), 1);
        assert_eq!(items(&clusters[0]), vec![0, 1, 2]);
    }

    #[test]
    fn test_deterministic() {
        let txs = vec![
            make_tx(1, "HULU", -1799),
            make_tx(2, "HULU", -1799),
            make_tx(3, "RENT", -180000),
            make_tx(4, "RENT", -180000),
            make_tx(5, "HULU", -1899),
        ];
        assert_eq!(cluster(&txs, 0.3, 1), cluster(&txs, 0.3, 1));
    }
}
