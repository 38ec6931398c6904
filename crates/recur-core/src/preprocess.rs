//! Description preprocessing
//!
//! Turns transaction descriptions into comparable term-weight vectors:
//! 1. Case-fold and split on anything that isn't a letter or digit
//! 2. Drop tokens carrying digits (store numbers, reference ids), single
//!    characters, and payment-rail noise words
//! 3. Count terms per transaction (a `Document`)
//! 4. At vectorization time, weight counts by smoothed inverse document
//!    frequency over everything added so far and L2-normalize
//!
//! IDF is recomputed on every `get_datums` call, so the vocabulary can keep
//! growing as transactions are added.

use std::collections::{BTreeMap, HashMap};
use std::sync::LazyLock;

use regex::Regex;

use crate::dbscan::Datum;
use crate::models::Transaction;

static TOKEN_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\p{L}\p{N}]+").expect("valid regex"));

/// Words that show up across unrelated merchants and say nothing about
/// which series a transaction belongs to
const NOISE_TERMS: &[&str] = &[
    "ach",
    "card",
    "checkcard",
    "com",
    "debit",
    "id",
    "inc",
    "llc",
    "payment",
    "pmt",
    "pos",
    "ppd",
    "purchase",
    "recurring",
    "transaction",
    "web",
    "www",
];

/// Split a description into normalized terms
pub fn tokenize(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    TOKEN_PATTERN
        .find_iter(&lower)
        .map(|m| m.as_str())
        .filter(|token| token.chars().count() >= 2)
        .filter(|token| !token.chars().any(char::is_numeric))
        .filter(|token| !NOISE_TERMS.contains(token))
        .map(String::from)
        .collect()
}

/// Every letter run of a description, with digits removed and nothing else
/// filtered. Used when `tokenize` leaves a description with no terms, so
/// "ACH DEBIT 12345" and "WEB PMT 99881" still read as different payees.
fn raw_terms(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    TOKEN_PATTERN
        .find_iter(&lower)
        .map(|m| m.as_str().chars().filter(|c| !c.is_numeric()).collect::<String>())
        .filter(|token| !token.is_empty())
        .collect()
}

/// Term counts for a single transaction
#[derive(Debug, Clone)]
pub struct Document<'a> {
    pub transaction: &'a Transaction,
    terms: BTreeMap<String, u32>,
}

impl<'a> Document<'a> {
    pub fn new(transaction: &'a Transaction) -> Self {
        let mut terms = BTreeMap::new();
        let merchant = transaction.original_merchant_name.as_deref().unwrap_or("");
        for term in tokenize(&transaction.original_name)
            .into_iter()
            .chain(tokenize(merchant))
        {
            *terms.entry(term).or_insert(0) += 1;
        }
        if terms.is_empty() {
            for term in raw_terms(&transaction.original_name)
                .into_iter()
                .chain(raw_terms(merchant))
            {
                *terms.entry(term).or_insert(0) += 1;
            }
        }
        Self { transaction, terms }
    }

    pub fn terms(&self) -> &BTreeMap<String, u32> {
        &self.terms
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }
}

/// Accumulates documents for every transaction fed into a detection session
#[derive(Debug, Default)]
pub struct Preprocessor<'a> {
    documents: Vec<Document<'a>>,
    /// Number of documents containing each term
    document_frequency: HashMap<String, usize>,
}

impl<'a> Preprocessor<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_transaction(&mut self, transaction: &'a Transaction) {
        let document = Document::new(transaction);
        for term in document.terms.keys() {
            *self.document_frequency.entry(term.clone()).or_insert(0) += 1;
        }
        self.documents.push(document);
    }

    /// Documents in insertion order, one per added transaction
    pub fn documents(&self) -> &[Document<'a>] {
        &self.documents
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn vocabulary_size(&self) -> usize {
        self.document_frequency.len()
    }

    /// Smoothed inverse document frequency; always >= 1.0
    pub fn idf(&self, term: &str) -> f64 {
        let total = self.documents.len() as f64;
        let frequency = self.document_frequency.get(term).copied().unwrap_or(0) as f64;
        ((1.0 + total) / (1.0 + frequency)).ln() + 1.0
    }

    /// Vectorize every document against the current corpus, in insertion order
    pub fn get_datums(&self) -> Vec<Datum<'a>> {
        self.documents
            .iter()
            .map(|document| {
                let mut vector: BTreeMap<String, f64> = document
                    .terms
                    .iter()
                    .map(|(term, count)| (term.clone(), f64::from(*count) * self.idf(term)))
                    .collect();

                let norm = vector.values().map(|w| w * w).sum::<f64>().sqrt();
                if norm > 0.0 {
                    for weight in vector.values_mut() {
                        *weight /= norm;
                    }
                }

                Datum::new(document.transaction, vector)
            })
            .collect()
    }
}
