//! Recur Core Library
//!
//! Recurring transaction detection for a single account:
//! - Term-weight vectors over transaction descriptions
//! - Combined text/amount distance
//! - Density-based clustering (DBSCAN)
//! - Calendar recurrence rules and candidate windows
//! - Window scoring with hit/miss confidence and ended-series detection
//! - CSV import parsers for common bank exports
//! - Tunable detection config (TOML)

pub mod config;
pub mod dbscan;
pub mod detect;
pub mod distance;
pub mod error;
pub mod import;
pub mod models;
pub mod preprocess;
pub mod rules;
pub mod windows;

pub use config::{ConfigSource, DetectionConfig};
pub use dbscan::{Cluster, Datum, Dbscan};
pub use detect::{ClusterReport, Detection};
pub use error::{Error, Result};
pub use import::{detect_import_format, parse_csv, ImportFormat};
pub use models::{RecurringTransaction, Transaction, WindowType};
pub use preprocess::Preprocessor;
pub use rules::{MonthDay, RecurrenceRule};
pub use windows::{get_windows_for_date, Window};
