//! Detection tuning
//!
//! The pipeline constants are named here and bundled into a
//! `DetectionConfig` that is handed to the detector (and from there to the
//! clustering engine), so tests and tuning runs can vary them freely.
//!
//! ## Configuration Resolution
//!
//! 1. An explicit path (`--config`), which must exist
//! 2. Override in data dir (~/.local/share/recur/config/detection.toml)
//! 3. Embedded defaults (compiled into binary)

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use crate::error::{Error, Result};

/// Neighbourhood radius for clustering, in combined text/amount distance
pub const EPSILON: f64 = 0.30;

/// Other points required within `EPSILON` for a core point
pub const MIN_NEIGHBORS: usize = 1;

/// A series is only reported when its best window scores above this
pub const CONFIDENCE_THRESHOLD: f64 = 0.65;

/// Weight of one missed occurrence against one hit
pub const MISS_PENALTY: f64 = 1.1;

/// A series has ended once its predicted next date is older than this many
/// tolerance windows before the latest observed transaction
pub const ENDED_FUZZ_MULTIPLIER: u32 = 2;

/// Upper bound accepted for `ended_fuzz_multiplier`
pub const MAX_ENDED_FUZZ_MULTIPLIER: u32 = 100;

/// Embedded default config (compiled into binary)
const DEFAULT_CONFIG: &str = include_str!("../../../config/detection.toml");

/// Tuning values for a detection session
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionConfig {
    pub epsilon: f64,
    pub min_neighbors: usize,
    pub confidence_threshold: f64,
    pub miss_penalty: f64,
    pub ended_fuzz_multiplier: u32,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            epsilon: EPSILON,
            min_neighbors: MIN_NEIGHBORS,
            confidence_threshold: CONFIDENCE_THRESHOLD,
            miss_penalty: MISS_PENALTY,
            ended_fuzz_multiplier: ENDED_FUZZ_MULTIPLIER,
        }
    }
}

/// Where the active configuration came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    File(PathBuf),
    Embedded,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::File(path) => write!(f, "{}", path.display()),
            Self::Embedded => write!(f, "built-in defaults"),
        }
    }
}

impl DetectionConfig {
    /// Load configuration (explicit path, then data-dir override, then default)
    pub fn load(override_path: Option<&Path>) -> Result<(Self, ConfigSource)> {
        let source = resolve_source(override_path)?;
        let content = match &source {
            ConfigSource::File(path) => fs::read_to_string(path)
                .map_err(|e| Error::Config(format!("Failed to read {}: {}", path.display(), e)))?,
            ConfigSource::Embedded => DEFAULT_CONFIG.to_string(),
        };

        let config = Self::from_toml(&content)?;
        debug!("Loaded detection config from {}", source);
        Ok((config, source))
    }

    /// Parse a TOML document; missing keys keep their defaults
    pub fn from_toml(content: &str) -> Result<Self> {
        let raw: RawConfig = toml::from_str(content)
            .map_err(|e| Error::Config(format!("Invalid config TOML: {}", e)))?;

        let mut config = Self::default();

        if let Some(clustering) = raw.clustering {
            if let Some(epsilon) = clustering.epsilon {
                config.epsilon = epsilon;
            }
            if let Some(min_neighbors) = clustering.min_neighbors {
                config.min_neighbors = min_neighbors;
            }
        }

        if let Some(scoring) = raw.scoring {
            if let Some(threshold) = scoring.confidence_threshold {
                config.confidence_threshold = threshold;
            }
            if let Some(penalty) = scoring.miss_penalty {
                config.miss_penalty = penalty;
            }
            if let Some(multiplier) = scoring.ended_fuzz_multiplier {
                config.ended_fuzz_multiplier = multiplier;
            }
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.epsilon.is_finite() || self.epsilon <= 0.0 {
            return Err(Error::Config(format!(
                "epsilon must be a positive number, got {}",
                self.epsilon
            )));
        }
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(Error::Config(format!(
                "confidence_threshold must be between 0 and 1, got {}",
                self.confidence_threshold
            )));
        }
        if !self.miss_penalty.is_finite() || self.miss_penalty < 0.0 {
            return Err(Error::Config(format!(
                "miss_penalty must be zero or positive, got {}",
                self.miss_penalty
            )));
        }
        if self.ended_fuzz_multiplier > MAX_ENDED_FUZZ_MULTIPLIER {
            return Err(Error::Config(format!(
                "ended_fuzz_multiplier must be at most {}, got {}",
                MAX_ENDED_FUZZ_MULTIPLIER, self.ended_fuzz_multiplier
            )));
        }
        Ok(())
    }
}

/// Get the default config override path
pub fn default_config_path() -> Option<PathBuf> {
    dirs::data_local_dir().map(|d| d.join("recur").join("config").join("detection.toml"))
}

fn resolve_source(override_path: Option<&Path>) -> Result<ConfigSource> {
    if let Some(path) = override_path {
        if !path.exists() {
            return Err(Error::Config(format!(
                "Config file not found: {}",
                path.display()
            )));
        }
        return Ok(ConfigSource::File(path.to_path_buf()));
    }

    match default_config_path() {
        Some(path) if path.exists() => Ok(ConfigSource::File(path)),
        _ => Ok(ConfigSource::Embedded),
    }
}

/// Raw config structure for TOML parsing
#[derive(Debug, Deserialize)]
struct RawConfig {
    clustering: Option<RawClustering>,
    scoring: Option<RawScoring>,
}

#[derive(Debug, Deserialize)]
struct RawClustering {
    epsilon: Option<f64>,
    min_neighbors: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct RawScoring {
    confidence_threshold: Option<f64>,
    miss_penalty: Option<f64>,
    ended_fuzz_multiplier: Option<u32>,
}
