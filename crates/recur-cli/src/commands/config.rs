//! Config command implementation

use std::path::Path;

use anyhow::{Context, Result};
use recur_core::config::default_config_path;
use recur_core::{ConfigSource, DetectionConfig};

pub fn cmd_config(config_path: Option<&Path>) -> Result<()> {
    let (config, source) =
        DetectionConfig::load(config_path).context("Failed to load detection config")?;

    println!("⚙️  Detection settings ({})", source);
    println!("   ─────────────────────────────");
    println!("   Clustering");
    println!("     epsilon:               {}", config.epsilon);
    println!("     min_neighbors:         {}", config.min_neighbors);
    println!("   Scoring");
    println!("     confidence_threshold:  {}", config.confidence_threshold);
    println!("     miss_penalty:          {}", config.miss_penalty);
    println!("     ended_fuzz_multiplier: {}", config.ended_fuzz_multiplier);

    if source == ConfigSource::Embedded {
        if let Some(path) = default_config_path() {
            println!();
            println!("💡 Override by creating {}", path.display());
        }
    }

    Ok(())
}
