use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

use crate::error::IncidentError;

/// TOML-backed configuration loaded from disk.
/// Secrets (DB URL) stay as env vars.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    #[serde(default)]
    pub clustering: ClusteringConfig,
}

/// Thresholds for the greedy incident builder.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClusteringConfig {
    /// Minimum cosine similarity to the pivot.
    pub similarity_threshold: f64,
    pub distance_threshold_meters: f64,
    /// Whole days between pivot and candidate.
    pub time_threshold_days: i64,
    /// Expected embedding length. Pairs involving a vector of another
    /// length are skipped.
    pub embedding_dim: Option<usize>,
    /// Run the per-district passes on the rayon pool.
    pub parallel_districts: bool,
}

impl Default for ClusteringConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.80,
            distance_threshold_meters: 200.0,
            time_threshold_days: 7,
            embedding_dim: Some(1024),
            parallel_districts: true,
        }
    }
}

impl ClusteringConfig {
    pub fn validate(&self) -> Result<(), IncidentError> {
        if !(-1.0..=1.0).contains(&self.similarity_threshold) {
            return Err(IncidentError::Config(format!(
                "similarity_threshold must be within [-1, 1], got {}",
                self.similarity_threshold
            )));
        }
        if !(self.distance_threshold_meters >= 0.0) {
            return Err(IncidentError::Config(format!(
                "distance_threshold_meters must be non-negative, got {}",
                self.distance_threshold_meters
            )));
        }
        if self.time_threshold_days < 0 {
            return Err(IncidentError::Config(format!(
                "time_threshold_days must be non-negative, got {}",
                self.time_threshold_days
            )));
        }
        if self.embedding_dim == Some(0) {
            return Err(IncidentError::Config(
                "embedding_dim must be positive when set".to_string(),
            ));
        }
        Ok(())
    }
}

/// Load, parse and validate a TOML config file.
pub fn load_config(path: &Path) -> Result<FileConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

pub fn parse_config(content: &str) -> Result<FileConfig> {
    let config: FileConfig = toml::from_str(content)?;
    config.clustering.validate()?;
    Ok(config)
}
