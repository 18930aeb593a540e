//! Experiment configuration: kernel settings loaded from a JSON file.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use sieve_kernel::{ReductionConfig, SieveConfig};

/// Top-level configuration file.
///
/// Every section is optional; missing sections and fields fall back to the
/// kernel defaults.
///
/// ```json
/// { "sieve": { "shard_capacity": 500 }, "reduction": { "task_count": 8 } }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    /// Pipeline settings
    pub sieve: SieveConfig,
    /// Reduction settings
    pub reduction: ReductionConfig,
}

impl ExperimentConfig {
    /// Load and validate a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config: Self = serde_json::from_str(&json)
            .with_context(|| format!("failed to parse config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate both sections.
    pub fn validate(&self) -> Result<()> {
        self.sieve.validate().context("invalid sieve settings")?;
        self.reduction
            .validate()
            .context("invalid reduction settings")?;
        Ok(())
    }
}
