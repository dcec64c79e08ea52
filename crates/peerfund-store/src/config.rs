//! Configuration loading.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use peerfund_core::distributor::DistributionPolicy;
use peerfund_core::grading::GradingPolicy;
use peerfund_core::interest::InterestRates;
use peerfund_core::ledger::BudgetPolicy;
use peerfund_core::EngineConfig;

/// Top-level peerfund configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeerfundConfig {
    /// Dataset file used by the file store.
    #[serde(default = "default_data_path")]
    pub data_path: PathBuf,
    /// Max concurrent per-item reads in batch operations.
    #[serde(default = "default_parallelism")]
    pub parallelism: usize,
    /// Fixed distribution seed for reproducible assignments.
    #[serde(default)]
    pub seed: Option<u64>,
    /// Regrade after every accepted investment.
    #[serde(default = "default_regrade")]
    pub regrade_on_investment: bool,
    #[serde(default)]
    pub distribution: DistributionPolicy,
    #[serde(default)]
    pub budget: BudgetPolicy,
    #[serde(default)]
    pub grading: GradingPolicy,
    #[serde(default)]
    pub interest: InterestRates,
}

fn default_data_path() -> PathBuf {
    PathBuf::from("./peerfund-data.json")
}
fn default_parallelism() -> usize {
    4
}
fn default_regrade() -> bool {
    true
}

impl Default for PeerfundConfig {
    fn default() -> Self {
        Self {
            data_path: default_data_path(),
            parallelism: default_parallelism(),
            seed: None,
            regrade_on_investment: default_regrade(),
            distribution: DistributionPolicy::default(),
            budget: BudgetPolicy::default(),
            grading: GradingPolicy::default(),
            interest: InterestRates::default(),
        }
    }
}

impl PeerfundConfig {
    /// Engine settings derived from this configuration.
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            distribution: self.distribution.clone(),
            budget: self.budget.clone(),
            grading: self.grading.clone(),
            interest: self.interest.clone(),
            parallelism: self.parallelism.max(1),
            seed: self.seed,
            regrade_on_investment: self.regrade_on_investment,
        }
    }
}

/// Resolve environment variable references like `${VAR_NAME}` in a string.
fn resolve_env_vars(s: &str) -> String {
    let mut result = s.to_string();
    while let Some(start) = result.find("${") {
        if let Some(end) = result[start..].find('}') {
            let var_name = &result[start + 2..start + end];
            let value = std::env::var(var_name).unwrap_or_default();
            result = format!(
                "{}{}{}",
                &result[..start],
                value,
                &result[start + end + 1..]
            );
        } else {
            break;
        }
    }
    result
}

/// Load configuration from well-known paths.
///
/// Search order:
/// 1. `peerfund.toml` in the current directory
/// 2. `~/.config/peerfund/config.toml`
///
/// Environment variable overrides: `PEERFUND_DATA`, `PEERFUND_SEED`.
pub fn load_config() -> Result<PeerfundConfig> {
    load_config_from(None)
}

/// Load config from an explicit path, or search the default locations.
pub fn load_config_from(path: Option<&Path>) -> Result<PeerfundConfig> {
    let config_path = if let Some(p) = path {
        if p.exists() {
            Some(p.to_path_buf())
        } else {
            anyhow::bail!("config file not found: {}", p.display());
        }
    } else {
        let local = PathBuf::from("peerfund.toml");
        if local.exists() {
            Some(local)
        } else {
            dirs_path()
                .map(|dir| dir.join("config.toml"))
                .filter(|global| global.exists())
        }
    };

    let mut config = match config_path {
        Some(path) => {
            tracing::debug!("loading config from {}", path.display());
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read config: {}", path.display()))?;
            parse_config(&content)
                .with_context(|| format!("failed to parse config: {}", path.display()))?
        }
        None => PeerfundConfig::default(),
    };

    // Apply env var overrides
    if let Ok(data) = std::env::var("PEERFUND_DATA") {
        config.data_path = PathBuf::from(data);
    }
    if let Ok(seed) = std::env::var("PEERFUND_SEED") {
        config.seed = Some(
            seed.trim()
                .parse()
                .with_context(|| format!("PEERFUND_SEED is not a number: {seed}"))?,
        );
    }

    Ok(config)
}

/// Parse a TOML document and resolve `${VAR}` references in paths.
pub fn parse_config(content: &str) -> Result<PeerfundConfig> {
    let mut config: PeerfundConfig = toml::from_str(content)?;
    config.data_path = PathBuf::from(resolve_env_vars(&config.data_path.to_string_lossy()));
    Ok(config)
}

fn dirs_path() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|h| PathBuf::from(h).join(".config").join("peerfund"))
}
