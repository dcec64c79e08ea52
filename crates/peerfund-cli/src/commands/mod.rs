pub mod distribute;
pub mod grade;
pub mod init;
pub mod interest;
pub mod invest;
pub mod status;
pub mod validate;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};

use peerfund_core::{PeerFundEngine, ProgressReporter};
use peerfund_store::{load_config_from, FileStore, PeerfundConfig};

/// Load the config, apply `--data`, and open the dataset.
pub fn open_engine(config_path: Option<&Path>, data: Option<PathBuf>) -> Result<PeerFundEngine> {
    let config = resolve_config(config_path, data)?;
    anyhow::ensure!(
        config.data_path.exists(),
        "no dataset at {}. Run `peerfund init` to create one.",
        config.data_path.display()
    );
    let store = FileStore::open(&config.data_path)
        .with_context(|| format!("failed to open dataset {}", config.data_path.display()))?;
    tracing::debug!("opened dataset {}", config.data_path.display());
    Ok(PeerFundEngine::new(Arc::new(store), config.engine_config()))
}

pub fn resolve_config(config_path: Option<&Path>, data: Option<PathBuf>) -> Result<PeerfundConfig> {
    let mut config = load_config_from(config_path)?;
    if let Some(data) = data {
        config.data_path = data;
    }
    anyhow::ensure!(config.parallelism >= 1, "parallelism must be at least 1");
    Ok(config)
}

/// Console progress reporter.
pub struct ConsoleReporter;

impl ProgressReporter for ConsoleReporter {
    fn on_item_complete(&self, _id: &str) {}

    fn on_item_skipped(&self, id: &str, reason: &str) {
        eprintln!("  SKIPPED: {id}: {reason}");
    }

    fn on_batch_complete(&self, total: usize, completed: usize, skipped: usize, elapsed: Duration) {
        eprintln!(
            "Complete: {completed}/{total} succeeded, {skipped} skipped ({:.1}s)",
            elapsed.as_secs_f64()
        );
    }
}
