//! Store error types.

use std::path::PathBuf;

use thiserror::Error;

use peerfund_core::EngineError;

/// Errors that can occur when reading or writing the data file.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The data file could not be read.
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The data file is not a valid dataset.
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    /// The dataset could not be written back.
    #[error("failed to write {path}: {message}")]
    Write { path: PathBuf, message: String },
}

impl From<StoreError> for EngineError {
    fn from(e: StoreError) -> Self {
        match e {
            // An unreadable data file means nothing can be served.
            StoreError::Read { .. } | StoreError::Parse { .. } => {
                EngineError::StoreUnavailable(e.to_string())
            }
            StoreError::Write { .. } => EngineError::Store(e.to_string()),
        }
    }
}
