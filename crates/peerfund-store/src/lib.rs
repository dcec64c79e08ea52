//! peerfund-store: File-backed store and configuration loading.

pub mod config;
pub mod error;
pub mod file;

pub use config::{load_config, load_config_from, PeerfundConfig};
pub use error::StoreError;
pub use file::FileStore;
