//! peerfund-core: Evaluation distribution, grading, and interest engine.
//!
//! This crate defines the data model, the store seam, and the algorithms that
//! turn peer token investments into team grades and investor interest.

pub mod distributor;
pub mod engine;
pub mod error;
pub mod grading;
pub mod interest;
pub mod ledger;
pub mod memory;
pub mod model;
pub mod report;
pub mod statistics;
pub mod traits;
pub mod validator;

#[cfg(test)]
mod testing;

pub use engine::{EngineConfig, NoopReporter, PeerFundEngine, ProgressReporter};
pub use error::{EngineError, Result, ValidationError};
pub use memory::{Dataset, MemoryStore};
pub use traits::Store;
