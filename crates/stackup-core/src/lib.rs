//! stackup-core — shared types for the stackup bootstrap orchestrator.
//!
//! Holds the stack configuration (`stackup.toml` plus environment
//! overrides), the domain types every phase passes around, and the retry
//! policy used by readiness gates.

pub mod config;
pub mod error;
pub mod retry;
pub mod types;

pub use config::StackConfig;
pub use error::{ConfigError, ConfigResult};
pub use retry::{Backoff, RetryPolicy};
pub use types::*;
