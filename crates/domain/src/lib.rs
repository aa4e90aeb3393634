//! # Tether Domain
//!
//! Data model for the resilient network-access layer.
//!
//! This crate contains:
//! - Request/response value types and the `(method, url)` request key
//! - Failure records, cache entries and the diagnostics snapshot
//! - The layer configuration (`ResilienceConfig`)
//! - The domain error type (`TetherError`) and `Result` alias
//!
//! ## Architecture
//! - Depends only on `tether-common` and serde/thiserror
//! - No I/O, no async runtime

pub mod config;
pub mod constants;
pub mod errors;
pub mod types;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
pub use types::*;
