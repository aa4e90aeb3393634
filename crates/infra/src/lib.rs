//! # Tether Infrastructure
//!
//! Infrastructure implementations of the `tether-core` ports.
//!
//! This crate contains:
//! - The reqwest-backed [`Transport`](tether_core::Transport)
//! - Durable stores (memory, file, SQLite) for the response cache
//! - Connectivity signals (manual and TCP probe)
//! - Configuration loading and tracing setup
//!
//! ## Architecture
//! - Implements traits defined in `tether-core`
//! - Contains all "impure" code (network, filesystem, database)

pub mod config;
pub mod connectivity;
pub mod errors;
pub mod http;
pub mod observability;
pub mod storage;

// Re-export commonly used items
pub use config::TetherSettings;
pub use connectivity::{ManualConnectivity, TcpProbeConnectivity};
pub use errors::InfraError;
pub use http::{ReqwestTransport, ReqwestTransportBuilder};
pub use observability::{init_tracing, LogFormat};
pub use storage::{FileStore, MemoryStore, SqliteStore};
