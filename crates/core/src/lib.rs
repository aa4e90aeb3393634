//! # Tether Core
//!
//! Resilience logic - no infrastructure dependencies.
//!
//! This crate contains:
//! - The failure classifier and failure ledger
//! - Retry scheduling with one live timer per request key
//! - The TTL response cache, offline queue and fallback table
//! - The connectivity state machine
//! - [`ResilientClient`], the façade composing all of the above
//!
//! ## Architecture Principles
//! - Depends only on `tether-common` and `tether-domain`
//! - No HTTP, filesystem or database code
//! - All external collaborators via traits in [`ports`]

pub mod cache;
pub mod classifier;
pub mod client;
pub mod fallback;
pub mod ledger;
pub mod network;
pub mod ports;
pub mod queue;
pub mod retry;

pub use cache::ResponseCache;
pub use classifier::{classify, Classification, FailureSignal};
pub use client::{ResilientClient, ResilientClientBuilder};
pub use fallback::{FallbackRule, FallbackTable, MatchKind};
pub use ledger::FailureLedger;
pub use network::{ConnectivityHandler, NetworkMonitor, NetworkState, Transition};
pub use ports::{ConnectivitySignal, DurableStore, Transport, TransportError, TransportErrorKind};
pub use queue::{DrainReport, OfflineQueue, ReplayHandle};
pub use retry::{RetryAttempt, RetryPolicy, RetryScheduler, RetryTicket};
