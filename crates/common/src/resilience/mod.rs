//! Resilience primitives
//!
//! Only the backoff math lives here; timer ownership and the retry loop are
//! domain concerns and live in `tether-core`.

pub mod backoff;

pub use backoff::BackoffStrategy;
