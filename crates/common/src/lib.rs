//! Small, dependency-light building blocks shared across Tether crates.
//!
//! - [`clock`]: wall-clock abstraction so TTL logic can run against a
//!   [`MockClock`] in tests
//! - [`error`]: the [`ErrorClassification`] trait and [`ErrorSeverity`]
//! - [`resilience`]: backoff math for retry scheduling
//! - [`utils`]: serde helpers

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

pub mod clock;
pub mod error;
pub mod resilience;
pub mod utils;

pub use clock::{Clock, MockClock, SharedClock, SystemClock};
pub use error::{ErrorClassification, ErrorSeverity};
pub use resilience::BackoffStrategy;
pub use utils::serde::base64_bytes;
