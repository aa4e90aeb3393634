//! Error plumbing between external crates and the Tether error types.

mod conversions;

pub use conversions::{InfraError, IntoTransportError};
