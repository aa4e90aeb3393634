//! Common utility helpers
//!
//! - **[`serde`]**: serialization helpers for common data types

pub mod serde;
