//! Port interfaces for the outside world
//!
//! The core never performs I/O itself: requests go out through a
//! [`Transport`], the response cache is mirrored into a [`DurableStore`],
//! and connectivity transitions arrive from a [`ConnectivitySignal`].

use std::fmt;

use async_trait::async_trait;
use tether_domain::{Request, Response, Result};
use thiserror::Error;
use tokio::sync::watch;

/// Why the transport failed to obtain a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportErrorKind {
    /// Connection refused, reset or otherwise not established
    Connect,
    Timeout,
    /// Name resolution failure
    Dns,
    /// Request could not be built or sent
    Request,
    /// Response body could not be read
    Body,
    Other,
}

impl TransportErrorKind {
    /// Kinds that mean the network itself is unavailable.
    pub fn is_connectivity(&self) -> bool {
        matches!(self, Self::Connect | Self::Timeout | Self::Dns)
    }
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Connect => "connect",
            Self::Timeout => "timeout",
            Self::Dns => "dns",
            Self::Request => "request",
            Self::Body => "body",
            Self::Other => "other",
        };
        f.write_str(s)
    }
}

/// Failure to obtain any HTTP response.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} error: {message}")]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub message: String,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into() }
    }

    pub fn connect(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Connect, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Timeout, message)
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Other, message)
    }
}

/// Raw HTTP primitive wrapped by the resilient client.
///
/// Any HTTP status, including 4xx and 5xx, is returned as `Ok`; `Err` is
/// reserved for failures to obtain a response at all. Headers and body must
/// be forwarded untouched.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send a single request
    async fn send(&self, request: &Request) -> std::result::Result<Response, TransportError>;
}

/// Key/value string store used to persist the response cache.
#[async_trait]
pub trait DurableStore: Send + Sync {
    /// Read a value, `None` when the key was never written
    async fn get_item(&self, key: &str) -> Result<Option<String>>;

    /// Write (or overwrite) a value
    async fn set_item(&self, key: &str, value: String) -> Result<()>;

    /// Delete a value; deleting a missing key is not an error
    async fn remove_item(&self, key: &str) -> Result<()>;
}

/// Source of online/offline state.
///
/// The receiver's current value is the initial state; every later value is
/// a transition candidate (duplicates are filtered by the monitor).
pub trait ConnectivitySignal: Send + Sync {
    /// Subscribe to connectivity updates (`true` = online)
    fn subscribe(&self) -> watch::Receiver<bool>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connectivity_kinds() {
        assert!(TransportErrorKind::Connect.is_connectivity());
        assert!(TransportErrorKind::Timeout.is_connectivity());
        assert!(TransportErrorKind::Dns.is_connectivity());
        assert!(!TransportErrorKind::Body.is_connectivity());
        assert!(!TransportErrorKind::Other.is_connectivity());
    }

    #[test]
    fn test_display_includes_kind() {
        let err = TransportError::timeout("after 30s");
        assert_eq!(err.to_string(), "timeout error: after 30s");
    }
}
