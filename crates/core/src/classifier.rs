//! Failure classification
//!
//! Maps a failed attempt (transport error, non-2xx status, connectivity) to
//! a [`FailureCategory`] and a retry decision. Classification is a pure
//! function of its input.

use tether_domain::{FailureCategory, TetherError};

use crate::ports::TransportError;

/// Substrings that identify connectivity failures in untyped error text.
const NETWORK_MARKERS: &[&str] = &[
    "network",
    "connect",
    "timed out",
    "timeout",
    "dns",
    "unreachable",
    "connection reset",
    "connection refused",
    "fetch",
];

/// Statuses that are retried even though they are 4xx.
const RETRYABLE_CLIENT_STATUSES: &[u16] = &[408, 429];

/// Everything known about a failed attempt.
#[derive(Debug, Clone, Copy, Default)]
pub struct FailureSignal<'a> {
    pub error: Option<&'a TransportError>,
    pub status: Option<u16>,
    pub is_online: bool,
}

impl<'a> FailureSignal<'a> {
    pub fn from_status(status: u16, is_online: bool) -> Self {
        Self { error: None, status: Some(status), is_online }
    }

    pub fn from_error(error: &'a TransportError, is_online: bool) -> Self {
        Self { error: Some(error), status: None, is_online }
    }
}

/// Result of [`classify`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub category: FailureCategory,
    pub retryable: bool,
}

impl Classification {
    /// Build the caller-facing error for a failure that will not be retried.
    pub fn to_error(self, status: Option<u16>, message: impl Into<String>) -> TetherError {
        let message = message.into();
        match self.category {
            FailureCategory::Network => TetherError::Network(message),
            FailureCategory::Server => {
                TetherError::Server { status: status.unwrap_or(500), message }
            }
            FailureCategory::Client => TetherError::Client { status: status.unwrap_or(0), message },
        }
    }
}

/// Classify a failed attempt.
///
/// A status in 500..=599 is `server`, 400..=499 is `client`. Without a
/// status the failure is `network` when the transport reports a
/// connectivity kind, its message carries a connectivity marker, or the
/// client is offline. Anything else is a non-retryable `client` failure.
pub fn classify(signal: &FailureSignal<'_>) -> Classification {
    let category = match signal.status {
        Some(status) if (500..=599).contains(&status) => FailureCategory::Server,
        Some(status) if (400..=499).contains(&status) => FailureCategory::Client,
        Some(_) => FailureCategory::Client,
        None if is_connectivity_failure(signal) => FailureCategory::Network,
        None => FailureCategory::Client,
    };

    let retryable = matches!(category, FailureCategory::Network | FailureCategory::Server)
        || signal.status.is_some_and(|s| RETRYABLE_CLIENT_STATUSES.contains(&s));

    Classification { category, retryable }
}

fn is_connectivity_failure(signal: &FailureSignal<'_>) -> bool {
    if !signal.is_online {
        return true;
    }
    match signal.error {
        Some(err) => err.kind.is_connectivity() || has_network_marker(&err.message),
        None => false,
    }
}

fn has_network_marker(message: &str) -> bool {
    let lower = message.to_ascii_lowercase();
    NETWORK_MARKERS.iter().any(|marker| lower.contains(marker))
}
