//! Error types used throughout the layer

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tether_common::{ErrorClassification, ErrorSeverity};
use thiserror::Error;

use crate::types::FailureCategory;

/// Main error type for Tether
///
/// `Clone` so a single retry outcome can be delivered to every caller that
/// was waiting on the same key.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "detail")]
pub enum TetherError {
    /// No connectivity, DNS failure or timeout
    #[error("Network error: {0}")]
    Network(String),

    /// 5xx response
    #[error("Server error ({status}): {message}")]
    Server { status: u16, message: String },

    /// 4xx response (or any other non-retryable response)
    #[error("Client error ({status}): {message}")]
    Client { status: u16, message: String },

    /// Retryable failure whose retry budget is used up
    #[error("Retries exhausted for {key} after {attempts} attempts: {last_error}")]
    RetryExhausted { key: String, attempts: u32, last_error: String },

    /// Offline with neither cached nor fallback data
    #[error("No connectivity and no cached data for {key}")]
    NoDataAvailable { key: String },

    #[error("Offline queue is full ({0} requests)")]
    QueueFull(usize),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Configuration error: {0}")]
    Config(String),

    /// Pending work dropped by shutdown or `clear_all`
    #[error("Cancelled: {0}")]
    Cancelled(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl TetherError {
    /// Failure category for errors produced by a request attempt.
    pub fn category(&self) -> Option<FailureCategory> {
        match self {
            Self::Network(_) => Some(FailureCategory::Network),
            Self::Server { .. } => Some(FailureCategory::Server),
            Self::Client { .. } => Some(FailureCategory::Client),
            _ => None,
        }
    }

    /// HTTP status carried by the error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Server { status, .. } | Self::Client { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for TetherError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl ErrorClassification for TetherError {
    fn is_retryable(&self) -> bool {
        match self {
            Self::Network(_) | Self::Server { .. } | Self::Storage(_) => true,
            Self::Client { status, .. } => matches!(status, 408 | 429),
            _ => false,
        }
    }

    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::NoDataAvailable { .. } | Self::Cancelled(_) => ErrorSeverity::Info,
            Self::Network(_) | Self::Server { .. } | Self::Client { .. } | Self::QueueFull(_) => {
                ErrorSeverity::Warning
            }
            Self::RetryExhausted { .. }
            | Self::Storage(_)
            | Self::Serialization(_)
            | Self::Config(_) => ErrorSeverity::Error,
            Self::Internal(_) => ErrorSeverity::Critical,
        }
    }

    fn is_critical(&self) -> bool {
        matches!(self, Self::Internal(_))
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::Client { status: 429, .. } => Some(Duration::from_secs(1)),
            _ => None,
        }
    }
}

/// Result type alias for Tether operations
pub type Result<T> = std::result::Result<T, TetherError>;
