//! Error classification primitives
//!
//! Every error type that crosses a crate boundary in Tether implements
//! [`ErrorClassification`], so retry and logging decisions can be made without
//! matching on concrete variants:
//!
//! - **`is_retryable()`**: can this operation be retried?
//! - **`severity()`**: how serious is this error?
//! - **`is_critical()`**: does this require immediate attention?
//! - **`retry_after()`**: suggested retry delay, if any
//!
//! | Level | Use Case | Examples |
//! |-------|----------|----------|
//! | **Info** | Expected conditions | No cached data while offline |
//! | **Warning** | Degraded but operational | Rate limiting, transient failures |
//! | **Error** | Failure requiring attention | Exhausted retries, invalid config |
//! | **Critical** | System integrity at risk | Internal invariant violations |

use std::fmt;
use std::time::Duration;

/// Standard interface for classifying errors by their characteristics.
pub trait ErrorClassification {
    /// Check if this error is retryable
    ///
    /// Retryable errors are transient issues that may succeed if attempted
    /// again (timeouts, refused connections, 5xx responses, rate limiting).
    fn is_retryable(&self) -> bool;

    /// Get the error severity level
    fn severity(&self) -> ErrorSeverity;

    /// Check if this is a critical error requiring immediate attention
    fn is_critical(&self) -> bool;

    /// Get the suggested retry delay if applicable
    fn retry_after(&self) -> Option<Duration>;
}

/// Error severity levels for monitoring and alerting
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    /// Informational, typically for debugging
    Info,
    /// Warning, should be monitored but not critical
    Warning,
    /// Error, requires attention and action
    Error,
    /// Critical, immediate action required
    Critical,
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "INFO"),
            Self::Warning => write!(f, "WARN"),
            Self::Error => write!(f, "ERROR"),
            Self::Critical => write!(f, "CRITICAL"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_ordering() {
        assert!(ErrorSeverity::Info < ErrorSeverity::Warning);
        assert!(ErrorSeverity::Warning < ErrorSeverity::Error);
        assert!(ErrorSeverity::Error < ErrorSeverity::Critical);
    }

    #[test]
    fn test_severity_display() {
        assert_eq!(ErrorSeverity::Info.to_string(), "INFO");
        assert_eq!(ErrorSeverity::Warning.to_string(), "WARN");
        assert_eq!(ErrorSeverity::Critical.to_string(), "CRITICAL");
    }
}
