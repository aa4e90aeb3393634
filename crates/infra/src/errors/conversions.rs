//! Conversions from external infrastructure errors into Tether errors.

use std::error::Error as StdError;

use reqwest::Error as HttpError;
use rusqlite::Error as SqlError;
use tether_core::{TransportError, TransportErrorKind};
use tether_domain::TetherError;

/// Error newtype that keeps conversions on the infrastructure side and can be
/// converted back into the domain error.
#[derive(Debug)]
pub struct InfraError(pub TetherError);

impl From<InfraError> for TetherError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<TetherError> for InfraError {
    fn from(value: TetherError) -> Self {
        InfraError(value)
    }
}

/* -------------------------------------------------------------------------- */
/* rusqlite::Error → TetherError */
/* -------------------------------------------------------------------------- */

impl From<SqlError> for InfraError {
    fn from(value: SqlError) -> Self {
        use rusqlite::ffi::ErrorCode;
        use rusqlite::Error as RE;

        let mapped = match value {
            RE::SqliteFailure(err, maybe_message) => {
                let message = maybe_message.unwrap_or_default();
                match err.code {
                    ErrorCode::DatabaseBusy => TetherError::Storage("database is busy".into()),
                    ErrorCode::DatabaseLocked => TetherError::Storage("database is locked".into()),
                    ErrorCode::ReadOnly => TetherError::Storage("database is read-only".into()),
                    ErrorCode::DiskFull => TetherError::Storage("disk is full".into()),
                    _ => TetherError::Storage(format!(
                        "sqlite failure {:?} (code {}): {}",
                        err.code, err.extended_code, message
                    )),
                }
            }
            RE::FromSqlConversionFailure(_, _, cause) => {
                TetherError::Storage(format!("failed to convert sqlite value: {cause}"))
            }
            RE::InvalidColumnType(_, _, ty) => {
                TetherError::Storage(format!("invalid column type: {ty}"))
            }
            RE::Utf8Error(_) => TetherError::Storage("invalid UTF-8 returned from sqlite".into()),
            RE::InvalidPath(path) => {
                TetherError::Storage(format!("invalid database path: {}", path.to_string_lossy()))
            }
            other => TetherError::Storage(other.to_string()),
        };
        InfraError(mapped)
    }
}

/* -------------------------------------------------------------------------- */
/* std::io::Error → TetherError */
/* -------------------------------------------------------------------------- */

impl From<std::io::Error> for InfraError {
    fn from(value: std::io::Error) -> Self {
        use std::io::ErrorKind;

        let mapped = match value.kind() {
            ErrorKind::PermissionDenied => {
                TetherError::Storage(format!("permission denied: {value}"))
            }
            _ => TetherError::Storage(format!("I/O failure: {value}")),
        };
        InfraError(mapped)
    }
}

impl From<tokio::task::JoinError> for InfraError {
    fn from(value: tokio::task::JoinError) -> Self {
        InfraError(TetherError::Internal(format!("blocking task failed: {value}")))
    }
}

/* -------------------------------------------------------------------------- */
/* reqwest::Error → TransportError */
/* -------------------------------------------------------------------------- */

/// Map an HTTP library failure onto the transport port's error.
///
/// `TransportError` and `reqwest::Error` both live outside this crate, so the
/// conversion is a trait rather than a `From` impl.
pub trait IntoTransportError {
    fn into_transport(self) -> TransportError;
}

impl IntoTransportError for HttpError {
    fn into_transport(self) -> TransportError {
        let message = error_chain(&self);

        // Resolver failures surface as connect errors; check the chain first.
        let kind = if looks_like_dns(&message) {
            TransportErrorKind::Dns
        } else if self.is_timeout() {
            TransportErrorKind::Timeout
        } else if self.is_connect() {
            TransportErrorKind::Connect
        } else if self.is_body() || self.is_decode() {
            TransportErrorKind::Body
        } else if self.is_request() || self.is_builder() {
            TransportErrorKind::Request
        } else {
            TransportErrorKind::Other
        };

        TransportError::new(kind, message)
    }
}

fn error_chain(err: &HttpError) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

fn looks_like_dns(message: &str) -> bool {
    let lower = message.to_ascii_lowercase();
    ["dns error", "failed to lookup address", "name or service not known", "no such host"]
        .iter()
        .any(|marker| lower.contains(marker))
}

/* -------------------------------------------------------------------------- */
/* Tests */
/* -------------------------------------------------------------------------- */
