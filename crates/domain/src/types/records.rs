//! Failure ledger records and cache entries

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tether_common::base64_bytes;

use super::request::{HttpMethod, RequestKey};
use super::response::{Response, ResponseSource};

/// Structured failure category produced by the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureCategory {
    /// No connectivity, DNS failure or timeout
    Network,
    /// 5xx
    Server,
    /// 4xx and anything else that will not improve on retry
    Client,
}

impl fmt::Display for FailureCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Network => "network",
            Self::Server => "server",
            Self::Client => "client",
        };
        f.write_str(s)
    }
}

/// Last known failure for a `(method, url)` key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureRecord {
    pub url: String,
    pub method: HttpMethod,
    pub message: String,
    pub status_code: Option<u16>,
    pub timestamp_ms: u64,
    /// Number of failures of this key seen after the first one
    pub retry_count: u32,
    pub category: FailureCategory,
    pub retryable: bool,
}

impl FailureRecord {
    pub fn key(&self) -> RequestKey {
        RequestKey::new(self.method, self.url.clone())
    }
}

/// Snapshot of a successful cacheable response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub url: String,
    pub method: HttpMethod,
    pub status: u16,
    #[serde(with = "base64_bytes")]
    pub payload: Vec<u8>,
    pub created_at_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<BTreeMap<String, String>>,
}

impl CacheEntry {
    pub fn from_response(key: &RequestKey, response: &Response, created_at_ms: u64) -> Self {
        Self {
            url: key.url.clone(),
            method: key.method,
            status: response.status,
            payload: response.body.clone(),
            created_at_ms,
            headers: (!response.headers.is_empty()).then(|| response.headers.clone()),
        }
    }

    pub fn key(&self) -> RequestKey {
        RequestKey::new(self.method, self.url.clone())
    }

    /// An entry is valid while `now - created_at_ms < ttl_ms`.
    pub fn is_expired(&self, now_ms: u64, ttl_ms: u64) -> bool {
        now_ms.saturating_sub(self.created_at_ms) >= ttl_ms
    }

    pub fn to_response(&self) -> Response {
        Response {
            status: self.status,
            headers: self.headers.clone().unwrap_or_default(),
            body: self.payload.clone(),
            source: ResponseSource::Cache,
        }
    }
}
