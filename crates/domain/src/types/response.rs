//! Response types

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tether_common::base64_bytes;

use crate::errors::Result;

/// Where a response came from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseSource {
    #[default]
    Network,
    Cache,
    Fallback,
}

/// A response returned by the layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    pub status: u16,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(with = "base64_bytes")]
    pub body: Vec<u8>,
    #[serde(default)]
    pub source: ResponseSource,
}

impl Response {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers: BTreeMap::new(),
            body: body.into(),
            source: ResponseSource::Network,
        }
    }

    /// 200 response carrying `value` as a JSON body.
    pub fn from_json(status: u16, value: &serde_json::Value) -> Result<Self> {
        let mut response = Self::new(status, serde_json::to_vec(value)?);
        response.headers.insert("content-type".to_string(), "application/json".to_string());
        Ok(response)
    }

    /// Degraded response built from a fallback payload.
    pub fn fallback(payload: &serde_json::Value) -> Result<Self> {
        Ok(Self::from_json(200, payload)?.with_source(ResponseSource::Fallback))
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_source(mut self, source: ResponseSource) -> Self {
        self.source = source;
        self
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// True when the payload is substitute data rather than a live or cached result.
    pub fn is_degraded(&self) -> bool {
        self.source == ResponseSource::Fallback
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}
