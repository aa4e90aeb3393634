//! Outbound request types

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::TetherError;

/// HTTP verbs understood by the layer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    #[default]
    Get,
    Head,
    Post,
    Put,
    Patch,
    Delete,
    Options,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Head => "HEAD",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
            Self::Options => "OPTIONS",
        }
    }

    /// Only side-effect-free reads are cached.
    pub fn is_cacheable(&self) -> bool {
        matches!(self, Self::Get)
    }

    /// Parse an optional method string; absent or blank means `GET`.
    ///
    /// # Errors
    /// Returns `TetherError::Client` (status 0) for an unknown verb.
    pub fn normalize(raw: Option<&str>) -> Result<Self, TetherError> {
        match raw.map(str::trim) {
            None | Some("") => Ok(Self::Get),
            Some(value) => value.parse(),
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = TetherError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Ok(Self::Get);
        }
        match trimmed.to_ascii_uppercase().as_str() {
            "GET" => Ok(Self::Get),
            "HEAD" => Ok(Self::Head),
            "POST" => Ok(Self::Post),
            "PUT" => Ok(Self::Put),
            "PATCH" => Ok(Self::Patch),
            "DELETE" => Ok(Self::Delete),
            "OPTIONS" => Ok(Self::Options),
            other => Err(TetherError::Client {
                status: 0,
                message: format!("unsupported HTTP method: {other}"),
            }),
        }
    }
}

/// Per-call options. Headers and body are passed to the transport untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestOptions {
    pub method: Option<HttpMethod>,
    pub headers: BTreeMap<String, String>,
    pub body: Option<Vec<u8>>,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn method(mut self, method: HttpMethod) -> Self {
        self.method = Some(method);
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Serialise `value` as the body.
    ///
    /// Sets `content-type: application/json` only when the caller has not
    /// already chosen a content type.
    pub fn json<T: Serialize>(mut self, value: &T) -> Result<Self, TetherError> {
        self.body = Some(serde_json::to_vec(value)?);
        let has_content_type = self.headers.keys().any(|k| k.eq_ignore_ascii_case("content-type"));
        if !has_content_type {
            self.headers.insert("content-type".to_string(), "application/json".to_string());
        }
        Ok(self)
    }
}

/// A fully normalised request as handed to the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub url: String,
    pub method: HttpMethod,
    pub headers: BTreeMap<String, String>,
    pub body: Option<Vec<u8>>,
}

impl Request {
    pub fn new(url: impl Into<String>, options: RequestOptions) -> Self {
        Self {
            url: url.into(),
            method: options.method.unwrap_or_default(),
            headers: options.headers,
            body: options.body,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(url, RequestOptions::default())
    }

    pub fn key(&self) -> RequestKey {
        RequestKey::new(self.method, self.url.clone())
    }
}

/// Identity of a logical request: `(method, url)`.
///
/// Query strings are part of `url`; no normalisation is applied.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RequestKey {
    pub method: HttpMethod,
    pub url: String,
}

impl RequestKey {
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self { method, url: url.into() }
    }
}

impl fmt::Display for RequestKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.url)
    }
}
