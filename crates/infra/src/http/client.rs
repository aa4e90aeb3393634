use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client as ReqwestClient, Method};
use tether_core::{Transport, TransportError, TransportErrorKind};
use tether_domain::{Request, Response, ResponseSource, Result, TetherError};
use tracing::debug;
use url::Url;

use crate::errors::IntoTransportError;

/// [`Transport`] implementation over a shared reqwest client.
///
/// Any HTTP status is returned as a [`Response`]; only failures to obtain a
/// response become [`TransportError`]s. Relative request URLs are joined onto
/// the configured base URL.
#[derive(Clone)]
pub struct ReqwestTransport {
    client: ReqwestClient,
    base_url: Option<Url>,
}

impl ReqwestTransport {
    /// Start building a new transport.
    pub fn builder() -> ReqwestTransportBuilder {
        ReqwestTransportBuilder::default()
    }

    /// Convenience constructor with default configuration.
    pub fn new() -> Result<Self> {
        Self::builder().build()
    }

    pub fn base_url(&self) -> Option<&Url> {
        self.base_url.as_ref()
    }

    fn resolve(&self, raw: &str) -> std::result::Result<Url, TransportError> {
        let parsed = match Url::parse(raw) {
            Ok(url) => Ok(url),
            Err(url::ParseError::RelativeUrlWithoutBase) => match &self.base_url {
                Some(base) => base.join(raw),
                None => {
                    return Err(TransportError::new(
                        TransportErrorKind::Request,
                        format!("relative URL '{raw}' requires a base URL"),
                    ))
                }
            },
            Err(err) => Err(err),
        };
        parsed.map_err(|err| {
            TransportError::new(TransportErrorKind::Request, format!("invalid URL '{raw}': {err}"))
        })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: &Request) -> std::result::Result<Response, TransportError> {
        let url = self.resolve(&request.url)?;
        let method = Method::from_bytes(request.method.as_str().as_bytes()).map_err(|err| {
            TransportError::new(TransportErrorKind::Request, format!("invalid method: {err}"))
        })?;

        let mut builder = self.client.request(method.clone(), url.clone());
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        debug!(%method, %url, "sending HTTP request");
        let response = builder.send().await.map_err(|err| {
            debug!(%method, %url, error = %err, "HTTP request failed");
            err.into_transport()
        })?;

        let status = response.status().as_u16();
        let headers = collect_headers(response.headers());
        let body = response.bytes().await.map_err(IntoTransportError::into_transport)?;
        debug!(%method, %url, status, bytes = body.len(), "received HTTP response");

        Ok(Response { status, headers, body: body.to_vec(), source: ResponseSource::Network })
    }
}

/// Repeated headers are folded into one comma-separated value.
fn collect_headers(map: &HeaderMap) -> BTreeMap<String, String> {
    let mut headers: BTreeMap<String, String> = BTreeMap::new();
    for (name, value) in map {
        let Ok(value) = value.to_str() else {
            continue;
        };
        headers
            .entry(name.as_str().to_string())
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(value);
            })
            .or_insert_with(|| value.to_string());
    }
    headers
}

/// Builder for [`ReqwestTransport`].
#[derive(Debug)]
pub struct ReqwestTransportBuilder {
    timeout: Duration,
    connect_timeout: Option<Duration>,
    user_agent: Option<String>,
    default_headers: BTreeMap<String, String>,
    base_url: Option<String>,
}

impl Default for ReqwestTransportBuilder {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            connect_timeout: None,
            user_agent: None,
            default_headers: BTreeMap::new(),
            base_url: None,
        }
    }
}

impl ReqwestTransportBuilder {
    /// Total per-request timeout (default 30 s).
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    /// Header sent with every request unless the request sets it itself.
    pub fn default_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_headers.insert(name.into(), value.into());
        self
    }

    /// Base URL used to resolve relative request URLs.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// # Errors
    /// Returns `TetherError::Config` for an unparsable base URL or header, or
    /// when the underlying client cannot be constructed.
    pub fn build(self) -> Result<ReqwestTransport> {
        let base_url = self
            .base_url
            .map(|raw| {
                Url::parse(&raw)
                    .map_err(|err| TetherError::Config(format!("invalid base URL '{raw}': {err}")))
            })
            .transpose()?;

        let mut headers = HeaderMap::new();
        for (name, value) in &self.default_headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|err| TetherError::Config(format!("invalid header name '{name}': {err}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|err| TetherError::Config(format!("invalid header value: {err}")))?;
            headers.insert(name, value);
        }

        let mut builder =
            ReqwestClient::builder().timeout(self.timeout).default_headers(headers).no_proxy();

        if let Some(timeout) = self.connect_timeout {
            builder = builder.connect_timeout(timeout);
        }

        if let Some(agent) = self.user_agent {
            builder = builder.user_agent(agent);
        }

        let client = builder
            .build()
            .map_err(|err| TetherError::Config(format!("failed to build HTTP client: {err}")))?;

        Ok(ReqwestTransport { client, base_url })
    }
}
