//! Resilient request interceptor
//!
//! [`ResilientClient`] is the single entry point applications call instead
//! of the raw transport. Every request flows through the same pipeline:
//!
//! 1. cacheable requests are answered from a valid cache entry
//! 2. while offline, requests go to the offline queue
//! 3. otherwise the transport is called; successes are cached and clear
//!    the failure record, failures are classified, recorded and either
//!    retried with backoff or answered with fallback data
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use tether_core::ResilientClient;
//! # async fn example(transport: Arc<dyn tether_core::Transport>) -> tether_domain::Result<()> {
//! let client = ResilientClient::builder().transport(transport).build()?;
//! client.start().await?;
//!
//! let response = client.get("https://example.com/api/categories").await?;
//! if response.is_degraded() {
//!     // substitute data, not a live result
//! }
//!
//! client.shutdown().await?;
//! # Ok(())
//! # }
//! ```

mod builder;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use futures::future::{join_all, BoxFuture};
use futures::FutureExt;
use parking_lot::Mutex;
use serde::Serialize;
use tether_common::SharedClock;
use tether_domain::{
    Diagnostics, Request, RequestOptions, ResilienceConfig, Response, Result, TetherError,
};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

pub use self::builder::ResilientClientBuilder;
use crate::cache::ResponseCache;
use crate::classifier::{classify, FailureSignal};
use crate::fallback::FallbackTable;
use crate::ledger::FailureLedger;
use crate::network::{ConnectivityHandler, NetworkMonitor, NetworkState};
use crate::ports::{Transport, TransportError};
use crate::queue::OfflineQueue;
use crate::retry::RetryScheduler;

/// Longest response-body excerpt kept in failure messages.
const MAX_ERROR_BODY_CHARS: usize = 200;

/// How an offline caller is answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Delivery {
    /// Cache, fallback or `NoDataAvailable` right away
    Immediate,
    /// Wait for the replay after reconnection
    AwaitReplay,
}

/// A failed transport call.
#[derive(Debug)]
enum Failure {
    /// No response was obtained
    Transport(TransportError),
    /// A non-2xx response
    Status(Response),
}

/// Resilient HTTP client.
///
/// Cheap to clone; clones share all state.
#[derive(Clone)]
pub struct ResilientClient {
    inner: Arc<ClientInner>,
}

pub(crate) struct ClientInner {
    config: ResilienceConfig,
    transport: Arc<dyn Transport>,
    clock: SharedClock,
    cache: Arc<ResponseCache>,
    ledger: FailureLedger,
    scheduler: RetryScheduler,
    fallback: Arc<FallbackTable>,
    queue: OfflineQueue,
    network: Arc<NetworkState>,
    signal: Mutex<Option<watch::Receiver<bool>>>,
    cancel: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    started: AtomicBool,
}

impl ResilientClient {
    pub fn builder() -> ResilientClientBuilder {
        ResilientClientBuilder::new()
    }

    /// Hydrate the cache and spawn the background tasks.
    ///
    /// Requests can be executed before `start`, but connectivity changes,
    /// cache persistence and the TTL sweep only happen once it has run.
    ///
    /// # Errors
    /// Returns `TetherError::Internal` after [`ResilientClient::shutdown`].
    #[instrument(skip(self))]
    pub async fn start(&self) -> Result<()> {
        let inner = &self.inner;
        if inner.cancel.is_cancelled() {
            return Err(TetherError::Internal("client has been shut down".to_string()));
        }
        if inner.started.swap(true, Ordering::SeqCst) {
            debug!("Client already started");
            return Ok(());
        }

        let hydrated = if inner.config.enable_caching { inner.cache.hydrate().await } else { 0 };

        let mut tasks = Vec::new();
        if let Some(signal) = inner.signal.lock().take() {
            let handler: Arc<dyn ConnectivityHandler> =
                Arc::new(Reconnector { inner: Arc::downgrade(inner) });
            tasks.push(NetworkMonitor::spawn(
                Arc::clone(&inner.network),
                signal,
                handler,
                inner.cancel.clone(),
            ));
        }
        if inner.config.enable_caching {
            tasks.push(inner.cache.spawn_flusher(inner.cancel.clone()));
            tasks.push(
                inner
                    .cache
                    .spawn_sweeper(inner.config.cache_sweep_interval(), inner.cancel.clone()),
            );
        }
        inner.tasks.lock().extend(tasks);

        info!(hydrated, online = inner.network.is_online(), "Resilient client started");
        Ok(())
    }

    /// Stop background tasks, cancel pending retries and flush the cache.
    ///
    /// # Errors
    /// Returns the storage error if the final cache flush fails.
    #[instrument(skip(self))]
    pub async fn shutdown(&self) -> Result<()> {
        let inner = &self.inner;
        inner.cancel.cancel();
        let cancelled = inner.scheduler.cancel_all();

        let tasks = std::mem::take(&mut *inner.tasks.lock());
        for task in tasks {
            if let Err(e) = task.await {
                if !e.is_cancelled() {
                    warn!(error = %e, "Background task panicked");
                }
            }
        }

        if inner.config.enable_caching && inner.cache.is_dirty() {
            inner.cache.flush().await?;
        }
        info!(cancelled_retries = cancelled, "Resilient client shut down");
        Ok(())
    }

    /// Execute a request; offline callers are answered immediately.
    pub async fn execute(&self, url: impl Into<String>, options: RequestOptions) -> Result<Response> {
        self.send(Request::new(url, options)).await
    }

    /// Execute a request; offline callers wait for the replay outcome.
    pub async fn execute_deferred(
        &self,
        url: impl Into<String>,
        options: RequestOptions,
    ) -> Result<Response> {
        self.send_deferred(Request::new(url, options)).await
    }

    #[instrument(skip(self, request), fields(key = %request.key()))]
    pub async fn send(&self, request: Request) -> Result<Response> {
        dispatch(&self.inner, request, Delivery::Immediate).await
    }

    #[instrument(skip(self, request), fields(key = %request.key()))]
    pub async fn send_deferred(&self, request: Request) -> Result<Response> {
        dispatch(&self.inner, request, Delivery::AwaitReplay).await
    }

    pub async fn get(&self, url: impl Into<String>) -> Result<Response> {
        self.send(Request::get(url)).await
    }

    /// POST `body` as JSON.
    pub async fn post_json<T: Serialize>(
        &self,
        url: impl Into<String>,
        body: &T,
    ) -> Result<Response> {
        let options = RequestOptions::new().method(tether_domain::HttpMethod::Post).json(body)?;
        self.execute(url, options).await
    }

    /// Introspection snapshot.
    pub fn diagnostics(&self) -> Diagnostics {
        let inner = &self.inner;
        Diagnostics {
            failed_request_count: inner.ledger.len(),
            cached_entry_count: inner.cache.len(),
            queue_length: inner.queue.len(),
            is_online: inner.network.is_online(),
            errors: inner.ledger.records(),
        }
    }

    /// Empty the cache (memory and storage), failure ledger, offline queue
    /// and pending retries.
    ///
    /// # Errors
    /// Returns the storage error if the persisted cache cannot be removed.
    #[instrument(skip(self))]
    pub async fn clear_all(&self) -> Result<()> {
        let inner = &self.inner;
        let retries = inner.scheduler.cancel_all();
        let queued = inner.queue.clear();
        let failures = inner.ledger.len();
        inner.ledger.clear_all();
        inner.cache.clear().await?;
        info!(retries, queued, failures, "Cleared all resilience state");
        Ok(())
    }

    pub fn is_online(&self) -> bool {
        self.inner.network.is_online()
    }

    pub fn config(&self) -> &ResilienceConfig {
        &self.inner.config
    }

    /// Retry timers that have not fired yet.
    pub fn pending_retries(&self) -> usize {
        self.inner.scheduler.pending_count()
    }
}

async fn dispatch(inner: &Arc<ClientInner>, request: Request, delivery: Delivery) -> Result<Response> {
    if inner.config.enable_caching {
        if let Some(entry) = inner.cache.get(&request.url, request.method) {
            debug!("Serving response from cache");
            return Ok(entry.to_response());
        }
    }

    if inner.config.enable_offline_mode && !inner.network.is_online() {
        return match delivery {
            Delivery::Immediate => inner.queue.enqueue(request),
            Delivery::AwaitReplay => inner.queue.enqueue_and_wait(request)?.wait().await,
        };
    }

    attempt(Arc::clone(inner), request, 0).await
}

/// One transport call for `request`, followed by failure handling.
///
/// `retry_count` is 0 for the first call of a logical request.
fn attempt(
    inner: Arc<ClientInner>,
    request: Request,
    retry_count: u32,
) -> BoxFuture<'static, Result<Response>> {
    async move {
        match inner.transport.send(&request).await {
            Ok(response) if response.is_success() => {
                inner.record_success(&request, &response);
                Ok(response)
            }
            Ok(response) => {
                inner.handle_failure(request, retry_count, Failure::Status(response)).await
            }
            Err(error) => {
                inner.handle_failure(request, retry_count, Failure::Transport(error)).await
            }
        }
    }
    .boxed()
}

impl ClientInner {
    fn record_success(&self, request: &Request, response: &Response) {
        if self.config.enable_caching {
            self.cache.put(&request.url, request.method, response);
        }
        if self.ledger.clear(&request.key()) {
            debug!(key = %request.key(), "Request recovered; failure record cleared");
        }
    }

    async fn handle_failure(
        self: &Arc<Self>,
        request: Request,
        retry_count: u32,
        failure: Failure,
    ) -> Result<Response> {
        let is_online = self.network.is_online();
        let (signal, message) = match &failure {
            Failure::Transport(error) => {
                (FailureSignal::from_error(error, is_online), error.to_string())
            }
            Failure::Status(response) => {
                (FailureSignal::from_status(response.status, is_online), status_message(response))
            }
        };
        let status = signal.status;
        let classification = classify(&signal);
        let key = request.key();

        let record = self.ledger.record_failure(
            &request,
            classification,
            &message,
            status,
            self.clock.now_millis(),
        );
        warn!(
            key = %key,
            category = %record.category,
            status,
            retry_count,
            retryable = classification.retryable,
            error = %message,
            "Request failed"
        );

        let next = retry_count + 1;
        if classification.retryable && self.scheduler.should_retry(next) {
            let retry = attempt(Arc::clone(self), request, next);
            let ticket = self.scheduler.schedule(key, next, retry)?;
            return ticket.wait().await;
        }

        if let Some(response) = self.fallback_response(&request.url) {
            info!(key = %key, "Serving fallback data");
            return Ok(response);
        }

        if classification.retryable {
            Err(TetherError::RetryExhausted {
                key: key.to_string(),
                attempts: next,
                last_error: message,
            })
        } else {
            Err(classification.to_error(status, message))
        }
    }

    fn fallback_response(&self, url: &str) -> Option<Response> {
        if !self.config.enable_fallback_data {
            return None;
        }
        let payload = self.fallback.lookup(url)?;
        match Response::fallback(payload) {
            Ok(response) => Some(response),
            Err(e) => {
                warn!(error = %e, url, "Failed to encode fallback payload");
                None
            }
        }
    }

    /// Reconnection work: drain the offline queue, then re-attempt
    /// retryable failures still within budget.
    async fn resume(self: &Arc<Self>) {
        // Snapshot first so failures of the replays below are not re-run.
        let candidates = self.ledger.reattempt_candidates(self.config.max_retries);

        let report = self
            .queue
            .drain(|| self.network.is_online(), |request| attempt(Arc::clone(self), request, 0))
            .await;

        let mut tickets = Vec::new();
        for (request, retry_count) in candidates {
            if !self.network.is_online() {
                break;
            }
            let key = request.key();
            if report.replayed.contains(&key) || self.ledger.get(&key).is_none() {
                continue;
            }
            let retry = attempt(Arc::clone(self), request, retry_count);
            match self.scheduler.schedule_now(key.clone(), retry) {
                Ok(ticket) => tickets.push(ticket.wait()),
                Err(e) => warn!(key = %key, error = %e, "Failed to schedule re-attempt"),
            }
        }

        if tickets.is_empty() {
            return;
        }
        let outcomes = join_all(tickets).await;
        let recovered = outcomes.iter().filter(|outcome| outcome.is_ok()).count();
        info!(reattempted = outcomes.len(), recovered, "Re-attempted failed requests");
    }
}

/// Connectivity handler holding the client weakly so a dropped client
/// does not stay alive through its own monitor task.
struct Reconnector {
    inner: Weak<ClientInner>,
}

#[async_trait]
impl ConnectivityHandler for Reconnector {
    async fn on_online(&self) {
        if let Some(inner) = self.inner.upgrade() {
            inner.resume().await;
        }
    }

    async fn on_offline(&self) {
        if let Some(inner) = self.inner.upgrade() {
            debug!(queued = inner.queue.len(), "Routing new requests to the offline queue");
        }
    }
}

fn status_message(response: &Response) -> String {
    let text = response.text();
    let body = text.trim();
    if body.is_empty() {
        format!("HTTP {}", response.status)
    } else {
        let excerpt: String = body.chars().take(MAX_ERROR_BODY_CHARS).collect();
        format!("HTTP {}: {}", response.status, excerpt)
    }
}
