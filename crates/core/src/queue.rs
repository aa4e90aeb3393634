//! Offline request queue
//!
//! Requests issued while offline are buffered in FIFO order and replayed
//! one at a time when connectivity returns. A caller is answered right away
//! (cache hit, fallback payload or `NoDataAvailable`) unless it asked to
//! wait for the replay through [`OfflineQueue::enqueue_and_wait`].

use std::collections::VecDeque;
use std::sync::Arc;

use futures::future::BoxFuture;
use parking_lot::Mutex;
use tether_common::SharedClock;
use tether_domain::{Request, RequestKey, Response, Result, TetherError};
use tokio::sync::oneshot;
use tracing::{debug, info, instrument, warn};

use crate::cache::ResponseCache;
use crate::fallback::FallbackTable;

/// A request captured while offline.
#[derive(Debug)]
pub struct QueuedRequest {
    pub request: Request,
    pub enqueued_at_ms: u64,
    listener: Option<oneshot::Sender<Result<Response>>>,
}

/// Outcome of a replay for a caller that chose to wait.
#[derive(Debug)]
pub struct ReplayHandle {
    inner: ReplayState,
}

#[derive(Debug)]
enum ReplayState {
    Ready(Response),
    Pending(oneshot::Receiver<Result<Response>>),
}

impl ReplayHandle {
    /// True when the request was answered without queuing.
    pub fn is_ready(&self) -> bool {
        matches!(self.inner, ReplayState::Ready(_))
    }

    /// Wait for the replay outcome.
    ///
    /// Resolves with `TetherError::Cancelled` if the queue is cleared first.
    pub async fn wait(self) -> Result<Response> {
        match self.inner {
            ReplayState::Ready(response) => Ok(response),
            ReplayState::Pending(receiver) => receiver.await.unwrap_or_else(|_| {
                Err(TetherError::Cancelled("queued request dropped before replay".to_string()))
            }),
        }
    }
}

/// Summary of one drain pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrainReport {
    pub succeeded: usize,
    pub failed: usize,
    /// Items left queued because connectivity dropped mid-drain
    pub remaining: usize,
    /// Keys replayed by this pass, in replay order
    pub replayed: Vec<RequestKey>,
}

/// FIFO buffer of deferred requests.
pub struct OfflineQueue {
    items: Mutex<VecDeque<QueuedRequest>>,
    capacity: usize,
    clock: SharedClock,
    cache: Option<Arc<ResponseCache>>,
    fallback: Option<Arc<FallbackTable>>,
    drain_lock: tokio::sync::Mutex<()>,
}

impl OfflineQueue {
    /// `cache` and `fallback` are `None` when the matching feature is disabled.
    pub fn new(
        capacity: usize,
        clock: SharedClock,
        cache: Option<Arc<ResponseCache>>,
        fallback: Option<Arc<FallbackTable>>,
    ) -> Self {
        Self {
            items: Mutex::new(VecDeque::new()),
            capacity,
            clock,
            cache,
            fallback,
            drain_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Queue `request` and answer the caller immediately.
    ///
    /// A valid cache entry short-circuits without queuing. Otherwise the
    /// request is queued and the caller gets the fallback payload, or
    /// `NoDataAvailable` when there is none. The eventual replay result
    /// only refreshes the cache.
    ///
    /// # Errors
    /// `QueueFull` when at capacity, otherwise `NoDataAvailable`.
    pub fn enqueue(&self, request: Request) -> Result<Response> {
        if let Some(hit) = self.cached(&request) {
            return Ok(hit);
        }

        let key = request.key();
        let url = request.url.clone();
        self.push(request, None)?;

        match self.fallback_response(&url) {
            Some(response) => {
                debug!(key = %key, "Queued request answered with fallback data");
                Ok(response)
            }
            None => Err(TetherError::NoDataAvailable { key: key.to_string() }),
        }
    }

    /// Queue `request` and hand back a handle resolving with the replay outcome.
    ///
    /// # Errors
    /// `QueueFull` when at capacity.
    pub fn enqueue_and_wait(&self, request: Request) -> Result<ReplayHandle> {
        if let Some(hit) = self.cached(&request) {
            return Ok(ReplayHandle { inner: ReplayState::Ready(hit) });
        }

        let (sender, receiver) = oneshot::channel();
        self.push(request, Some(sender))?;
        Ok(ReplayHandle { inner: ReplayState::Pending(receiver) })
    }

    fn cached(&self, request: &Request) -> Option<Response> {
        let cache = self.cache.as_ref()?;
        cache.get(&request.url, request.method).map(|entry| entry.to_response())
    }

    fn fallback_response(&self, url: &str) -> Option<Response> {
        let payload = self.fallback.as_ref()?.lookup(url)?;
        match Response::fallback(payload) {
            Ok(response) => Some(response),
            Err(e) => {
                warn!(error = %e, url, "Failed to encode fallback payload");
                None
            }
        }
    }

    fn push(
        &self,
        request: Request,
        listener: Option<oneshot::Sender<Result<Response>>>,
    ) -> Result<usize> {
        let mut items = self.items.lock();
        if items.len() >= self.capacity {
            warn!(key = %request.key(), capacity = self.capacity, "Offline queue full");
            return Err(TetherError::QueueFull(self.capacity));
        }
        debug!(key = %request.key(), position = items.len(), "Queued request while offline");
        items.push_back(QueuedRequest {
            request,
            enqueued_at_ms: self.clock.now_millis(),
            listener,
        });
        Ok(items.len())
    }

    /// Replay queued requests in FIFO order, one at a time.
    ///
    /// Each replay (including its retries) settles before the next one
    /// starts. Draining stops as soon as `is_online` reports offline; the
    /// rest stay queued. Concurrent calls wait for the running drain.
    #[instrument(skip_all)]
    pub async fn drain<O, R>(&self, is_online: O, mut replay: R) -> DrainReport
    where
        O: Fn() -> bool,
        R: FnMut(Request) -> BoxFuture<'static, Result<Response>>,
    {
        let _guard = self.drain_lock.lock().await;
        let mut report = DrainReport::default();

        loop {
            if !is_online() {
                break;
            }
            let Some(item) = self.items.lock().pop_front() else {
                break;
            };

            let key = item.request.key();
            let waited_ms = self.clock.now_millis().saturating_sub(item.enqueued_at_ms);
            debug!(key = %key, waited_ms, "Replaying queued request");

            let outcome = replay(item.request).await;
            match &outcome {
                Ok(_) => report.succeeded += 1,
                Err(e) => {
                    report.failed += 1;
                    warn!(key = %key, error = %e, "Queued request replay failed");
                }
            }
            report.replayed.push(key);

            if let Some(listener) = item.listener {
                let _ = listener.send(outcome);
            }
        }

        report.remaining = self.len();
        if !report.replayed.is_empty() {
            info!(
                succeeded = report.succeeded,
                failed = report.failed,
                remaining = report.remaining,
                "Offline queue drained"
            );
        }
        report
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }

    /// Keys currently queued, front first.
    pub fn keys(&self) -> Vec<RequestKey> {
        self.items.lock().iter().map(|item| item.request.key()).collect()
    }

    /// Drop every queued request; waiting callers resolve as cancelled.
    pub fn clear(&self) -> usize {
        let mut items = self.items.lock();
        let count = items.len();
        items.clear();
        count
    }
}
