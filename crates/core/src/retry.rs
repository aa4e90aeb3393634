//! Retry scheduling with one live timer per request key
//!
//! A retry is a delayed task running a boxed attempt future. Scheduling a
//! retry for a key that still has a pending (not yet fired) timer aborts
//! that timer and moves its waiters onto the replacement, so every caller
//! receives exactly one outcome and no key ever has two timers in flight.
//! A timer that has fired is no longer pending and runs to completion.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use parking_lot::Mutex;
use tether_common::BackoffStrategy;
use tether_domain::{RequestKey, ResilienceConfig, Response, Result, TetherError};
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// A deferred re-attempt of a request.
pub type RetryAttempt = BoxFuture<'static, Result<Response>>;

type Waiter = oneshot::Sender<Result<Response>>;

/// Retry budget and backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff: BackoffStrategy,
}

impl RetryPolicy {
    pub fn from_config(config: &ResilienceConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            backoff: BackoffStrategy::from_parts(
                config.retry_delay(),
                config.exponential_backoff,
                config.max_retry_delay(),
            ),
        }
    }
}

struct PendingRetry {
    id: u64,
    handle: JoinHandle<()>,
    waiters: Vec<Waiter>,
}

/// Handle to the eventual outcome of a scheduled retry.
#[derive(Debug)]
pub struct RetryTicket {
    delay: Duration,
    receiver: oneshot::Receiver<Result<Response>>,
}

impl RetryTicket {
    /// Delay the retry was scheduled with.
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Wait for the outcome.
    ///
    /// Resolves with `TetherError::Cancelled` when the timer is dropped by
    /// [`RetryScheduler::cancel_all`].
    pub async fn wait(self) -> Result<Response> {
        self.receiver
            .await
            .unwrap_or_else(|_| Err(TetherError::Cancelled("retry cancelled".to_string())))
    }
}

/// Delayed re-attempts keyed by `(method, url)`.
pub struct RetryScheduler {
    policy: RetryPolicy,
    pending: Arc<Mutex<HashMap<RequestKey, PendingRetry>>>,
    next_id: AtomicU64,
}

impl RetryScheduler {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy, pending: Arc::new(Mutex::new(HashMap::new())), next_id: AtomicU64::new(1) }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Whether retry number `retry_count` (1-based) is within budget.
    pub fn should_retry(&self, retry_count: u32) -> bool {
        retry_count <= self.policy.max_retries
    }

    /// Backoff delay for retry number `retry_count`, capped at the ceiling.
    pub fn delay_for(&self, retry_count: u32) -> Duration {
        self.policy.backoff.delay_for(retry_count)
    }

    /// Schedule `attempt` as retry number `retry_count` for `key`.
    ///
    /// # Errors
    /// Returns `TetherError::Internal` when called outside a Tokio runtime.
    pub fn schedule(
        &self,
        key: RequestKey,
        retry_count: u32,
        attempt: RetryAttempt,
    ) -> Result<RetryTicket> {
        let delay = self.delay_for(retry_count);
        debug!(key = %key, retry_count, delay_ms = delay.as_millis() as u64, "Scheduling retry");
        self.spawn_timer(key, delay, attempt)
    }

    /// Replace any pending timer for `key` with an immediate attempt.
    pub fn schedule_now(&self, key: RequestKey, attempt: RetryAttempt) -> Result<RetryTicket> {
        debug!(key = %key, "Scheduling immediate re-attempt");
        self.spawn_timer(key, Duration::ZERO, attempt)
    }

    fn spawn_timer(
        &self,
        key: RequestKey,
        delay: Duration,
        attempt: RetryAttempt,
    ) -> Result<RetryTicket> {
        let runtime = Handle::try_current().map_err(|e| {
            TetherError::Internal(format!("retry scheduled outside a tokio runtime: {e}"))
        })?;

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = oneshot::channel();

        let mut pending = self.pending.lock();
        let mut waiters = match pending.remove(&key) {
            Some(stale) => {
                stale.handle.abort();
                debug!(key = %key, carried = stale.waiters.len(), "Replaced pending retry timer");
                stale.waiters
            }
            None => Vec::new(),
        };
        waiters.push(sender);

        let registry = Arc::clone(&self.pending);
        let task_key = key.clone();
        let handle = runtime.spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }

            let waiters = {
                let mut pending = registry.lock();
                match pending.get(&task_key) {
                    Some(entry) if entry.id == id => {
                        pending.remove(&task_key).map(|e| e.waiters).unwrap_or_default()
                    }
                    // Superseded between waking and taking the lock.
                    _ => return,
                }
            };

            let outcome = attempt.await;
            for waiter in waiters {
                let _ = waiter.send(outcome.clone());
            }
        });

        pending.insert(key, PendingRetry { id, handle, waiters });
        Ok(RetryTicket { delay, receiver })
    }

    /// Number of timers that have not fired yet.
    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn is_pending(&self, key: &RequestKey) -> bool {
        self.pending.lock().contains_key(key)
    }

    /// Abort every pending timer; their tickets resolve as cancelled.
    pub fn cancel_all(&self) -> usize {
        let drained: Vec<_> = self.pending.lock().drain().collect();
        let count = drained.len();
        for (_, pending) in drained {
            pending.handle.abort();
        }
        if count > 0 {
            info!(count, "Cancelled pending retries");
        }
        count
    }
}

impl Drop for RetryScheduler {
    fn drop(&mut self) {
        for (_, pending) in self.pending.lock().drain() {
            pending.handle.abort();
        }
    }
}
