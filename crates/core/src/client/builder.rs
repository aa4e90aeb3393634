use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use parking_lot::Mutex;
use tether_common::{SharedClock, SystemClock};
use tether_domain::{ResilienceConfig, Result, TetherError};
use tokio_util::sync::CancellationToken;

use super::{ClientInner, ResilientClient};
use crate::cache::ResponseCache;
use crate::fallback::{FallbackRule, FallbackTable};
use crate::ledger::FailureLedger;
use crate::network::NetworkState;
use crate::ports::{ConnectivitySignal, DurableStore, Transport};
use crate::queue::OfflineQueue;
use crate::retry::{RetryPolicy, RetryScheduler};

/// Builder for [`ResilientClient`].
///
/// Only the transport is required. Without a store the cache is memory
/// only; without a connectivity signal the client assumes it is online.
#[derive(Default)]
pub struct ResilientClientBuilder {
    config: ResilienceConfig,
    transport: Option<Arc<dyn Transport>>,
    store: Option<Arc<dyn DurableStore>>,
    connectivity: Option<Arc<dyn ConnectivitySignal>>,
    clock: Option<SharedClock>,
    fallback: FallbackTable,
}

impl ResilientClientBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(mut self, config: ResilienceConfig) -> Self {
        self.config = config;
        self
    }

    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Durable store mirroring the response cache.
    pub fn store(mut self, store: Arc<dyn DurableStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn connectivity(mut self, signal: Arc<dyn ConnectivitySignal>) -> Self {
        self.connectivity = Some(signal);
        self
    }

    pub fn clock(mut self, clock: SharedClock) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Replace the fallback table.
    pub fn fallback(mut self, table: FallbackTable) -> Self {
        self.fallback = table;
        self
    }

    /// Append one fallback rule.
    pub fn fallback_rule(mut self, rule: FallbackRule) -> Self {
        self.fallback.push(rule);
        self
    }

    /// Validate the configuration and assemble the client.
    ///
    /// # Errors
    /// Returns `TetherError::Config` for an invalid configuration or a
    /// missing transport.
    pub fn build(self) -> Result<ResilientClient> {
        self.config.validate()?;
        let transport = self
            .transport
            .ok_or_else(|| TetherError::Config("a transport is required".to_string()))?;
        let config = self.config;
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));

        let signal = self.connectivity.map(|source| source.subscribe());
        let online = signal.as_ref().map_or(true, |rx| *rx.borrow());

        let cache = Arc::new(ResponseCache::new(
            config.cache_ttl_ms,
            Arc::clone(&clock),
            self.store,
            config.storage_key.clone(),
        ));
        let fallback = Arc::new(self.fallback);
        let queue = OfflineQueue::new(
            config.offline_queue_capacity,
            Arc::clone(&clock),
            config.enable_caching.then(|| Arc::clone(&cache)),
            config.enable_fallback_data.then(|| Arc::clone(&fallback)),
        );
        let scheduler = RetryScheduler::new(RetryPolicy::from_config(&config));

        let inner = ClientInner {
            transport,
            clock,
            cache,
            ledger: FailureLedger::new(),
            scheduler,
            fallback,
            queue,
            network: Arc::new(NetworkState::new(online)),
            signal: Mutex::new(signal),
            cancel: CancellationToken::new(),
            tasks: Mutex::new(Vec::new()),
            started: AtomicBool::new(false),
            config,
        };
        Ok(ResilientClient { inner: Arc::new(inner) })
    }
}
