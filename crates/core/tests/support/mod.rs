//! Shared test helpers for `tether-core` integration tests.
//!
//! Lightweight in-memory implementations of the core ports so scenario
//! tests can focus on behaviour instead of wiring.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tether_common::MockClock;
use tether_core::{
    ConnectivitySignal, DurableStore, FallbackTable, ResilientClient, Transport, TransportError,
};
use tether_domain::{Request, ResilienceConfig, Response, Result as DomainResult};
use tokio::sync::watch;
use tokio::time::Instant;

/// One scripted transport outcome.
#[derive(Debug, Clone)]
pub enum Step {
    Respond(u16, String),
    Fail(TransportError),
}

/// A transport call as observed by [`ScriptedTransport`].
#[derive(Debug, Clone)]
pub struct Call {
    pub request: Request,
    pub started: Instant,
    pub finished: Instant,
}

/// Transport replaying a fixed script, then a default step.
pub struct ScriptedTransport {
    script: Mutex<VecDeque<Step>>,
    otherwise: Step,
    latency: Duration,
    calls: Mutex<Vec<Call>>,
}

impl ScriptedTransport {
    /// Transport answering `200 {}` once the script runs out.
    pub fn new() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            otherwise: Step::Respond(200, "{}".to_string()),
            latency: Duration::ZERO,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn respond(self, status: u16, body: &str) -> Self {
        self.script.lock().push_back(Step::Respond(status, body.to_string()));
        self
    }

    pub fn fail(self, error: TransportError) -> Self {
        self.script.lock().push_back(Step::Fail(error));
        self
    }

    /// Step used once the script is exhausted.
    pub fn otherwise(mut self, step: Step) -> Self {
        self.otherwise = step;
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn urls(&self) -> Vec<String> {
        self.calls.lock().iter().map(|c| c.request.url.clone()).collect()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: &Request) -> Result<Response, TransportError> {
        let started = Instant::now();
        let step = self.script.lock().pop_front().unwrap_or_else(|| self.otherwise.clone());
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        self.calls.lock().push(Call { request: request.clone(), started, finished: Instant::now() });
        match step {
            Step::Respond(status, body) => Ok(Response::new(status, body)),
            Step::Fail(error) => Err(error),
        }
    }
}

/// In-memory `DurableStore`.
#[derive(Default)]
pub struct InMemoryStore {
    items: Mutex<HashMap<String, String>>,
}

impl InMemoryStore {
    pub fn raw(&self, key: &str) -> Option<String> {
        self.items.lock().get(key).cloned()
    }

    pub fn put_raw(&self, key: &str, value: &str) {
        self.items.lock().insert(key.to_string(), value.to_string());
    }
}

#[async_trait]
impl DurableStore for InMemoryStore {
    async fn get_item(&self, key: &str) -> DomainResult<Option<String>> {
        Ok(self.raw(key))
    }

    async fn set_item(&self, key: &str, value: String) -> DomainResult<()> {
        self.items.lock().insert(key.to_string(), value);
        Ok(())
    }

    async fn remove_item(&self, key: &str) -> DomainResult<()> {
        self.items.lock().remove(key);
        Ok(())
    }
}

/// Connectivity signal flipped by the test.
pub struct ManualSignal {
    sender: watch::Sender<bool>,
}

impl ManualSignal {
    pub fn new(online: bool) -> Self {
        let (sender, _receiver) = watch::channel(online);
        Self { sender }
    }

    pub fn set_online(&self, online: bool) {
        self.sender.send_replace(online);
    }
}

impl ConnectivitySignal for ManualSignal {
    fn subscribe(&self) -> watch::Receiver<bool> {
        self.sender.subscribe()
    }
}

/// Config with short delays: 100 ms base, exponential, three retries.
pub fn fast_config() -> ResilienceConfig {
    ResilienceConfig {
        max_retries: 3,
        retry_delay_ms: 100,
        exponential_backoff: true,
        cache_ttl_ms: 5_000,
        ..Default::default()
    }
}

/// Everything a scenario needs, wired together.
pub struct Harness {
    pub client: ResilientClient,
    pub transport: Arc<ScriptedTransport>,
    pub store: Arc<InMemoryStore>,
    pub signal: Arc<ManualSignal>,
    pub clock: MockClock,
}

impl Harness {
    pub fn new(transport: ScriptedTransport, online: bool) -> Self {
        Self::with(transport, online, fast_config(), FallbackTable::new())
    }

    pub fn with(
        transport: ScriptedTransport,
        online: bool,
        config: ResilienceConfig,
        fallback: FallbackTable,
    ) -> Self {
        Self::with_store(transport, online, config, fallback, Arc::new(InMemoryStore::default()))
    }

    pub fn with_store(
        transport: ScriptedTransport,
        online: bool,
        config: ResilienceConfig,
        fallback: FallbackTable,
        store: Arc<InMemoryStore>,
    ) -> Self {
        let transport = Arc::new(transport);
        let signal = Arc::new(ManualSignal::new(online));
        let clock = MockClock::at(0);
        let client = ResilientClient::builder()
            .config(config)
            .transport(transport.clone())
            .store(store.clone())
            .connectivity(signal.clone())
            .clock(Arc::new(clock.clone()))
            .fallback(fallback)
            .build()
            .expect("client should build");
        Self { client, transport, store, signal, clock }
    }
}

/// Poll `condition` while letting paused time advance.
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..1_000 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached in time");
}

/// Let spawned tasks make progress without advancing time.
pub async fn yield_many() {
    for _ in 0..50 {
        tokio::task::yield_now().await;
    }
}
