//! Connectivity signal sources
//!
//! [`ManualConnectivity`] is driven by the application (for example from an
//! OS reachability callback). [`TcpProbeConnectivity`] discovers the state
//! itself by periodically opening a TCP connection to a probe address.

use std::sync::Arc;
use std::time::Duration;

use tether_core::ConnectivitySignal;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Connectivity set explicitly by the application.
#[derive(Debug)]
pub struct ManualConnectivity {
    sender: watch::Sender<bool>,
}

impl ManualConnectivity {
    pub fn new(online: bool) -> Self {
        let (sender, _receiver) = watch::channel(online);
        Self { sender }
    }

    /// Publish a new state. Repeating the current state is a no-op.
    pub fn set_online(&self, online: bool) {
        let changed = publish(&self.sender, online);
        if changed {
            info!(online, "connectivity changed");
        }
    }

    pub fn is_online(&self) -> bool {
        *self.sender.borrow()
    }
}

impl ConnectivitySignal for ManualConnectivity {
    fn subscribe(&self) -> watch::Receiver<bool> {
        self.sender.subscribe()
    }
}

fn publish(sender: &watch::Sender<bool>, online: bool) -> bool {
    sender.send_if_modified(|current| {
        if *current == online {
            false
        } else {
            *current = online;
            true
        }
    })
}

/// Connectivity derived from periodic TCP connects to `address`.
///
/// Nothing is probed until [`start`](Self::start) is called; until then
/// subscribers see the initial state passed to [`new`](Self::new).
#[derive(Debug, Clone)]
pub struct TcpProbeConnectivity {
    address: String,
    interval: Duration,
    timeout: Duration,
    sender: Arc<watch::Sender<bool>>,
}

impl TcpProbeConnectivity {
    /// Probe `address` (`host:port`) every 10 s with a 3 s connect timeout.
    pub fn new(address: impl Into<String>, initial: bool) -> Self {
        let (sender, _receiver) = watch::channel(initial);
        Self {
            address: address.into(),
            interval: Duration::from_secs(10),
            timeout: Duration::from_secs(3),
            sender: Arc::new(sender),
        }
    }

    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn is_online(&self) -> bool {
        *self.sender.borrow()
    }

    /// Attempt a single connection.
    pub async fn probe_once(&self) -> bool {
        match tokio::time::timeout(self.timeout, TcpStream::connect(self.address.as_str())).await {
            Ok(Ok(_stream)) => true,
            Ok(Err(err)) => {
                debug!(address = %self.address, error = %err, "connectivity probe failed");
                false
            }
            Err(_) => {
                debug!(address = %self.address, "connectivity probe timed out");
                false
            }
        }
    }

    /// Probe immediately, then every `interval`, until `cancel` fires.
    pub fn start(&self, cancel: CancellationToken) -> JoinHandle<()> {
        let probe = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(probe.interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        let online = probe.probe_once().await;
                        if publish(&probe.sender, online) {
                            info!(address = %probe.address, online, "connectivity changed");
                        }
                    }
                }
            }
            debug!(address = %probe.address, "connectivity probe stopped");
        })
    }
}

impl ConnectivitySignal for TcpProbeConnectivity {
    fn subscribe(&self) -> watch::Receiver<bool> {
        self.sender.subscribe()
    }
}
