//! Online/offline state machine
//!
//! [`NetworkState`] holds the current flag. [`NetworkMonitor`] consumes a
//! connectivity watch channel, filters duplicate values and notifies a
//! [`ConnectivityHandler`] on every real transition. Reconnection work runs
//! in its own task so a drop back to offline is observed while a drain is
//! still in progress.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// A real change of connectivity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    WentOnline,
    WentOffline,
}

/// Current connectivity flag shared by the client components.
#[derive(Debug)]
pub struct NetworkState {
    online: AtomicBool,
}

impl NetworkState {
    pub fn new(online: bool) -> Self {
        Self { online: AtomicBool::new(online) }
    }

    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::Acquire)
    }

    /// Apply an observed value; `None` when it matches the current state.
    pub fn apply(&self, online: bool) -> Option<Transition> {
        let previous = self.online.swap(online, Ordering::AcqRel);
        match (previous, online) {
            (false, true) => Some(Transition::WentOnline),
            (true, false) => Some(Transition::WentOffline),
            _ => None,
        }
    }
}

/// Reacts to connectivity transitions.
#[async_trait]
pub trait ConnectivityHandler: Send + Sync {
    /// Called after the state flipped to online
    async fn on_online(&self);

    /// Called after the state flipped to offline
    async fn on_offline(&self);
}

/// Background task feeding [`NetworkState`] from a watch channel.
pub struct NetworkMonitor;

impl NetworkMonitor {
    /// Spawn the monitor loop.
    ///
    /// The loop exits when `cancel` fires or the signal's sender is dropped.
    pub fn spawn(
        state: Arc<NetworkState>,
        mut signal: watch::Receiver<bool>,
        handler: Arc<dyn ConnectivityHandler>,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    changed = signal.changed() => {
                        if changed.is_err() {
                            warn!("Connectivity signal closed; monitor stopping");
                            break;
                        }
                        let online = *signal.borrow_and_update();
                        match state.apply(online) {
                            Some(Transition::WentOnline) => {
                                info!("Connectivity restored");
                                let handler = Arc::clone(&handler);
                                let cancel = cancel.clone();
                                tokio::spawn(async move {
                                    tokio::select! {
                                        _ = cancel.cancelled() => {}
                                        _ = handler.on_online() => {}
                                    }
                                });
                            }
                            Some(Transition::WentOffline) => {
                                info!("Connectivity lost");
                                handler.on_offline().await;
                            }
                            None => debug!(online, "Ignoring duplicate connectivity event"),
                        }
                    }
                }
            }
            debug!("Network monitor stopped");
        })
    }
}
