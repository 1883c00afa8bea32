//! Network connectivity monitoring.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpStream;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::Result;

/// Buffered network transitions per subscriber.
const CHANGE_CHANNEL_CAPACITY: usize = 16;

/// Snapshot of network reachability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NetworkState {
    /// Whether the remote authority is reachable.
    pub connected: bool,
}

impl NetworkState {
    /// Connected state.
    pub const ONLINE: Self = Self { connected: true };
    /// Disconnected state.
    pub const OFFLINE: Self = Self { connected: false };
}

/// Source of network state and transitions.
#[async_trait]
pub trait ConnectivityMonitor: Send + Sync {
    /// Returns the current network state.
    async fn fetch_current_state(&self) -> Result<NetworkState>;

    /// Subscribes to network transitions. Dropping the receiver unsubscribes.
    fn on_change(&self) -> broadcast::Receiver<NetworkState>;
}

/// Connectivity driven by the host application.
///
/// The application reports reachability with [`ManualConnectivity::set_connected`];
/// subscribers only hear about actual transitions.
#[derive(Debug)]
pub struct ManualConnectivity {
    state: Mutex<NetworkState>,
    changes: broadcast::Sender<NetworkState>,
}

impl ManualConnectivity {
    /// Creates a monitor with the given initial state.
    #[must_use]
    pub fn new(connected: bool) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            state: Mutex::new(NetworkState { connected }),
            changes,
        }
    }

    /// Records the current reachability, notifying subscribers on change.
    ///
    /// Returns true if the state changed.
    pub fn set_connected(&self, connected: bool) -> bool {
        let next = NetworkState { connected };
        {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            if *state == next {
                return false;
            }
            *state = next;
        }

        info!(connected, "Network state changed");
        if self.changes.send(next).is_err() {
            debug!("No connectivity listeners");
        }
        true
    }

    /// Current state without I/O.
    #[must_use]
    pub fn state(&self) -> NetworkState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of live subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.changes.receiver_count()
    }
}

#[async_trait]
impl ConnectivityMonitor for ManualConnectivity {
    async fn fetch_current_state(&self) -> Result<NetworkState> {
        Ok(self.state())
    }

    fn on_change(&self) -> broadcast::Receiver<NetworkState> {
        self.changes.subscribe()
    }
}

/// Connectivity derived from periodic TCP reachability checks.
///
/// A background task connects to `target` (a `host:port` pair) every
/// `interval` and reports transitions. The task stops when the probe is
/// dropped.
#[derive(Debug)]
pub struct ProbeConnectivity {
    target: String,
    timeout: Duration,
    state: Arc<ManualConnectivity>,
    task: JoinHandle<()>,
}

impl ProbeConnectivity {
    /// Starts probing `target` every `interval`.
    ///
    /// Must be called from within a Tokio runtime.
    #[must_use]
    pub fn spawn(target: impl Into<String>, interval: Duration, timeout: Duration) -> Self {
        let target = target.into();
        let state = Arc::new(ManualConnectivity::new(false));

        let task = {
            let target = target.clone();
            let state = Arc::clone(&state);
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(interval);
                loop {
                    ticker.tick().await;
                    state.set_connected(probe(&target, timeout).await);
                }
            })
        };

        Self {
            target,
            timeout,
            state,
            task,
        }
    }

    /// The probed `host:port`.
    #[must_use]
    pub fn target(&self) -> &str {
        &self.target
    }
}

impl Drop for ProbeConnectivity {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[async_trait]
impl ConnectivityMonitor for ProbeConnectivity {
    async fn fetch_current_state(&self) -> Result<NetworkState> {
        let connected = probe(&self.target, self.timeout).await;
        self.state.set_connected(connected);
        Ok(NetworkState { connected })
    }

    fn on_change(&self) -> broadcast::Receiver<NetworkState> {
        self.state.on_change()
    }
}

async fn probe(target: &str, timeout: Duration) -> bool {
    let reachable = matches!(
        tokio::time::timeout(timeout, TcpStream::connect(target)).await,
        Ok(Ok(_))
    );
    debug!(target, reachable, "Connectivity probe");
    reachable
}
