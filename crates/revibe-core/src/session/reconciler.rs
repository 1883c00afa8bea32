//! Reconciles the in-memory session with the remote authority and cache.
//!
//! The reconciler moves through [`Phase::Uninitialized`],
//! [`Phase::Bootstrapping`] and [`Phase::Ready`]. Bootstrap resolves the
//! initial session from the remote authority when online, or from the
//! cache when offline or when the authority fails. Only after that
//! decision are the auth-event and connectivity listeners registered.
//!
//! Bootstrap, both listeners and [`Reconciler::force_resync`] take the same
//! handler lock, so no two of them mutate the session at once.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

use revibe_auth::{AuthEvent, AuthStateChange, RemoteAuthority, Session};
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::cache::{self, SessionCache};
use crate::Result;
use crate::connectivity::{ConnectivityMonitor, NetworkState};

/// Lifecycle of a [`Reconciler`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Bootstrap has not started.
    Uninitialized,
    /// Resolving the initial session.
    Bootstrapping,
    /// Initial session resolved; listeners active.
    Ready,
    /// Listeners removed; no further changes are applied.
    ShutDown,
}

impl Phase {
    /// Returns true once startup can proceed.
    #[must_use]
    pub const fn is_settled(&self) -> bool {
        matches!(self, Self::Ready | Self::ShutDown)
    }
}

struct Listeners {
    auth: JoinHandle<()>,
    auth_stop: oneshot::Sender<()>,
    connectivity: JoinHandle<()>,
    connectivity_stop: oneshot::Sender<()>,
}

impl Listeners {
    /// Signals both tasks and waits for them to finish.
    ///
    /// The auth task applies every event already delivered to it before
    /// exiting; pending connectivity changes are dropped.
    async fn stop(self) {
        if self.auth_stop.send(()).is_err() {
            debug!("Auth listener already stopped");
        }
        if self.connectivity_stop.send(()).is_err() {
            debug!("Connectivity listener already stopped");
        }
        if let Err(e) = self.auth.await {
            warn!("Auth listener ended abnormally: {e}");
        }
        if let Err(e) = self.connectivity.await {
            warn!("Connectivity listener ended abnormally: {e}");
        }
    }
}

struct Inner {
    remote: Arc<dyn RemoteAuthority>,
    connectivity: Arc<dyn ConnectivityMonitor>,
    cache: SessionCache,
    current: watch::Sender<Option<Session>>,
    phase: watch::Sender<Phase>,
    handler: tokio::sync::Mutex<()>,
    closing: tokio::sync::Mutex<()>,
    listeners: Mutex<Option<Listeners>>,
    connected: AtomicBool,
}

/// Owner of the authoritative in-memory session.
///
/// Cloning is cheap; clones share state.
#[derive(Clone)]
pub struct Reconciler {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("phase", &self.phase())
            .field("signed_in", &self.inner.current.borrow().is_some())
            .finish_non_exhaustive()
    }
}

impl Reconciler {
    /// Creates a reconciler in [`Phase::Uninitialized`].
    #[must_use]
    pub fn new(
        remote: Arc<dyn RemoteAuthority>,
        connectivity: Arc<dyn ConnectivityMonitor>,
        cache: SessionCache,
    ) -> Self {
        let (current, _) = watch::channel(None);
        let (phase, _) = watch::channel(Phase::Uninitialized);
        Self {
            inner: Arc::new(Inner {
                remote,
                connectivity,
                cache,
                current,
                phase,
                handler: tokio::sync::Mutex::new(()),
                closing: tokio::sync::Mutex::new(()),
                listeners: Mutex::new(None),
                connected: AtomicBool::new(false),
            }),
        }
    }

    /// Resolves the initial session and starts listening for changes.
    ///
    /// Runs once; later calls wait for the first to finish and return the
    /// current session. Never fails: unresolvable errors yield `None`.
    pub async fn bootstrap(&self) -> Option<Session> {
        let _guard = self.inner.handler.lock().await;
        if self.phase() != Phase::Uninitialized {
            debug!("Bootstrap already ran");
            return self.session();
        }

        self.inner.set_phase(Phase::Bootstrapping);

        let session = match self.inner.resolve_initial().await {
            Ok(session) => session,
            Err(e) => {
                warn!("Bootstrap failed, falling back to cache: {e}");
                self.inner.cached_or_clear().await
            }
        };
        self.inner.adopt(session.clone());

        self.register_listeners();
        self.inner.set_phase(Phase::Ready);
        info!(signed_in = session.is_some(), "Session bootstrap complete");
        session
    }

    /// Re-queries the remote authority and adopts its answer.
    ///
    /// # Errors
    ///
    /// Returns `Error::Remote` if the authority is unreachable or rejects
    /// the request; the current session is left unchanged.
    pub async fn force_resync(&self) -> Result<Option<Session>> {
        let _guard = self.inner.handler.lock().await;
        if self.phase() == Phase::ShutDown {
            debug!("Resync after shutdown ignored");
            return Ok(self.session());
        }

        let session = self.inner.remote.get_current_session().await?;
        if session.is_some() {
            self.inner.cache.store(session.as_ref());
        }
        self.inner.adopt(session.clone());
        info!(signed_in = session.is_some(), "Session resynced");
        Ok(session)
    }

    /// Removes both listeners. Safe to call more than once.
    ///
    /// Auth events delivered before the call are still applied, so a
    /// sign-out that raced shutdown reaches the cache.
    pub async fn shutdown(&self) {
        let _closing = self.inner.closing.lock().await;

        let listeners = {
            let _guard = self.inner.handler.lock().await;
            let listeners = self
                .inner
                .listeners
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .take();
            if listeners.is_none() {
                self.inner.set_phase(Phase::ShutDown);
            }
            listeners
        };

        if let Some(listeners) = listeners {
            listeners.stop().await;
            let _guard = self.inner.handler.lock().await;
            self.inner.set_phase(Phase::ShutDown);
            info!("Session listeners removed");
        }

        self.inner.cache.flush().await;
    }

    /// Waits until no handler is running.
    pub async fn settled(&self) {
        drop(self.inner.handler.lock().await);
    }

    /// Waits until bootstrap has finished (or the reconciler shut down).
    pub async fn wait_ready(&self) -> Phase {
        let mut phase = self.inner.phase.subscribe();
        phase
            .wait_for(Phase::is_settled)
            .await
            .map_or(Phase::ShutDown, |p| *p)
    }

    /// Current session.
    #[must_use]
    pub fn session(&self) -> Option<Session> {
        self.inner.current.borrow().clone()
    }

    /// Observes session changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Option<Session>> {
        self.inner.current.subscribe()
    }

    /// Current lifecycle phase.
    #[must_use]
    pub fn phase(&self) -> Phase {
        *self.inner.phase.borrow()
    }

    /// Returns true while listeners are registered.
    #[must_use]
    pub fn is_listening(&self) -> bool {
        self.inner
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// The session cache this reconciler writes through to.
    #[must_use]
    pub fn cache(&self) -> &SessionCache {
        &self.inner.cache
    }

    /// See [`cache::is_valid`].
    #[must_use]
    pub fn is_valid(session: Option<&Session>) -> bool {
        cache::is_valid(session)
    }

    fn register_listeners(&self) {
        let mut slot = self
            .inner
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if slot.is_some() {
            return;
        }

        let mut auth_events = self.inner.remote.on_auth_state_change();
        let (auth_stop, mut stop) = oneshot::channel();
        let weak = Arc::downgrade(&self.inner);
        let auth = tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    _ = &mut stop => {
                        drain_auth_events(&weak, &mut auth_events).await;
                        break;
                    }
                    received = auth_events.recv() => match received {
                        Ok(change) => {
                            let Some(inner) = Weak::upgrade(&weak) else {
                                break;
                            };
                            inner.on_auth_change(change).await;
                        }
                        Err(RecvError::Lagged(skipped)) => {
                            warn!("Auth listener lagged, skipped {skipped} event(s)");
                        }
                        Err(RecvError::Closed) => break,
                    },
                }
            }
        });

        let mut network_changes = self.inner.connectivity.on_change();
        let (connectivity_stop, mut stop) = oneshot::channel();
        let weak = Arc::downgrade(&self.inner);
        let connectivity = tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    _ = &mut stop => break,
                    received = network_changes.recv() => match received {
                        Ok(state) => {
                            let Some(inner) = Weak::upgrade(&weak) else {
                                break;
                            };
                            inner.on_network_change(state).await;
                        }
                        Err(RecvError::Lagged(skipped)) => {
                            warn!("Connectivity listener lagged, skipped {skipped} change(s)");
                        }
                        Err(RecvError::Closed) => break,
                    },
                }
            }
        });

        *slot = Some(Listeners {
            auth,
            auth_stop,
            connectivity,
            connectivity_stop,
        });
        debug!("Session listeners registered");
    }
}

async fn drain_auth_events(
    weak: &Weak<Inner>,
    events: &mut broadcast::Receiver<AuthStateChange>,
) {
    let Some(inner) = Weak::upgrade(weak) else {
        return;
    };
    loop {
        match events.try_recv() {
            Ok(change) => inner.on_auth_change(change).await,
            Err(TryRecvError::Lagged(skipped)) => {
                warn!("Auth listener lagged, skipped {skipped} event(s)");
            }
            Err(TryRecvError::Empty | TryRecvError::Closed) => break,
        }
    }
}

impl Inner {
    fn set_phase(&self, phase: Phase) {
        let previous = self.phase.send_replace(phase);
        if previous != phase {
            debug!("Reconciler phase {previous:?} -> {phase:?}");
        }
    }

    fn adopt(&self, session: Option<Session>) {
        self.current.send_replace(session);
    }

    async fn resolve_initial(&self) -> Result<Option<Session>> {
        let state = self.connectivity.fetch_current_state().await?;
        self.connected.store(state.connected, Ordering::SeqCst);

        if !state.connected {
            debug!("Offline at startup, using cached session");
            return Ok(self.cached_or_clear().await);
        }

        match self.remote.get_current_session().await {
            Ok(session) => {
                if session.is_some() {
                    self.cache.store(session.as_ref());
                }
                Ok(session)
            }
            Err(e) => {
                warn!("Remote session unavailable, using cache: {e}");
                Ok(self.cached_if_valid().await)
            }
        }
    }

    async fn cached_if_valid(&self) -> Option<Session> {
        self.cache
            .load()
            .await
            .filter(|session| cache::is_valid(Some(session)))
    }

    /// Like [`Self::cached_if_valid`], but drops a stale entry from the cache.
    async fn cached_or_clear(&self) -> Option<Session> {
        let cached = self.cache.load().await;
        if cache::is_valid(cached.as_ref()) {
            return cached;
        }
        if cached.is_some() {
            info!("Cached session expired, clearing");
            self.cache.clear();
        }
        None
    }

    async fn on_auth_change(&self, change: AuthStateChange) {
        let _guard = self.handler.lock().await;
        if *self.phase.borrow() != Phase::Ready {
            return;
        }

        info!("Auth event {}", change.event);
        self.cache.store(change.session.as_ref());
        if change.event == AuthEvent::SignedOut {
            self.cache.clear();
        }
        self.adopt(change.session);
    }

    async fn on_network_change(&self, state: NetworkState) {
        let _guard = self.handler.lock().await;
        let was_connected = self.connected.swap(state.connected, Ordering::SeqCst);
        if *self.phase.borrow() != Phase::Ready || was_connected || !state.connected {
            return;
        }

        let Some(held) = self.current.borrow().clone() else {
            debug!("Reconnected without a session, nothing to refresh");
            return;
        };

        match self.remote.get_current_session().await {
            Ok(Some(fresh)) if fresh.access_token != held.access_token => {
                info!("Session refreshed after reconnect");
                self.cache.store(Some(&fresh));
                self.adopt(Some(fresh));
            }
            Ok(Some(_)) => debug!("Session unchanged after reconnect"),
            Ok(None) => debug!("Remote reported no session after reconnect"),
            Err(e) => warn!("Session refresh after reconnect failed: {e}"),
        }
    }
}
