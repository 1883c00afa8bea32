//! Durable cache of the signed-in session.

use std::sync::Arc;

use chrono::Utc;
use revibe_auth::Session;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use super::store::KeyValueStore;

/// Key the session is cached under.
pub const SESSION_KEY: &str = "revibe.auth.session";

/// A session must outlive "now" by this many seconds to be used.
pub const VALIDITY_BUFFER_SECS: i64 = 300;

// A session the remote authority hands out must not be one the cache rejects.
const _: () = assert!(revibe_auth::REFRESH_MARGIN_SECS >= VALIDITY_BUFFER_SECS);

/// Returns true if the session expires more than [`VALIDITY_BUFFER_SECS`]
/// from now.
#[must_use]
pub fn is_valid(session: Option<&Session>) -> bool {
    is_valid_at(session, Utc::now().timestamp())
}

/// [`is_valid`] evaluated at `now` (epoch seconds).
#[must_use]
pub fn is_valid_at(session: Option<&Session>, now: i64) -> bool {
    session
        .and_then(|s| s.expires_at)
        .is_some_and(|expires_at| expires_at > now.saturating_add(VALIDITY_BUFFER_SECS))
}

enum Command {
    Store(Option<Session>),
    Load(oneshot::Sender<Option<Session>>),
    Flush(oneshot::Sender<()>),
}

/// Single-slot session cache over a [`KeyValueStore`].
///
/// Every operation goes through one worker task, so writes land in the
/// order they were issued and a load sees all earlier writes. Writes are
/// fire-and-forget: failures are logged and never reach the caller.
#[derive(Debug, Clone)]
pub struct SessionCache {
    commands: mpsc::UnboundedSender<Command>,
}

impl SessionCache {
    /// Creates a cache using [`SESSION_KEY`].
    ///
    /// Must be called from within a Tokio runtime.
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self::with_key(store, SESSION_KEY)
    }

    /// Creates a cache storing the session under `key`.
    ///
    /// Must be called from within a Tokio runtime.
    #[must_use]
    pub fn with_key(store: Arc<dyn KeyValueStore>, key: impl Into<String>) -> Self {
        let (commands, receiver) = mpsc::unbounded_channel();
        tokio::spawn(run_worker(store, key.into(), receiver));
        Self { commands }
    }

    /// Queues a write of `session`, or removal of the entry for `None`.
    pub fn store(&self, session: Option<&Session>) {
        if self
            .commands
            .send(Command::Store(session.cloned()))
            .is_err()
        {
            warn!("Session cache worker stopped, dropping write");
        }
    }

    /// Queues removal of the cached session.
    pub fn clear(&self) {
        self.store(None);
    }

    /// Reads the cached session.
    ///
    /// Missing, unreadable or malformed entries all read as `None`.
    pub async fn load(&self) -> Option<Session> {
        let (reply, response) = oneshot::channel();
        if self.commands.send(Command::Load(reply)).is_err() {
            warn!("Session cache worker stopped, treating as miss");
            return None;
        }
        response.await.unwrap_or_default()
    }

    /// Waits until every queued write has been applied.
    pub async fn flush(&self) {
        let (reply, done) = oneshot::channel();
        if self.commands.send(Command::Flush(reply)).is_ok() && done.await.is_err() {
            debug!("Session cache worker stopped during flush");
        }
    }
}

async fn run_worker(
    store: Arc<dyn KeyValueStore>,
    key: String,
    mut commands: mpsc::UnboundedReceiver<Command>,
) {
    while let Some(command) = commands.recv().await {
        match command {
            Command::Store(Some(session)) => write(store.as_ref(), &key, &session).await,
            Command::Store(None) => match store.remove(&key).await {
                Ok(()) => debug!("Cleared cached session"),
                Err(e) => warn!("Failed to clear cached session: {e}"),
            },
            Command::Load(reply) => {
                if reply.send(read(store.as_ref(), &key).await).is_err() {
                    debug!("Session cache reader went away");
                }
            }
            Command::Flush(reply) => {
                if reply.send(()).is_err() {
                    debug!("Session cache flusher went away");
                }
            }
        }
    }
    debug!("Session cache worker stopped");
}

async fn write(store: &dyn KeyValueStore, key: &str, session: &Session) {
    let json = match serde_json::to_string(session) {
        Ok(json) => json,
        Err(e) => {
            warn!("Failed to serialize session for cache: {e}");
            return;
        }
    };

    match store.set(key, &json).await {
        Ok(()) => debug!("Cached session"),
        Err(e) => warn!("Failed to cache session: {e}"),
    }
}

async fn read(store: &dyn KeyValueStore, key: &str) -> Option<Session> {
    let raw = match store.get(key).await {
        Ok(Some(raw)) => raw,
        Ok(None) => {
            debug!("No cached session");
            return None;
        }
        Err(e) => {
            warn!("Failed to read cached session: {e}");
            return None;
        }
    };

    match serde_json::from_str(&raw) {
        Ok(session) => Some(session),
        Err(e) => {
            warn!("Malformed cached session, ignoring: {e}");
            None
        }
    }
}
