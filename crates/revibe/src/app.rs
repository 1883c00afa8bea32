//! Wiring of the store, session cache, remote authority and reconciler.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use revibe_auth::{AuthClient, AuthStateChange, RemoteAuthority, Session};
use revibe_core::session::KeyValueStore;
use revibe_core::{
    CacheBackend, Config, ConnectivityMonitor, FileStore, ItemStore, KeyringStore,
    ManualConnectivity, MemoryStore, ProbeConnectivity, Reconciler, SessionCache,
    SharedItemStore,
};
use tokio::sync::broadcast;
use tracing::{debug, info};

/// Keyring service name for the session cache.
const KEYRING_SERVICE: &str = "revibe";

const PROBE_INTERVAL: Duration = Duration::from_secs(30);
const PROBE_TIMEOUT: Duration = Duration::from_secs(3);

/// Everything a command needs, built once per invocation.
pub struct App {
    pub config: Config,
    items: SharedItemStore,
    auth: Option<Arc<AuthClient>>,
    pub reconciler: Reconciler,
}

impl App {
    /// Loads config, prepares the store and bootstraps the session.
    pub async fn start() -> Result<Self> {
        let config = Config::load().await.context("Failed to load config")?;

        let database_path = config.database_path();
        if let Some(parent) = database_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let items = SharedItemStore::new(path_str(database_path)?, config.reset_items_on_start);

        let cache = SessionCache::new(cache_store(&config));

        let auth = match config.remote() {
            Some((url, key)) => {
                let client = Arc::new(AuthClient::new(url, key)?);
                client.restore(cache.load().await).await;
                Some(client)
            }
            None => None,
        };

        let reconciler = if let Some(client) = &auth {
            let target = probe_target(client)?;
            let probe = ProbeConnectivity::spawn(target, PROBE_INTERVAL, PROBE_TIMEOUT);
            let remote: Arc<dyn RemoteAuthority> = client.clone();
            let connectivity: Arc<dyn ConnectivityMonitor> = Arc::new(probe);
            Reconciler::new(remote, connectivity, cache)
        } else {
            debug!("No auth server configured, running offline");
            Reconciler::new(
                Arc::new(LocalOnly::default()),
                Arc::new(ManualConnectivity::new(false)),
                cache,
            )
        };
        reconciler.bootstrap().await;

        Ok(Self {
            config,
            items,
            auth,
            reconciler,
        })
    }

    /// The item store, opened on first use.
    pub async fn items(&self) -> Result<&ItemStore> {
        Ok(self.items.get().await?)
    }

    /// The auth client, if an auth server is configured.
    pub fn auth(&self) -> Result<&AuthClient> {
        self.auth.as_deref().ok_or_else(|| {
            anyhow!(
                "No auth server configured; set auth_url and auth_key in {}",
                Config::default_path().display()
            )
        })
    }

    /// Waits until the reconciler holds a session matching `condition`.
    pub async fn await_session(&self, condition: impl Fn(Option<&Session>) -> bool) -> Result<()> {
        let mut changes = self.reconciler.subscribe();
        tokio::time::timeout(
            Duration::from_secs(5),
            changes.wait_for(|session| condition(session.as_ref())),
        )
        .await
        .context("Timed out waiting for session update")?
        .context("Session channel closed")?;
        Ok(())
    }

    /// Stops the listeners, flushes the cache and closes the store.
    pub async fn finish(self) {
        self.reconciler.shutdown().await;
        if self.items.is_open()
            && let Ok(store) = self.items.get().await
        {
            store.close().await;
        }
        info!("Done");
    }
}

fn cache_store(config: &Config) -> Arc<dyn KeyValueStore> {
    match config.cache_backend {
        CacheBackend::Keyring => Arc::new(KeyringStore::new(KEYRING_SERVICE)),
        CacheBackend::File => Arc::new(FileStore::new(config.cache_dir())),
        CacheBackend::Memory => Arc::new(MemoryStore::new()),
    }
}

fn path_str(path: PathBuf) -> Result<String> {
    path.into_os_string()
        .into_string()
        .map_err(|path| anyhow!("Database path is not valid UTF-8: {}", path.display()))
}

fn probe_target(client: &AuthClient) -> Result<String> {
    let url = client.base_url();
    let host = url
        .host_str()
        .ok_or_else(|| anyhow!("Auth URL has no host: {url}"))?;
    let port = url
        .port_or_known_default()
        .ok_or_else(|| anyhow!("Auth URL has no port: {url}"))?;
    Ok(format!("{host}:{port}"))
}

/// Stand-in authority used when no auth server is configured.
///
/// Never reports a session; with connectivity pinned offline the
/// reconciler only ever consults the cache.
struct LocalOnly {
    events: broadcast::Sender<AuthStateChange>,
}

impl Default for LocalOnly {
    fn default() -> Self {
        let (events, _) = broadcast::channel(1);
        Self { events }
    }
}

#[async_trait]
impl RemoteAuthority for LocalOnly {
    async fn get_current_session(&self) -> revibe_auth::Result<Option<Session>> {
        Err(not_configured())
    }

    async fn sign_in_with_password(
        &self,
        _email: &str,
        _password: &str,
    ) -> revibe_auth::Result<Session> {
        Err(not_configured())
    }

    async fn sign_out(&self) -> revibe_auth::Result<()> {
        Ok(())
    }

    fn on_auth_state_change(&self) -> broadcast::Receiver<AuthStateChange> {
        self.events.subscribe()
    }
}

fn not_configured() -> revibe_auth::Error {
    revibe_auth::Error::InvalidConfig("no auth server configured".into())
}
