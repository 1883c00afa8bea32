//! The remote source of truth for sessions.

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::{AuthStateChange, Result, Session};

/// Remote authority that issues and revokes sessions.
///
/// Implemented by [`crate::AuthClient`] for a real server and by scripted
/// fakes in tests.
#[async_trait]
pub trait RemoteAuthority: Send + Sync {
    /// Returns the current session, refreshing it if needed.
    ///
    /// `Ok(None)` means nobody is signed in.
    async fn get_current_session(&self) -> Result<Option<Session>>;

    /// Signs in with email and password.
    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session>;

    /// Signs the current user out.
    async fn sign_out(&self) -> Result<()>;

    /// Subscribes to auth state changes.
    ///
    /// Dropping the receiver unsubscribes.
    fn on_auth_state_change(&self) -> broadcast::Receiver<AuthStateChange>;
}
