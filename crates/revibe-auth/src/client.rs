//! HTTP client for a GoTrue-compatible auth server.

use std::fmt;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::{RwLock, broadcast};
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{Error, Result};
use crate::session::{Session, TokenResponse, User, UserUpdate};
use crate::{AuthEvent, AuthStateChange, RemoteAuthority};

/// Refresh the held session when it expires within this many seconds.
/// Must not be smaller than the margin the session cache uses to reject
/// a cached session.
pub const REFRESH_MARGIN_SECS: i64 = 300;

/// Buffered auth events per subscriber before lagging.
const EVENT_CHANNEL_CAPACITY: usize = 16;

/// Auth client holding the signed-in session in memory.
///
/// The client never persists the session itself; seed it with
/// [`AuthClient::restore`] from a durable cache at startup.
pub struct AuthClient {
    base_url: Url,
    api_key: String,
    http_client: Client,
    session: RwLock<Option<Session>>,
    events: broadcast::Sender<AuthStateChange>,
}

impl fmt::Debug for AuthClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthClient")
            .field("base_url", &self.base_url.as_str())
            .finish_non_exhaustive()
    }
}

#[derive(Serialize)]
struct PasswordCredentials<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct RefreshGrant<'a> {
    refresh_token: &'a str,
}

/// Error body returned by the auth server. Field names vary across versions.
#[derive(Debug, Default, Deserialize)]
struct ErrorResponse {
    error: Option<String>,
    error_code: Option<String>,
    error_description: Option<String>,
    msg: Option<String>,
    message: Option<String>,
}

impl ErrorResponse {
    fn into_error(self, status: StatusCode) -> Error {
        let code = self
            .error_code
            .or(self.error)
            .unwrap_or_else(|| status.as_u16().to_string());
        let message = self
            .error_description
            .or(self.msg)
            .or(self.message)
            .unwrap_or_else(|| status.canonical_reason().unwrap_or("request failed").to_string());
        Error::auth(code, message)
    }
}

impl AuthClient {
    /// Creates a client for the auth server at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid or the API key is empty.
    pub fn new(base_url: &str, api_key: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(Error::InvalidConfig("API key is required".to_string()));
        }

        let mut base_url = Url::parse(base_url)?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Ok(Self {
            base_url,
            api_key,
            http_client: Client::new(),
            session: RwLock::new(None),
            events,
        })
    }

    /// Base URL requests are resolved against.
    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        Ok(self.base_url.join(path)?)
    }

    /// Seeds the in-memory session without emitting an event.
    pub async fn restore(&self, session: Option<Session>) {
        debug!(restored = session.is_some(), "Restoring auth session");
        *self.session.write().await = session;
    }

    /// Returns the held session without contacting the server.
    pub async fn session(&self) -> Option<Session> {
        self.session.read().await.clone()
    }

    /// Registers a new account.
    ///
    /// Returns the session when the server signs the user in immediately,
    /// or `None` when the account awaits email confirmation.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server rejects it.
    pub async fn sign_up(&self, email: &str, password: &str) -> Result<Option<Session>> {
        let response = self
            .http_client
            .post(self.endpoint("auth/v1/signup")?)
            .header("apikey", &self.api_key)
            .json(&PasswordCredentials { email, password })
            .send()
            .await?;

        let body: serde_json::Value = parse(response).await?;
        if body.get("access_token").is_none() {
            info!("Sign-up for {email} awaiting confirmation");
            return Ok(None);
        }

        let token: TokenResponse = serde_json::from_value(body)?;
        let session = Session::from_response(token);
        self.adopt(AuthEvent::SignedIn, Some(session.clone())).await;
        Ok(Some(session))
    }

    /// Exchanges the held refresh token for a new session.
    ///
    /// A rejected refresh token signs the user out locally.
    ///
    /// # Errors
    ///
    /// Returns an error if nobody is signed in, the session has no refresh
    /// token, or the server rejects the request.
    pub async fn refresh_session(&self) -> Result<Session> {
        let current = self.session().await.ok_or(Error::NotSignedIn)?;
        let refresh_token = current.refresh_token()?;

        let response = self
            .http_client
            .post(self.endpoint("auth/v1/token")?)
            .query(&[("grant_type", "refresh_token")])
            .header("apikey", &self.api_key)
            .json(&RefreshGrant { refresh_token })
            .send()
            .await?;

        match parse::<TokenResponse>(response).await {
            Ok(token) => {
                let mut session = Session::from_response(token);
                if session.user.is_none() {
                    session.user.clone_from(&current.user);
                }
                self.adopt(AuthEvent::TokenRefreshed, Some(session.clone()))
                    .await;
                Ok(session)
            }
            Err(e @ Error::Auth { .. }) => {
                warn!("Refresh token rejected: {e}");
                self.adopt(AuthEvent::SignedOut, None).await;
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    /// Fetches the signed-in user from the server, validating the token.
    ///
    /// # Errors
    ///
    /// Returns an error if nobody is signed in or the server rejects the token.
    pub async fn get_user(&self) -> Result<User> {
        let session = self.session().await.ok_or(Error::NotSignedIn)?;

        let response = self
            .http_client
            .get(self.endpoint("auth/v1/user")?)
            .header("apikey", &self.api_key)
            .bearer_auth(&session.access_token)
            .send()
            .await?;

        parse(response).await
    }

    /// Changes attributes of the signed-in user.
    ///
    /// The held session picks up the returned user and a
    /// [`AuthEvent::UserUpdated`] event is emitted.
    ///
    /// # Errors
    ///
    /// Returns an error if nobody is signed in or the server rejects the update.
    pub async fn update_user(&self, update: &UserUpdate) -> Result<User> {
        let session = self.session().await.ok_or(Error::NotSignedIn)?;

        let response = self
            .http_client
            .put(self.endpoint("auth/v1/user")?)
            .header("apikey", &self.api_key)
            .bearer_auth(&session.access_token)
            .json(update)
            .send()
            .await?;

        let user: User = parse(response).await?;
        self.adopt(AuthEvent::UserUpdated, Some(session.with_user(user.clone())))
            .await;
        Ok(user)
    }

    /// Changes the password after confirming the current one.
    ///
    /// The current password is checked by signing in again with the held
    /// user's email.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotSignedIn` without a session, `Error::InvalidInput`
    /// if the new password is empty or the user has no email, and an auth
    /// error if the current password is wrong or the update is rejected.
    pub async fn update_password(&self, current: &str, new: &str) -> Result<User> {
        if new.is_empty() {
            return Err(Error::InvalidInput("New password is required".to_string()));
        }
        let session = self.session().await.ok_or(Error::NotSignedIn)?;
        let email = session
            .user
            .and_then(|user| user.email)
            .ok_or_else(|| Error::InvalidInput("Signed-in user has no email".to_string()))?;

        match self.sign_in_with_password(&email, current).await {
            Ok(_) => {}
            Err(Error::Auth { .. }) => {
                return Err(Error::auth(
                    "invalid_credentials",
                    "Current password is incorrect",
                ));
            }
            Err(e) => return Err(e),
        }

        self.update_user(&UserUpdate::password(new)).await
    }

    /// Sets the user's display name.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` for a blank name, otherwise the same
    /// errors as [`AuthClient::update_user`].
    pub async fn update_username(&self, username: &str) -> Result<User> {
        let username = username.trim();
        if username.is_empty() {
            return Err(Error::InvalidInput("Username cannot be empty".to_string()));
        }
        self.update_user(&UserUpdate::username(username)).await
    }

    async fn revoke(&self, session: &Session) -> Result<()> {
        let response = self
            .http_client
            .post(self.endpoint("auth/v1/logout")?)
            .header("apikey", &self.api_key)
            .bearer_auth(&session.access_token)
            .send()
            .await?;

        let status = response.status();
        if status.is_success()
            || matches!(
                status,
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::NOT_FOUND
            )
        {
            return Ok(());
        }

        let error: ErrorResponse = response.json().await.unwrap_or_default();
        Err(error.into_error(status))
    }

    async fn adopt(&self, event: AuthEvent, session: Option<Session>) {
        *self.session.write().await = session.clone();
        info!("Auth state changed: {event}");
        if self.events.send(AuthStateChange::new(event, session)).is_err() {
            debug!("No auth state listeners for {event}");
        }
    }
}

async fn parse<T: DeserializeOwned>(response: Response) -> Result<T> {
    let status = response.status();
    if !status.is_success() {
        let error: ErrorResponse = response.json().await.unwrap_or_default();
        return Err(error.into_error(status));
    }
    Ok(response.json().await?)
}

#[async_trait]
impl RemoteAuthority for AuthClient {
    async fn get_current_session(&self) -> Result<Option<Session>> {
        match self.session().await {
            None => Ok(None),
            Some(session)
                if session.expires_within(Utc::now().timestamp(), REFRESH_MARGIN_SECS) =>
            {
                debug!("Held session near expiry, refreshing");
                self.refresh_session().await.map(Some)
            }
            Some(session) => Ok(Some(session)),
        }
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session> {
        let response = self
            .http_client
            .post(self.endpoint("auth/v1/token")?)
            .query(&[("grant_type", "password")])
            .header("apikey", &self.api_key)
            .json(&PasswordCredentials { email, password })
            .send()
            .await?;

        let token: TokenResponse = parse(response).await?;
        let session = Session::from_response(token);
        self.adopt(AuthEvent::SignedIn, Some(session.clone())).await;
        Ok(session)
    }

    async fn sign_out(&self) -> Result<()> {
        let held = self.session().await;
        let result = match &held {
            Some(session) => self.revoke(session).await,
            None => Ok(()),
        };

        // Local sign-out happens even when the server call failed.
        self.adopt(AuthEvent::SignedOut, None).await;
        result
    }

    fn on_auth_state_change(&self) -> broadcast::Receiver<AuthStateChange> {
        self.events.subscribe()
    }
}
