//! Session and user types.

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Identity payload attached to a session.
///
/// Only `id` and `email` are modelled; every other field the server sends
/// is kept verbatim in `metadata` so a cached session round-trips intact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// Server-assigned user id.
    pub id: String,
    /// Email address, if the account has one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Remaining user attributes.
    #[serde(flatten)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl User {
    /// Creates a user with only an id.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: None,
            metadata: serde_json::Map::new(),
        }
    }

    /// Sets the email address.
    #[must_use]
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Display name stored in the user's metadata, if set.
    #[must_use]
    pub fn username(&self) -> Option<&str> {
        self.metadata
            .get("user_metadata")
            .and_then(|data| data.get("username"))
            .and_then(serde_json::Value::as_str)
    }
}

/// Attributes to change on the signed-in user.
///
/// Unset fields are left untouched by the server.
#[derive(Clone, Default, Serialize)]
pub struct UserUpdate {
    /// New password.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    /// Keys to merge into the user's metadata.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Map<String, serde_json::Value>>,
}

impl UserUpdate {
    /// Update that only changes the password.
    #[must_use]
    pub fn password(password: impl Into<String>) -> Self {
        Self {
            password: Some(password.into()),
            data: None,
        }
    }

    /// Update that only changes the display name.
    #[must_use]
    pub fn username(username: impl Into<String>) -> Self {
        let mut data = serde_json::Map::new();
        data.insert("username".to_string(), serde_json::Value::String(username.into()));
        Self {
            password: None,
            data: Some(data),
        }
    }
}

impl std::fmt::Debug for UserUpdate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserUpdate")
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("data", &self.data)
            .finish()
    }
}

/// An authenticated session issued by the remote authority.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Opaque bearer token.
    pub access_token: String,
    /// Token type (usually "bearer").
    #[serde(default = "default_token_type")]
    pub token_type: String,
    /// Expiry as epoch seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
    /// Refresh token for obtaining a new access token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Signed-in identity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
}

fn default_token_type() -> String {
    "bearer".to_string()
}

impl Session {
    /// Creates a session with only an access token.
    #[must_use]
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            token_type: default_token_type(),
            expires_at: None,
            refresh_token: None,
            user: None,
        }
    }

    /// Creates a session from a token grant response.
    #[must_use]
    pub fn from_response(response: TokenResponse) -> Self {
        let expires_at = response
            .expires_at
            .or_else(|| response.expires_in.map(|secs| Utc::now().timestamp() + secs));

        Self {
            access_token: response.access_token,
            token_type: response.token_type,
            expires_at,
            refresh_token: response.refresh_token,
            user: response.user,
        }
    }

    /// Sets the expiry (epoch seconds).
    #[must_use]
    pub const fn with_expires_at(mut self, expires_at: i64) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    /// Sets the refresh token.
    #[must_use]
    pub fn with_refresh_token(mut self, refresh_token: impl Into<String>) -> Self {
        self.refresh_token = Some(refresh_token.into());
        self
    }

    /// Sets the user.
    #[must_use]
    pub fn with_user(mut self, user: User) -> Self {
        self.user = Some(user);
        self
    }

    /// Returns true if the session expires within `margin_secs` of `now`
    /// (epoch seconds). A session without an expiry never expires here.
    #[must_use]
    pub fn expires_within(&self, now: i64, margin_secs: i64) -> bool {
        self.expires_at
            .is_some_and(|exp| exp <= now.saturating_add(margin_secs))
    }

    /// Seconds until expiry relative to `now`, if an expiry is known.
    #[must_use]
    pub fn seconds_remaining(&self, now: i64) -> Option<i64> {
        self.expires_at.map(|exp| exp - now)
    }

    /// Returns the refresh token if available.
    ///
    /// # Errors
    ///
    /// Returns an error if no refresh token is available.
    pub fn refresh_token(&self) -> crate::Result<&str> {
        self.refresh_token
            .as_deref()
            .ok_or(crate::Error::NoRefreshToken)
    }
}

/// Token grant response from the auth server.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TokenResponse {
    /// Access token.
    pub access_token: String,
    /// Token type.
    #[serde(default = "default_token_type")]
    pub token_type: String,
    /// Lifetime in seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<i64>,
    /// Absolute expiry in epoch seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
    /// Refresh token.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Signed-in user.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_username_read_from_metadata() {
        let user: User = serde_json::from_str(
            r#"{"id":"u1","email":"me@example.com","user_metadata":{"username":"greenthumb"}}"#,
        )
        .unwrap();
        assert_eq!(user.username(), Some("greenthumb"));
        assert_eq!(User::new("u2").username(), None);
    }

    #[test]
    fn test_user_update_serializes_only_set_fields() {
        let body = serde_json::to_value(UserUpdate::username("greenthumb")).unwrap();
        assert_eq!(body, serde_json::json!({"data": {"username": "greenthumb"}}));

        let update = UserUpdate::password("s3cret-pass");
        let body = serde_json::to_value(&update).unwrap();
        assert_eq!(body, serde_json::json!({"password": "s3cret-pass"}));
        assert!(!format!("{update:?}").contains("s3cret-pass"));
    }

    #[test]
    fn test_seconds_remaining() {
        let session = Session::new("a").with_expires_at(1_000);
        assert_eq!(session.seconds_remaining(400), Some(600));
        assert_eq!(session.seconds_remaining(1_200), Some(-200));
        assert_eq!(Session::new("b").seconds_remaining(0), None);
    }

    #[test]
    fn test_from_response_prefers_absolute_expiry() {
        let response = TokenResponse {
            access_token: "abc".to_string(),
            token_type: "bearer".to_string(),
            expires_in: Some(3600),
            expires_at: Some(1_700_000_000),
            refresh_token: Some("r1".to_string()),
            user: None,
        };

        let session = Session::from_response(response);
        assert_eq!(session.expires_at, Some(1_700_000_000));
        assert_eq!(session.refresh_token().unwrap(), "r1");
    }

    #[test]
    fn test_from_response_derives_expiry_from_lifetime() {
        let response = TokenResponse {
            access_token: "abc".to_string(),
            token_type: "bearer".to_string(),
            expires_in: Some(3600),
            expires_at: None,
            refresh_token: None,
            user: None,
        };

        let before = Utc::now().timestamp();
        let session = Session::from_response(response);
        let expires_at = session.expires_at.unwrap();
        assert!(expires_at >= before + 3600);
        assert!(session.refresh_token().is_err());
    }

    #[test]
    fn test_expires_within() {
        let session = Session::new("t").with_expires_at(1_000);
        assert!(session.expires_within(900, 100));
        assert!(session.expires_within(1_200, 0));
        assert!(!session.expires_within(800, 100));
        assert!(!Session::new("t").expires_within(i64::MAX, 300));
    }

    #[test]
    fn test_user_keeps_unknown_fields() {
        let json = r#"{"id":"u1","email":"a@b.c","role":"authenticated","aud":"authenticated"}"#;
        let user: User = serde_json::from_str(json).unwrap();
        assert_eq!(user.id, "u1");
        assert_eq!(user.email.as_deref(), Some("a@b.c"));
        assert_eq!(user.metadata["role"], "authenticated");

        let back = serde_json::to_value(&user).unwrap();
        assert_eq!(back["aud"], "authenticated");
    }

    #[test]
    fn test_session_serde_defaults() {
        let session: Session = serde_json::from_str(r#"{"access_token":"x"}"#).unwrap();
        assert_eq!(session.token_type, "bearer");
        assert!(session.expires_at.is_none());
        assert!(session.user.is_none());
    }
}
