//! Auth state change notifications.

use std::fmt;

use crate::Session;

/// Kind of auth state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthEvent {
    /// A user signed in.
    SignedIn,
    /// The user signed out.
    SignedOut,
    /// The access token was refreshed.
    TokenRefreshed,
    /// The user's attributes changed.
    UserUpdated,
}

impl AuthEvent {
    /// Wire name of the event.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::SignedIn => "SIGNED_IN",
            Self::SignedOut => "SIGNED_OUT",
            Self::TokenRefreshed => "TOKEN_REFRESHED",
            Self::UserUpdated => "USER_UPDATED",
        }
    }
}

impl fmt::Display for AuthEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An auth event together with the session it produced.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthStateChange {
    /// What happened.
    pub event: AuthEvent,
    /// Session after the event (`None` after sign-out).
    pub session: Option<Session>,
}

impl AuthStateChange {
    /// Creates a new state change.
    #[must_use]
    pub const fn new(event: AuthEvent, session: Option<Session>) -> Self {
        Self { event, session }
    }

    /// Creates a sign-out change.
    #[must_use]
    pub const fn signed_out() -> Self {
        Self::new(AuthEvent::SignedOut, None)
    }
}
