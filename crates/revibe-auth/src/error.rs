//! Error types for remote authentication.

/// Result type alias for authentication operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by the remote authority.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// HTTP request error (unreachable host, TLS failure, timeout).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The auth server rejected the request.
    #[error("Auth error: {code} - {message}")]
    Auth {
        /// Error code reported by the server (e.g., `invalid_grant`).
        code: String,
        /// Human-readable description.
        message: String,
    },

    /// The operation requires a signed-in session.
    #[error("Not signed in")]
    NotSignedIn,

    /// The held session cannot be refreshed.
    #[error("No refresh token available")]
    NoRefreshToken,

    /// A request argument was rejected before contacting the server.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Invalid client configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// URL parsing error.
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),
}

impl Error {
    /// Creates an auth error from error code and message.
    #[must_use]
    pub fn auth(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Auth {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Returns true if the failure came from the transport rather than
    /// from the server rejecting the request.
    #[must_use]
    pub const fn is_unreachable(&self) -> bool {
        matches!(self, Self::Http(_))
    }
}
