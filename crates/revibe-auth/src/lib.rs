//! # revibe-auth
//!
//! Remote authentication for Revibe.
//!
//! ## Features
//!
//! - **Session types**: access token, expiry and user identity, serializable for caching
//! - **Auth events**: sign-in, sign-out and refresh notifications over a broadcast channel
//! - **Remote authority trait**: the narrow interface the session reconciler consumes
//! - **HTTP client**: password sign-in, sign-up, sign-out, token refresh and user
//!   updates against a GoTrue-compatible auth server
//!
//! ## Quick Start
//!
//! ```ignore
//! use revibe_auth::{AuthClient, RemoteAuthority};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = AuthClient::new("https://project.example.co", "public-anon-key")?;
//!     let mut events = client.on_auth_state_change();
//!
//!     let session = client.sign_in_with_password("me@example.com", "secret").await?;
//!     println!("Signed in, token expires at {:?}", session.expires_at);
//!
//!     let change = events.recv().await?;
//!     println!("Event: {}", change.event);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod authority;
mod client;
mod error;
mod event;
mod session;

pub use authority::RemoteAuthority;
pub use client::{AuthClient, REFRESH_MARGIN_SECS};
pub use error::{Error, Result};
pub use event::{AuthEvent, AuthStateChange};
pub use session::{Session, TokenResponse, User, UserUpdate};
