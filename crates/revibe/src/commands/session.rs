//! Session commands.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Subcommand;
use revibe_auth::{RemoteAuthority, Session, User};
use revibe_core::Reconciler;

use crate::app::App;

#[derive(Subcommand, Debug)]
pub enum SessionAction {
    /// Show who is signed in and until when
    Status {
        /// Also verify the token with the auth server
        #[arg(long)]
        verify: bool,
    },
    /// Sign in with email and password
    Login {
        /// Account email
        #[arg(short, long)]
        email: String,
        /// Account password
        #[arg(short, long, env = "REVIBE_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Create an account
    Signup {
        /// Account email
        #[arg(short, long)]
        email: String,
        /// Account password
        #[arg(short, long, env = "REVIBE_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Change the account password
    Passwd {
        /// Current password
        #[arg(long, env = "REVIBE_PASSWORD", hide_env_values = true)]
        current: String,
        /// New password
        #[arg(long, env = "REVIBE_NEW_PASSWORD", hide_env_values = true)]
        new: String,
    },
    /// Set the display name shown for the account
    Rename {
        /// New display name
        name: String,
    },
    /// Sign out and forget the cached session
    Logout,
    /// Fetch the session from the auth server again
    Resync,
}

pub async fn run(app: &App, action: SessionAction) -> Result<()> {
    match action {
        SessionAction::Status { verify } => {
            print_session(app.reconciler.session().as_ref());
            if verify {
                let user = app.auth()?.get_user().await?;
                println!("Verified user {}", user.id);
            }
        }
        SessionAction::Login { email, password } => {
            let session = app.auth()?.sign_in_with_password(&email, &password).await?;
            let token = session.access_token.clone();
            app.await_session(|current| current.is_some_and(|s| s.access_token == token))
                .await?;
            println!("Signed in");
            print_session(Some(&session));
        }
        SessionAction::Signup { email, password } => {
            match app.auth()?.sign_up(&email, &password).await? {
                Some(session) => {
                    let token = session.access_token.clone();
                    app.await_session(|current| current.is_some_and(|s| s.access_token == token))
                        .await?;
                    println!("Account created and signed in");
                    print_session(Some(&session));
                }
                None => println!("Account created; check {email} to confirm it"),
            }
        }
        SessionAction::Passwd { current, new } => {
            let auth = app.auth()?;
            auth.update_password(&current, &new).await?;
            await_held_session(app).await?;
            println!("Password changed");
        }
        SessionAction::Rename { name } => {
            let user = app.auth()?.update_username(&name).await?;
            await_held_session(app).await?;
            println!("Display name set to {}", user.username().unwrap_or(name.trim()));
        }
        SessionAction::Logout => {
            let revoked = app.auth()?.sign_out().await;
            app.await_session(|current| current.is_none()).await?;
            revoked.context("Signed out locally, but the server did not revoke the session")?;
            println!("Signed out");
        }
        SessionAction::Resync => {
            let session = app.reconciler.force_resync().await?;
            print_session(session.as_ref());
        }
    }

    Ok(())
}

/// Waits until the reconciler has applied the auth client's current session.
async fn await_held_session(app: &App) -> Result<()> {
    let held = app.auth()?.session().await;
    app.await_session(|current| current == held.as_ref()).await
}

fn print_session(session: Option<&Session>) {
    let Some(session) = session else {
        println!("Not signed in");
        return;
    };

    let who = session
        .user
        .as_ref()
        .map_or("unknown user", |user| user.email.as_deref().unwrap_or(&user.id));
    match session.user.as_ref().and_then(User::username) {
        Some(name) => println!("Signed in as {name} <{who}>"),
        None => println!("Signed in as {who}"),
    }

    let now = Utc::now().timestamp();
    if let (Some(expires_at), Some(remaining)) =
        (session.expires_at, session.seconds_remaining(now))
    {
        let when = DateTime::<Utc>::from_timestamp(expires_at, 0)
            .map_or_else(|| expires_at.to_string(), |t| t.to_rfc3339());
        let state = if Reconciler::is_valid(Some(session)) {
            "valid"
        } else {
            "expiring"
        };
        if remaining > 0 {
            println!("Expires {when} (in {}, {state})", format_duration(remaining));
        } else {
            println!("Expired {when} ({} ago)", format_duration(-remaining));
        }
    }
}

fn format_duration(secs: i64) -> String {
    match secs {
        s if s < 60 => format!("{s}s"),
        s if s < 3600 => format!("{}m", s / 60),
        s => format!("{}h {}m", s / 3600, (s % 3600) / 60),
    }
}
