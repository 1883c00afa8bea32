//! Revibe - recycling journal with offline-first sign-in.
//!
//! # Configuration
//!
//! Settings are read from `<config_dir>/revibe/config.json`. The following
//! environment variables override the file:
//!
//! - `REVIBE_AUTH_URL`: base URL of the auth server
//! - `REVIBE_AUTH_KEY`: public API key for the auth server
//! - `REVIBE_DATABASE`: path of the item database
//!
//! Log output is controlled with `RUST_LOG`.

mod app;
mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use app::App;
use commands::items::ItemsAction;
use commands::session::SessionAction;

/// Revibe - keep track of what you recycle and how to reuse it
#[derive(Parser, Debug)]
#[command(name = "revibe")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Manage recyclable items
    Items {
        #[command(subcommand)]
        action: ItemsAction,
    },
    /// Manage the signed-in session
    Session {
        #[command(subcommand)]
        action: SessionAction,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "revibe=info,revibe_core=info,revibe_auth=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let app = App::start().await?;

    let outcome = match cli.command {
        Commands::Items { action } => commands::items::run(&app, action).await,
        Commands::Session { action } => commands::session::run(&app, action).await,
    };

    app.finish().await;
    outcome
}
