//! # revibe-core
//!
//! Local persistence and session synchronization for Revibe.
//!
//! This crate provides:
//! - **Item Store** - `SQLite` storage for recyclable items and their upcycling ideas
//! - **Session Cache** - durable single-slot cache of the signed-in session
//! - **Connectivity** - network reachability state and transitions
//! - **Session Reconciler** - offline-first bootstrap and keep-in-sync of the session
//! - **Configuration** - JSON settings with environment overrides

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod config;
pub mod connectivity;
mod error;
pub mod items;
pub mod session;

pub use config::{CacheBackend, Config};
pub use connectivity::{ConnectivityMonitor, ManualConnectivity, NetworkState, ProbeConnectivity};
pub use error::{Error, Result};
pub use items::{
    BinCategory, Idea, Item, ItemId, ItemStore, ItemUpdate, NewItem, SharedItemStore,
    ValidationError, ValidationResult, validate_category, validate_new_item, validate_update,
};
pub use session::{
    FileStore, KeyValueStore, KeyringStore, MemoryStore, Phase, Reconciler, SessionCache,
};
