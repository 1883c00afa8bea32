//! Session persistence and reconciliation.
//!
//! - [`store`]: durable key-value backends
//! - [`cache`]: the single-slot [`SessionCache`] and validity rule
//! - [`reconciler`]: the [`Reconciler`] owning the in-memory session

pub mod cache;
pub mod reconciler;
pub mod store;

pub use cache::{SESSION_KEY, SessionCache, VALIDITY_BUFFER_SECS, is_valid, is_valid_at};
pub use reconciler::{Phase, Reconciler};
pub use store::{CacheError, CacheResult, FileStore, KeyValueStore, KeyringStore, MemoryStore};
