//! Recyclable item storage.
//!
//! Items live in a single `SQLite` table; each item's ideas are folded into
//! one text column by [`ideas`].

pub mod ideas;
mod model;
mod repository;
mod validation;

pub use model::{BinCategory, DATE_FORMAT, Idea, Item, ItemId, ItemUpdate, NewItem, TIME_FORMAT};
pub use repository::{DEFAULT_RECENT_LIMIT, ItemStore, SharedItemStore};
pub use validation::{
    ValidationError, ValidationResult, validate_category, validate_new_item, validate_update,
};
