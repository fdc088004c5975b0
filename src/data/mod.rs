//! Data layer module
//!
//! Handles all timeline persistence:
//! - Domain models shared across layers
//! - SQLite entity store (normalized tables, batch assembly)

mod database;
mod models;
mod store;

pub use database::{DEFAULT_MAX_CONNECTIONS, Database, SortOrder, compare_posts};
pub use models::*;
pub use store::EntityStore;

#[cfg(test)]
pub use store::MockEntityStore;
