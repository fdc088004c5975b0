//! Entity store abstraction
//!
//! The sync engine only sees this trait; [`Database`] is the SQLite
//! implementation used in production.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::database::Database;
use super::models::{EntityKey, Post, User};
use crate::error::Result;

/// Durable, queryable storage for timeline entities
///
/// Errors are storage-engine failures; implementations never turn them
/// into empty results.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EntityStore: Send + Sync {
    /// Up to `limit` posts of `origin` strictly older than `older_than`,
    /// newest first. `None` means "the most recent page".
    async fn read_latest(
        &self,
        origin: &str,
        older_than: Option<DateTime<Utc>>,
        limit: usize,
    ) -> Result<Vec<Post>>;

    /// Up to `limit` posts of `origin` strictly newer than `newer_than`,
    /// oldest first.
    async fn read_oldest(
        &self,
        origin: &str,
        newer_than: Option<DateTime<Utc>>,
        limit: usize,
    ) -> Result<Vec<Post>>;

    async fn read_by_key(&self, key: &EntityKey) -> Result<Option<Post>>;

    /// Upsert posts and everything they own, atomically for the whole batch
    async fn save(&self, posts: &[Post]) -> Result<()>;

    async fn read_users_by_key(&self, keys: &[EntityKey]) -> Result<Vec<User>>;

    async fn save_users(&self, users: &[User]) -> Result<()>;
}

#[async_trait]
impl EntityStore for Database {
    async fn read_latest(
        &self,
        origin: &str,
        older_than: Option<DateTime<Utc>>,
        limit: usize,
    ) -> Result<Vec<Post>> {
        self.read_latest_posts(origin, older_than, limit).await
    }

    async fn read_oldest(
        &self,
        origin: &str,
        newer_than: Option<DateTime<Utc>>,
        limit: usize,
    ) -> Result<Vec<Post>> {
        self.read_oldest_posts(origin, newer_than, limit).await
    }

    async fn read_by_key(&self, key: &EntityKey) -> Result<Option<Post>> {
        self.get_post(key).await
    }

    async fn save(&self, posts: &[Post]) -> Result<()> {
        self.save_posts(posts).await
    }

    async fn read_users_by_key(&self, keys: &[EntityKey]) -> Result<Vec<User>> {
        self.get_users(keys).await
    }

    async fn save_users(&self, users: &[User]) -> Result<()> {
        self.upsert_users(users).await
    }
}
