//! SQLite database operations
//!
//! All cache persistence goes through this module. Rows are stored
//! normalized and assembled back into [`Post`] values in a fixed number
//! of batch queries, independent of page size.

use sqlx::sqlite::{
    SqliteConnectOptions, SqliteConnection, SqliteJournalMode, SqlitePoolOptions, SqliteRow,
};
use anyhow::Context;
use sqlx::{Pool, QueryBuilder, Sqlite};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::time::{Duration, Instant};

use super::models::*;
use crate::error::AppError;
use crate::metrics;

/// Default pool size when the caller doesn't specify one
pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;

/// SQLite caps bound parameters per statement; keep IN lists well below it
const BATCH_CHUNK_SIZE: usize = 100;

/// Direction a page of posts is returned in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    /// Newest first
    Descending,
    /// Oldest first
    Ascending,
}

/// Total order over posts: timestamp, then origin server, then local id
pub fn compare_posts(a: &Post, b: &Post) -> Ordering {
    a.created_at
        .cmp(&b.created_at)
        .then_with(|| a.key.cmp(&b.key))
}

fn sort_posts(posts: &mut [Post], order: SortOrder) {
    match order {
        SortOrder::Ascending => posts.sort_by(compare_posts),
        SortOrder::Descending => posts.sort_by(|a, b| compare_posts(b, a)),
    }
}

/// LIMIT value for SQLite, where a negative limit means "no limit"
fn sql_limit(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

fn count(value: i64) -> u32 {
    value.clamp(0, i64::from(u32::MAX)) as u32
}

fn push_unique(keys: &mut Vec<EntityKey>, seen: &mut HashSet<EntityKey>, key: EntityKey) {
    if seen.insert(key.clone()) {
        keys.push(key);
    }
}

/// Database connection pool wrapper.
pub struct Database {
    pool: Pool<Sqlite>,
}

impl Database {
    // =========================================================================
    // Connection
    // =========================================================================

    /// Connect to SQLite database
    ///
    /// Creates the database file if it doesn't exist.
    /// Runs pending migrations automatically.
    pub async fn connect(path: &Path) -> Result<Self, AppError> {
        Self::connect_with_pool_size(path, DEFAULT_MAX_CONNECTIONS).await
    }

    /// Connect with an explicit connection pool size
    pub async fn connect_with_pool_size(
        path: &Path,
        max_connections: u32,
    ) -> Result<Self, AppError> {
        // Create parent directory if it doesn't exist
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create database directory {}", parent.display())
            })?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect_with(options)
            .await?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| {
                tracing::error!("Migration failed: {}", e);
                AppError::Migration(e)
            })?;

        tracing::info!(path = %path.display(), "Database connected and migrated successfully");

        Ok(Self { pool })
    }

    #[cfg(test)]
    pub(crate) fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    // =========================================================================
    // Posts
    // =========================================================================

    /// Newest-first page of posts belonging to `origin`
    ///
    /// A post belongs to `origin` if it originates there or was reshared
    /// into that server's timeline. `older_than = None` means unbounded.
    pub async fn read_latest_posts(
        &self,
        origin: &str,
        older_than: Option<chrono::DateTime<chrono::Utc>>,
        limit: usize,
    ) -> Result<Vec<Post>, AppError> {
        let started = Instant::now();
        let bound = older_than.map_or(i64::MAX, |at| at.timestamp_millis());

        let rows = sqlx::query_as::<_, PostRow>(
            r#"
            SELECT * FROM posts
            WHERE (server = ? OR reblogged_from_server = ?) AND created_at_ms < ?
            ORDER BY created_at_ms DESC, server DESC, local_id DESC
            LIMIT ?
            "#,
        )
        .bind(origin)
        .bind(origin)
        .bind(bound)
        .bind(sql_limit(limit))
        .fetch_all(&self.pool)
        .await?;

        let posts = self.assemble(rows, SortOrder::Descending).await?;
        metrics::observe_store_query("read_latest", started.elapsed());
        Ok(posts)
    }

    /// Oldest-first page of posts belonging to `origin`
    ///
    /// `newer_than = None` means unbounded.
    pub async fn read_oldest_posts(
        &self,
        origin: &str,
        newer_than: Option<chrono::DateTime<chrono::Utc>>,
        limit: usize,
    ) -> Result<Vec<Post>, AppError> {
        let started = Instant::now();
        let bound = newer_than.map_or(i64::MIN, |at| at.timestamp_millis());

        let rows = sqlx::query_as::<_, PostRow>(
            r#"
            SELECT * FROM posts
            WHERE (server = ? OR reblogged_from_server = ?) AND created_at_ms > ?
            ORDER BY created_at_ms ASC, server ASC, local_id ASC
            LIMIT ?
            "#,
        )
        .bind(origin)
        .bind(origin)
        .bind(bound)
        .bind(sql_limit(limit))
        .fetch_all(&self.pool)
        .await?;

        let posts = self.assemble(rows, SortOrder::Ascending).await?;
        metrics::observe_store_query("read_oldest", started.elapsed());
        Ok(posts)
    }

    /// Get a single assembled post by key
    pub async fn get_post(&self, key: &EntityKey) -> Result<Option<Post>, AppError> {
        let started = Instant::now();

        let row = sqlx::query_as::<_, PostRow>(
            "SELECT * FROM posts WHERE server = ? AND local_id = ?",
        )
        .bind(&key.origin_server)
        .bind(&key.local_id)
        .fetch_optional(&self.pool)
        .await?;

        let post = match row {
            Some(row) => self.assemble(vec![row], SortOrder::Descending).await?.pop(),
            None => None,
        };
        metrics::observe_store_query("read_by_key", started.elapsed());
        Ok(post)
    }

    /// Upsert a batch of posts with their users, media and cards
    ///
    /// The whole batch commits or rolls back as one transaction.
    pub async fn save_posts(&self, posts: &[Post]) -> Result<(), AppError> {
        if posts.is_empty() {
            return Ok(());
        }

        let started = Instant::now();
        let mut tx = self.pool.begin().await?;

        for post in posts {
            upsert_user(&mut tx, &post.sender).await?;
            if let Some(reblogger) = &post.reblogging_user {
                upsert_user(&mut tx, reblogger).await?;
            }
            if let Some(card) = &post.card {
                upsert_card(&mut tx, &post.key, card).await?;
            }
            for (position, media) in post.media.iter().enumerate() {
                upsert_media(&mut tx, &post.key, position, media).await?;
            }
            upsert_post_row(&mut tx, post).await?;
            replace_tags(&mut tx, post).await?;
            replace_mentions(&mut tx, post).await?;
        }

        tx.commit().await?;

        tracing::debug!(count = posts.len(), "Saved posts");
        metrics::observe_store_query("save", started.elapsed());
        Ok(())
    }

    // =========================================================================
    // Users
    // =========================================================================

    /// Get users by key; unknown keys are skipped
    pub async fn get_users(&self, keys: &[EntityKey]) -> Result<Vec<User>, AppError> {
        let started = Instant::now();
        let users = self
            .fetch_users(keys)
            .await?
            .into_iter()
            .map(User::from)
            .collect();
        metrics::observe_store_query("read_users", started.elapsed());
        Ok(users)
    }

    /// Upsert standalone users in one transaction
    pub async fn upsert_users(&self, users: &[User]) -> Result<(), AppError> {
        if users.is_empty() {
            return Ok(());
        }

        let started = Instant::now();
        let mut tx = self.pool.begin().await?;
        for user in users {
            upsert_user(&mut tx, user).await?;
        }
        tx.commit().await?;

        metrics::observe_store_query("save_users", started.elapsed());
        Ok(())
    }

    // =========================================================================
    // Assembly
    // =========================================================================

    /// Resolve foreign keys of raw post rows in batch and build domain posts
    ///
    /// Rows whose sender is missing are dropped rather than returned
    /// half-built.
    async fn assemble(&self, rows: Vec<PostRow>, order: SortOrder) -> Result<Vec<Post>, AppError> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let post_keys: Vec<EntityKey> = rows.iter().map(PostRow::key).collect();

        let mut user_keys = Vec::new();
        let mut seen = HashSet::new();
        for row in &rows {
            push_unique(&mut user_keys, &mut seen, row.sender_key());
            if let Some(key) = row.reblogger_key() {
                push_unique(&mut user_keys, &mut seen, key);
            }
        }

        let users: HashMap<EntityKey, User> = self
            .fetch_users(&user_keys)
            .await?
            .into_iter()
            .map(|row| (row.key(), User::from(row)))
            .collect();

        let mut media_by_post: HashMap<EntityKey, Vec<Media>> = HashMap::new();
        for row in self
            .fetch_owned::<MediaRow>("media", "position ASC, rowid ASC", &post_keys)
            .await?
        {
            let Some(media_type) = MediaType::parse(&row.media_type) else {
                tracing::warn!(url = %row.url, media_type = %row.media_type, "Skipping media with unknown type");
                continue;
            };
            media_by_post
                .entry(EntityKey::new(row.post_server, row.post_id))
                .or_default()
                .push(Media {
                    media_type,
                    url: row.url,
                    preview_url: row.preview_url,
                    blurhash: row.blurhash,
                });
        }

        // Later rows win when stale cards are still attached to a post
        let mut card_by_post: HashMap<EntityKey, Card> = HashMap::new();
        for row in self
            .fetch_owned::<CardRow>("cards", "rowid ASC", &post_keys)
            .await?
        {
            let Some(card_type) = CardType::parse(&row.card_type) else {
                tracing::warn!(url = %row.url, card_type = %row.card_type, "Skipping card with unknown type");
                continue;
            };
            card_by_post.insert(
                EntityKey::new(row.post_server, row.post_id),
                Card {
                    card_type,
                    url: row.url,
                    title: row.title,
                    description: row.description,
                    author_name: row.author_name,
                    preview_url: row.preview_url,
                    blurhash: row.blurhash,
                },
            );
        }

        let mut tags_by_post: HashMap<EntityKey, Vec<String>> = HashMap::new();
        for row in self
            .fetch_owned::<TagRow>("post_tags", "position ASC", &post_keys)
            .await?
        {
            tags_by_post
                .entry(EntityKey::new(row.post_server, row.post_id))
                .or_default()
                .push(row.name);
        }

        let mut mentions_by_post: HashMap<EntityKey, Vec<Mention>> = HashMap::new();
        for row in self
            .fetch_owned::<MentionRow>("post_mentions", "position ASC", &post_keys)
            .await?
        {
            mentions_by_post
                .entry(EntityKey::new(row.post_server, row.post_id))
                .or_default()
                .push(Mention {
                    user_key: EntityKey::new(row.user_server, row.user_id),
                    username: row.username,
                });
        }

        let mut posts = Vec::with_capacity(rows.len());
        for row in rows {
            let key = row.key();
            let Some(sender) = users.get(&row.sender_key()).cloned() else {
                tracing::debug!(post = %key, "Dropping post whose sender is not stored");
                continue;
            };
            let reblogging_user = row.reblogger_key().and_then(|k| users.get(&k).cloned());

            posts.push(Post {
                uri: row.uri.clone(),
                created_at: row.created_at(),
                sender,
                reblogging_user,
                reblogged_from_server: row.reblogged_from_server,
                in_reply_to_id: row.in_reply_to_id,
                in_reply_to_account_id: row.in_reply_to_account_id,
                content: row.content,
                hashtags: tags_by_post.remove(&key).unwrap_or_default(),
                mentions: mentions_by_post.remove(&key).unwrap_or_default(),
                media: media_by_post.remove(&key).unwrap_or_default(),
                card: card_by_post.remove(&key),
                replies_count: count(row.replies_count),
                reblogs_count: count(row.reblogs_count),
                favourites_count: count(row.favourites_count),
                reblogged: row.reblogged,
                favourited: row.favourited,
                key,
            });
        }

        sort_posts(&mut posts, order);
        Ok(posts)
    }

    async fn fetch_users(&self, keys: &[EntityKey]) -> Result<Vec<UserRow>, AppError> {
        let mut rows = Vec::new();

        for chunk in keys.chunks(BATCH_CHUNK_SIZE) {
            let mut query_builder =
                QueryBuilder::<Sqlite>::new("SELECT * FROM users WHERE (server, local_id) IN (");
            query_builder.push_values(chunk, |mut tuple, key| {
                tuple
                    .push_bind(key.origin_server.clone())
                    .push_bind(key.local_id.clone());
            });
            query_builder.push(")");

            rows.extend(
                query_builder
                    .build_query_as::<UserRow>()
                    .fetch_all(&self.pool)
                    .await?,
            );
        }

        Ok(rows)
    }

    /// Batch-load rows of a table owned by posts (`post_server`, `post_id`)
    async fn fetch_owned<T>(
        &self,
        table: &'static str,
        order_by: &'static str,
        post_keys: &[EntityKey],
    ) -> Result<Vec<T>, AppError>
    where
        T: for<'r> sqlx::FromRow<'r, SqliteRow> + Send + Unpin,
    {
        let mut rows = Vec::new();

        for chunk in post_keys.chunks(BATCH_CHUNK_SIZE) {
            let mut query_builder = QueryBuilder::<Sqlite>::new(format!(
                "SELECT * FROM {table} WHERE (post_server, post_id) IN ("
            ));
            query_builder.push_values(chunk, |mut tuple, key| {
                tuple
                    .push_bind(key.origin_server.clone())
                    .push_bind(key.local_id.clone());
            });
            query_builder.push(") ORDER BY ").push(order_by);

            rows.extend(
                query_builder
                    .build_query_as::<T>()
                    .fetch_all(&self.pool)
                    .await?,
            );
        }

        Ok(rows)
    }
}

// =============================================================================
// Upsert helpers (run inside the caller's transaction)
// =============================================================================

async fn upsert_user(conn: &mut SqliteConnection, user: &User) -> Result<(), AppError> {
    sqlx::query(
        r#"
        INSERT INTO users (server, local_id, username, display_name, avatar_url)
        VALUES (?, ?, ?, ?, ?)
        ON CONFLICT(server, local_id) DO UPDATE SET
            username = excluded.username,
            display_name = excluded.display_name,
            avatar_url = excluded.avatar_url
        "#,
    )
    .bind(&user.key.origin_server)
    .bind(&user.key.local_id)
    .bind(&user.username)
    .bind(&user.display_name)
    .bind(&user.avatar_url)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

async fn upsert_card(
    conn: &mut SqliteConnection,
    post_key: &EntityKey,
    card: &Card,
) -> Result<(), AppError> {
    sqlx::query(
        r#"
        INSERT OR REPLACE INTO cards (
            url, post_server, post_id, card_type, title, description,
            author_name, preview_url, blurhash
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&card.url)
    .bind(&post_key.origin_server)
    .bind(&post_key.local_id)
    .bind(card.card_type.as_str())
    .bind(&card.title)
    .bind(&card.description)
    .bind(&card.author_name)
    .bind(&card.preview_url)
    .bind(&card.blurhash)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

async fn upsert_media(
    conn: &mut SqliteConnection,
    post_key: &EntityKey,
    position: usize,
    media: &Media,
) -> Result<(), AppError> {
    sqlx::query(
        r#"
        INSERT OR REPLACE INTO media (
            url, post_server, post_id, position, media_type, preview_url, blurhash
        ) VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&media.url)
    .bind(&post_key.origin_server)
    .bind(&post_key.local_id)
    .bind(position as i64)
    .bind(media.media_type.as_str())
    .bind(&media.preview_url)
    .bind(&media.blurhash)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

async fn upsert_post_row(conn: &mut SqliteConnection, post: &Post) -> Result<(), AppError> {
    let reblogger = post.reblogging_user.as_ref().map(|user| &user.key);

    sqlx::query(
        r#"
        INSERT OR REPLACE INTO posts (
            server, local_id, uri, created_at_ms, sender_server, sender_id,
            reblogger_server, reblogger_id, reblogged_from_server,
            in_reply_to_id, in_reply_to_account_id, content,
            replies_count, reblogs_count, favourites_count, reblogged, favourited
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&post.key.origin_server)
    .bind(&post.key.local_id)
    .bind(&post.uri)
    .bind(post.timestamp_millis())
    .bind(&post.sender.key.origin_server)
    .bind(&post.sender.key.local_id)
    .bind(reblogger.map(|key| key.origin_server.as_str()))
    .bind(reblogger.map(|key| key.local_id.as_str()))
    .bind(&post.reblogged_from_server)
    .bind(&post.in_reply_to_id)
    .bind(&post.in_reply_to_account_id)
    .bind(&post.content)
    .bind(i64::from(post.replies_count))
    .bind(i64::from(post.reblogs_count))
    .bind(i64::from(post.favourites_count))
    .bind(post.reblogged)
    .bind(post.favourited)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

async fn replace_tags(conn: &mut SqliteConnection, post: &Post) -> Result<(), AppError> {
    sqlx::query("DELETE FROM post_tags WHERE post_server = ? AND post_id = ?")
        .bind(&post.key.origin_server)
        .bind(&post.key.local_id)
        .execute(&mut *conn)
        .await?;

    for (position, name) in post.hashtags.iter().enumerate() {
        sqlx::query(
            "INSERT INTO post_tags (post_server, post_id, position, name) VALUES (?, ?, ?, ?)",
        )
        .bind(&post.key.origin_server)
        .bind(&post.key.local_id)
        .bind(position as i64)
        .bind(name)
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}

async fn replace_mentions(conn: &mut SqliteConnection, post: &Post) -> Result<(), AppError> {
    sqlx::query("DELETE FROM post_mentions WHERE post_server = ? AND post_id = ?")
        .bind(&post.key.origin_server)
        .bind(&post.key.local_id)
        .execute(&mut *conn)
        .await?;

    for (position, mention) in post.mentions.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO post_mentions (
                post_server, post_id, position, user_server, user_id, username
            ) VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&post.key.origin_server)
        .bind(&post.key.local_id)
        .bind(position as i64)
        .bind(&mention.user_key.origin_server)
        .bind(&mention.user_key.local_id)
        .bind(&mention.username)
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}
