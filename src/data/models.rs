//! Data models
//!
//! Domain values shared by the store, the remote client and the sync
//! engine, plus the normalized row structs the store reads back from
//! SQLite. Timestamps are millisecond precision UTC.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// Composite key
// =============================================================================

/// Identity of a user or post across the federation
///
/// A local id alone is not unique: two servers may both hand out id "1".
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityKey {
    pub origin_server: String,
    pub local_id: String,
}

impl EntityKey {
    pub fn new(origin_server: impl Into<String>, local_id: impl Into<String>) -> Self {
        Self {
            origin_server: origin_server.into(),
            local_id: local_id.into(),
        }
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.origin_server, self.local_id)
    }
}

// =============================================================================
// User
// =============================================================================

/// Account as displayed in a feed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub key: EntityKey,
    pub username: String,
    pub display_name: String,
    pub avatar_url: String,
}

// =============================================================================
// Post
// =============================================================================

/// A timeline entry, fully assembled
///
/// For a reshare, `sender` is the author of the reshared content and
/// `reblogging_user` is the account that reshared it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub key: EntityKey,
    /// Canonical federation identifier
    pub uri: String,
    pub created_at: DateTime<Utc>,
    pub sender: User,
    pub reblogging_user: Option<User>,
    pub reblogged_from_server: Option<String>,
    pub in_reply_to_id: Option<String>,
    pub in_reply_to_account_id: Option<String>,
    /// Raw server-supplied HTML
    pub content: String,
    pub hashtags: Vec<String>,
    pub mentions: Vec<Mention>,
    pub media: Vec<Media>,
    pub card: Option<Card>,
    pub replies_count: u32,
    pub reblogs_count: u32,
    pub favourites_count: u32,
    pub reblogged: bool,
    pub favourited: bool,
}

impl Post {
    /// Timestamp as stored (milliseconds since the Unix epoch)
    pub fn timestamp_millis(&self) -> i64 {
        self.created_at.timestamp_millis()
    }

    /// Whether this entry is a reshare of another post
    pub fn is_reblog(&self) -> bool {
        self.reblogging_user.is_some()
    }
}

/// Mention of another account inside a post
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mention {
    pub user_key: EntityKey,
    pub username: String,
}

// =============================================================================
// Media
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Image,
    Gif,
    Video,
    Audio,
}

impl MediaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Gif => "gif",
            Self::Video => "video",
            Self::Audio => "audio",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "image" => Some(Self::Image),
            "gif" => Some(Self::Gif),
            "video" => Some(Self::Video),
            "audio" => Some(Self::Audio),
            _ => None,
        }
    }
}

/// Attachment owned by exactly one post, identified by its asset URL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Media {
    pub media_type: MediaType,
    pub url: String,
    /// May be empty
    pub preview_url: String,
    /// May be empty
    pub blurhash: String,
}

// =============================================================================
// Card
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CardType {
    Link,
    Image,
    Video,
    Rich,
}

impl CardType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Link => "link",
            Self::Image => "image",
            Self::Video => "video",
            Self::Rich => "rich",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "link" => Some(Self::Link),
            "image" => Some(Self::Image),
            "video" => Some(Self::Video),
            "rich" => Some(Self::Rich),
            _ => None,
        }
    }
}

/// Link preview; a post has at most one
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Card {
    pub card_type: CardType,
    pub url: String,
    pub title: String,
    pub description: String,
    pub author_name: String,
    pub preview_url: String,
    pub blurhash: String,
}

// =============================================================================
// Normalized rows
// =============================================================================

/// `users` table row
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserRow {
    pub server: String,
    pub local_id: String,
    pub username: String,
    pub display_name: String,
    pub avatar_url: String,
}

impl UserRow {
    pub fn key(&self) -> EntityKey {
        EntityKey::new(&self.server, &self.local_id)
    }
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        Self {
            key: EntityKey::new(row.server, row.local_id),
            username: row.username,
            display_name: row.display_name,
            avatar_url: row.avatar_url,
        }
    }
}

/// `posts` table row; user, media and card references are unresolved
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PostRow {
    pub server: String,
    pub local_id: String,
    pub uri: String,
    pub created_at_ms: i64,
    pub sender_server: String,
    pub sender_id: String,
    pub reblogger_server: Option<String>,
    pub reblogger_id: Option<String>,
    pub reblogged_from_server: Option<String>,
    pub in_reply_to_id: Option<String>,
    pub in_reply_to_account_id: Option<String>,
    pub content: String,
    pub replies_count: i64,
    pub reblogs_count: i64,
    pub favourites_count: i64,
    pub reblogged: bool,
    pub favourited: bool,
}

impl PostRow {
    pub fn key(&self) -> EntityKey {
        EntityKey::new(&self.server, &self.local_id)
    }

    pub fn sender_key(&self) -> EntityKey {
        EntityKey::new(&self.sender_server, &self.sender_id)
    }

    pub fn reblogger_key(&self) -> Option<EntityKey> {
        match (&self.reblogger_server, &self.reblogger_id) {
            (Some(server), Some(id)) => Some(EntityKey::new(server, id)),
            _ => None,
        }
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        millis_to_datetime(self.created_at_ms)
    }
}

/// `media` table row
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct MediaRow {
    pub url: String,
    pub post_server: String,
    pub post_id: String,
    pub position: i64,
    pub media_type: String,
    pub preview_url: String,
    pub blurhash: String,
}

/// `cards` table row
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CardRow {
    pub url: String,
    pub post_server: String,
    pub post_id: String,
    pub card_type: String,
    pub title: String,
    pub description: String,
    pub author_name: String,
    pub preview_url: String,
    pub blurhash: String,
}

/// `post_tags` table row
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TagRow {
    pub post_server: String,
    pub post_id: String,
    pub position: i64,
    pub name: String,
}

/// `post_mentions` table row
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct MentionRow {
    pub post_server: String,
    pub post_id: String,
    pub position: i64,
    pub user_server: String,
    pub user_id: String,
    pub username: String,
}

/// Convert a stored millisecond timestamp back to a UTC datetime
///
/// Out-of-range values clamp to the Unix epoch.
pub fn millis_to_datetime(millis: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(millis)
        .single()
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_key_equality_uses_both_fields() {
        let a = EntityKey::new("mastodon.social", "1");
        let b = EntityKey::new("fosstodon.org", "1");
        let c = EntityKey::new("mastodon.social", "1");

        assert_ne!(a, b);
        assert_eq!(a, c);

        let set: std::collections::HashSet<_> = [a, b, c].into_iter().collect();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn media_and_card_types_round_trip_through_storage_names() {
        for media_type in [MediaType::Image, MediaType::Gif, MediaType::Video, MediaType::Audio] {
            assert_eq!(MediaType::parse(media_type.as_str()), Some(media_type));
        }
        for card_type in [CardType::Link, CardType::Image, CardType::Video, CardType::Rich] {
            assert_eq!(CardType::parse(card_type.as_str()), Some(card_type));
        }
        assert_eq!(MediaType::parse("gifv"), None);
    }

    #[test]
    fn millis_conversion_preserves_precision() {
        let at = millis_to_datetime(1_700_000_000_123);
        assert_eq!(at.timestamp_millis(), 1_700_000_000_123);
    }
}
