//! Mastodon API wire types
//!
//! Only the fields the timeline needs are modelled; unknown fields are
//! ignored on decode.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Status response (one home timeline entry)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub id: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub in_reply_to_id: Option<String>,
    #[serde(default)]
    pub in_reply_to_account_id: Option<String>,
    #[serde(default)]
    pub uri: String,
    #[serde(default)]
    pub replies_count: i64,
    #[serde(default)]
    pub reblogs_count: i64,
    #[serde(default)]
    pub favourites_count: i64,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub reblog: Option<Box<StatusResponse>>,
    pub account: AccountResponse,
    #[serde(default)]
    pub media_attachments: Vec<MediaAttachmentResponse>,
    #[serde(default)]
    pub mentions: Vec<MentionResponse>,
    #[serde(default)]
    pub tags: Vec<TagResponse>,
    #[serde(default)]
    pub card: Option<CardResponse>,
    #[serde(default)]
    pub favourited: Option<bool>,
    #[serde(default)]
    pub reblogged: Option<bool>,
}

/// Account response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountResponse {
    pub id: String,
    pub username: String,
    /// `user` for accounts on the requesting server, `user@server` otherwise
    pub acct: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub avatar: String,
}

/// Media attachment response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaAttachmentResponse {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type")]
    pub media_type: String,
    pub url: String,
    #[serde(default)]
    pub preview_url: Option<String>,
    #[serde(default)]
    pub blurhash: Option<String>,
}

/// Preview card response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CardResponse {
    pub url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "type")]
    pub card_type: String,
    #[serde(default)]
    pub author_name: String,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub blurhash: Option<String>,
}

/// Mention response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MentionResponse {
    pub id: String,
    pub username: String,
    pub acct: String,
    #[serde(default)]
    pub url: String,
}

/// Tag response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagResponse {
    pub name: String,
    #[serde(default)]
    pub url: String,
}

/// Error body returned with non-success statuses
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(default)]
    pub error_description: Option<String>,
}
