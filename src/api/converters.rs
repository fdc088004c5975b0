//! Conversion functions from API DTOs to domain models

use crate::api::dto::*;
use crate::data::{
    Card, CardType, EntityKey, Media, MediaType, Mention, Post, User, millis_to_datetime,
};

/// Server an account belongs to, given its `acct` handle
///
/// Handles of the form `user@server` name their home server; a bare
/// `user` belongs to the server the request was made against.
pub fn origin_from_acct(acct: &str, requesting_server: &str) -> String {
    match acct.trim_start_matches('@').split_once('@') {
        Some((_, server)) if !server.is_empty() => server.to_string(),
        _ => requesting_server.to_string(),
    }
}

/// Convert AccountResponse to User
pub fn account_to_user(account: &AccountResponse, requesting_server: &str) -> User {
    User {
        key: EntityKey::new(
            origin_from_acct(&account.acct, requesting_server),
            account.id.clone(),
        ),
        username: account.username.clone(),
        display_name: account.display_name.clone(),
        avatar_url: account.avatar.clone(),
    }
}

/// Convert a wire media type; `None` for types the timeline can't show
pub fn media_type_from_wire(value: &str) -> Option<MediaType> {
    match value {
        "image" => Some(MediaType::Image),
        "gifv" => Some(MediaType::Gif),
        "video" => Some(MediaType::Video),
        "audio" => Some(MediaType::Audio),
        _ => None,
    }
}

/// Convert a wire card type
pub fn card_type_from_wire(value: &str) -> Option<CardType> {
    match value {
        "link" => Some(CardType::Link),
        "photo" => Some(CardType::Image),
        "video" => Some(CardType::Video),
        "rich" => Some(CardType::Rich),
        _ => None,
    }
}

fn attachment_to_media(attachment: &MediaAttachmentResponse) -> Option<Media> {
    let media_type = media_type_from_wire(&attachment.media_type)?;
    Some(Media {
        media_type,
        url: attachment.url.clone(),
        preview_url: attachment.preview_url.clone().unwrap_or_default(),
        blurhash: attachment.blurhash.clone().unwrap_or_default(),
    })
}

fn card_response_to_card(card: &CardResponse) -> Option<Card> {
    if card.url.is_empty() {
        return None;
    }
    Some(Card {
        card_type: card_type_from_wire(&card.card_type)?,
        url: card.url.clone(),
        title: card.title.clone(),
        description: card.description.clone(),
        author_name: card.author_name.clone(),
        preview_url: card.image.clone().unwrap_or_default(),
        blurhash: card.blurhash.clone().unwrap_or_default(),
    })
}

fn counter(value: i64) -> u32 {
    value.clamp(0, i64::from(u32::MAX)) as u32
}

/// Convert one home timeline entry to a Post
///
/// A reshare keeps the timeline entry's id, timestamp and resharing
/// account; everything else comes from the reshared status.
pub fn status_to_post(status: &StatusResponse, requesting_server: &str) -> Post {
    let (content_status, reblogging_user, reblogged_from_server) = match status.reblog.as_deref() {
        Some(inner) => (
            inner,
            Some(account_to_user(&status.account, requesting_server)),
            Some(requesting_server.to_string()),
        ),
        None => (status, None, None),
    };

    let sender = account_to_user(&content_status.account, requesting_server);

    Post {
        key: EntityKey::new(sender.key.origin_server.clone(), status.id.clone()),
        uri: content_status.uri.clone(),
        // Stored precision is milliseconds; drop anything finer
        created_at: millis_to_datetime(status.created_at.timestamp_millis()),
        sender,
        reblogging_user,
        reblogged_from_server,
        in_reply_to_id: content_status.in_reply_to_id.clone(),
        in_reply_to_account_id: content_status.in_reply_to_account_id.clone(),
        content: content_status.content.clone(),
        hashtags: content_status.tags.iter().map(|tag| tag.name.clone()).collect(),
        mentions: content_status
            .mentions
            .iter()
            .map(|mention| Mention {
                user_key: EntityKey::new(
                    origin_from_acct(&mention.acct, requesting_server),
                    mention.id.clone(),
                ),
                username: mention.username.clone(),
            })
            .collect(),
        media: content_status
            .media_attachments
            .iter()
            .filter_map(attachment_to_media)
            .collect(),
        card: content_status.card.as_ref().and_then(card_response_to_card),
        replies_count: counter(content_status.replies_count),
        reblogs_count: counter(content_status.reblogs_count),
        favourites_count: counter(content_status.favourites_count),
        reblogged: content_status.reblogged.unwrap_or(false),
        favourited: content_status.favourited.unwrap_or(false),
    }
}
