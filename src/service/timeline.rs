//! Timeline service
//!
//! Serves the home timeline from the local cache first and then from
//! the server, writing fetched pages back to the cache.
//!
//! Each load returns a lazy stream of at most two stages, `Local` then
//! `Remote`. Nothing happens until the stream is polled, and dropping
//! it cancels whatever is still pending (including the network call
//! and the write-back).

use async_stream::stream;
use chrono::{DateTime, Utc};
use futures::Stream;
use std::pin::Pin;
use std::sync::Arc;

use crate::api::{PageRequest, RemoteFeedClient};
use crate::auth::Credential;
use crate::data::{EntityStore, Post};
use crate::error::AppError;
use crate::metrics;

/// One stage of a timeline load
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimelineResult {
    /// Posts served from the local cache
    Local(Vec<Post>),
    /// Posts fetched from the server (already written back)
    Remote(Vec<Post>),
}

impl TimelineResult {
    pub fn posts(&self) -> &[Post] {
        match self {
            Self::Local(posts) | Self::Remote(posts) => posts,
        }
    }

    pub fn into_posts(self) -> Vec<Post> {
        match self {
            Self::Local(posts) | Self::Remote(posts) => posts,
        }
    }

    pub fn is_local(&self) -> bool {
        matches!(self, Self::Local(_))
    }

    fn stage(&self) -> &'static str {
        if self.is_local() { "local" } else { "remote" }
    }
}

/// Stream returned by every timeline load
pub type TimelineStream = Pin<Box<dyn Stream<Item = Result<TimelineResult, AppError>> + Send>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Latest,
    Newer,
    Older,
}

impl Direction {
    fn operation(self) -> &'static str {
        match self {
            Direction::Latest => "load_latest",
            Direction::Newer => "load_newer",
            Direction::Older => "load_older",
        }
    }
}

/// Position a load is relative to
#[derive(Debug, Clone)]
struct Anchor {
    local_id: String,
    created_at: DateTime<Utc>,
}

impl From<&Post> for Anchor {
    fn from(post: &Post) -> Self {
        Self {
            local_id: post.key.local_id.clone(),
            created_at: post.created_at,
        }
    }
}

/// Home timeline repository
///
/// Holds no state between calls; concurrent loads are independent.
#[derive(Clone)]
pub struct TimelineRepository {
    store: Arc<dyn EntityStore>,
    remote: Arc<dyn RemoteFeedClient>,
    local_only: bool,
}

impl TimelineRepository {
    /// Create new timeline repository
    pub fn new(store: Arc<dyn EntityStore>, remote: Arc<dyn RemoteFeedClient>) -> Self {
        Self {
            store,
            remote,
            local_only: true,
        }
    }

    /// Whether remote requests ask for the local-only home feed
    pub fn with_local_only(mut self, local_only: bool) -> Self {
        self.local_only = local_only;
        self
    }

    /// Most recent page
    ///
    /// Emits the cached newest page (if any), then always asks the server
    /// for what is newer than it.
    pub fn load_latest(&self, credential: Credential, limit: usize) -> TimelineStream {
        self.load(Direction::Latest, credential, None, limit)
    }

    /// Page of posts newer than `anchor`, oldest first from the cache
    ///
    /// Skips the server when the cache alone fills the page.
    pub fn load_newer(&self, credential: Credential, anchor: &Post, limit: usize) -> TimelineStream {
        self.load(Direction::Newer, credential, Some(Anchor::from(anchor)), limit)
    }

    /// Page of posts older than `anchor`, newest first
    ///
    /// Skips the server when the cache alone fills the page.
    pub fn load_older(&self, credential: Credential, anchor: &Post, limit: usize) -> TimelineStream {
        self.load(Direction::Older, credential, Some(Anchor::from(anchor)), limit)
    }

    fn load(
        &self,
        direction: Direction,
        credential: Credential,
        anchor: Option<Anchor>,
        limit: usize,
    ) -> TimelineStream {
        let store = Arc::clone(&self.store);
        let remote = Arc::clone(&self.remote);
        let local_only = self.local_only;
        let operation = direction.operation();

        Box::pin(stream! {
            let origin = credential.origin_server.as_str();
            let bound = anchor.as_ref().map(|a| a.created_at);

            let local = match read_local(&*store, direction, origin, bound, limit).await {
                Ok(posts) => posts,
                Err(e) => {
                    tracing::warn!(operation, origin, error = %e, "Local timeline read failed, continuing with remote");
                    metrics::record_local_read_failure(operation);
                    Vec::new()
                }
            };
            tracing::debug!(operation, origin, cached = local.len(), limit, "Read local window");

            let page = remote_page(direction, &local, anchor.as_ref(), limit).with_local_only(local_only);
            let satisfied = direction != Direction::Latest && local.len() >= limit;

            if !local.is_empty() {
                let result = TimelineResult::Local(local);
                metrics::record_stage(operation, result.stage());
                yield Ok(result);
            }

            if satisfied {
                tracing::debug!(operation, origin, "Local window fills the page, skipping remote");
                return;
            }

            tracing::debug!(
                operation,
                origin,
                min_id = page.min_id.as_deref(),
                max_id = page.max_id.as_deref(),
                "Fetching remote page"
            );

            let fetched = match remote.fetch_home(&credential, &page).await {
                Ok(posts) => posts,
                Err(e) => {
                    tracing::warn!(operation, origin, error = %e, kind = e.kind(), "Remote timeline fetch failed");
                    yield Err(e);
                    return;
                }
            };

            if !fetched.is_empty() {
                if let Err(e) = store.save(&fetched).await {
                    tracing::warn!(operation, origin, error = %e, count = fetched.len(), "Failed to write fetched posts back to cache");
                    metrics::record_write_back_failure(operation);
                }
            }

            let result = TimelineResult::Remote(fetched);
            metrics::record_stage(operation, result.stage());
            yield Ok(result);
        })
    }
}

async fn read_local(
    store: &dyn EntityStore,
    direction: Direction,
    origin: &str,
    bound: Option<DateTime<Utc>>,
    limit: usize,
) -> Result<Vec<Post>, AppError> {
    match direction {
        Direction::Latest | Direction::Older => store.read_latest(origin, bound, limit).await,
        Direction::Newer => store.read_oldest(origin, bound, limit).await,
    }
}

/// Remote window contiguous with the local one
///
/// The cursor is the edge of the local window facing the unfetched
/// region, else the anchor itself.
fn remote_page(
    direction: Direction,
    local: &[Post],
    anchor: Option<&Anchor>,
    limit: usize,
) -> PageRequest {
    let anchor_id = || anchor.map(|a| a.local_id.clone());

    match direction {
        // newest first
        Direction::Latest => match local.first().map(|p| p.key.local_id.clone()).or_else(anchor_id) {
            Some(min_id) => PageRequest::newer_than(min_id, limit),
            None => PageRequest::latest(limit),
        },
        // oldest first
        Direction::Newer => match local.last().map(|p| p.key.local_id.clone()).or_else(anchor_id) {
            Some(min_id) => PageRequest::newer_than(min_id, limit),
            None => PageRequest::latest(limit),
        },
        // newest first
        Direction::Older => match local.last().map(|p| p.key.local_id.clone()).or_else(anchor_id) {
            Some(max_id) => PageRequest::older_than(max_id, limit),
            None => PageRequest::latest(limit),
        },
    }
}
