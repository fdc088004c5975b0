//! Remote feed client
//!
//! Fetches one page of the home timeline from a Mastodon-compatible
//! server and maps it to domain posts.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;
use url::Url;

use super::converters::status_to_post;
use super::dto::{ErrorResponse, StatusResponse};
use super::transport::{HttpResponse, HttpTransport};
use crate::auth::Credential;
use crate::data::Post;
use crate::error::AppError;
use crate::metrics;

const HOME_TIMELINE_PATH: &str = "/api/v1/timelines/home";

/// Page window for a home timeline request
///
/// `min_id` asks for entries newer than that id, `max_id` for entries
/// older than it. Absent or empty cursors are left off the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub min_id: Option<String>,
    pub max_id: Option<String>,
    pub limit: usize,
    pub local_only: bool,
}

impl PageRequest {
    /// Most recent page, no cursor
    pub fn latest(limit: usize) -> Self {
        Self {
            min_id: None,
            max_id: None,
            limit,
            local_only: true,
        }
    }

    pub fn newer_than(min_id: impl Into<String>, limit: usize) -> Self {
        Self {
            min_id: Some(min_id.into()),
            ..Self::latest(limit)
        }
    }

    pub fn older_than(max_id: impl Into<String>, limit: usize) -> Self {
        Self {
            max_id: Some(max_id.into()),
            ..Self::latest(limit)
        }
    }

    pub fn with_local_only(mut self, local_only: bool) -> Self {
        self.local_only = local_only;
        self
    }
}

/// Source of home timeline pages
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RemoteFeedClient: Send + Sync {
    /// Fetch one page of the home timeline of `credential`'s server
    ///
    /// Posts come back in the server's order (newest first).
    async fn fetch_home(
        &self,
        credential: &Credential,
        page: &PageRequest,
    ) -> Result<Vec<Post>, AppError>;
}

/// Mastodon REST implementation of [`RemoteFeedClient`]
pub struct MastodonClient {
    transport: Arc<dyn HttpTransport>,
    protocol: String,
}

impl MastodonClient {
    pub fn new(transport: Arc<dyn HttpTransport>, protocol: impl Into<String>) -> Self {
        Self {
            transport,
            protocol: protocol.into(),
        }
    }

    /// Build the request URL for a page of `origin`'s home timeline
    pub fn home_timeline_url(&self, origin: &str, page: &PageRequest) -> Result<Url, AppError> {
        if origin.is_empty() || origin.contains(['/', '?', '#', '@']) {
            return Err(AppError::InvalidRequest(format!(
                "invalid origin server: {:?}",
                origin
            )));
        }

        let mut url = Url::parse(&format!("{}://{}{}", self.protocol, origin, HOME_TIMELINE_PATH))
            .map_err(|e| AppError::InvalidRequest(format!("invalid origin server {:?}: {}", origin, e)))?;

        {
            let mut query = url.query_pairs_mut();
            query.append_pair("limit", &page.limit.to_string());
            if let Some(min_id) = page.min_id.as_deref().filter(|id| !id.is_empty()) {
                query.append_pair("min_id", min_id);
            }
            if let Some(max_id) = page.max_id.as_deref().filter(|id| !id.is_empty()) {
                query.append_pair("max_id", max_id);
            }
            if page.local_only {
                query.append_pair("local", "true");
            }
        }

        Ok(url)
    }
}

#[async_trait]
impl RemoteFeedClient for MastodonClient {
    async fn fetch_home(
        &self,
        credential: &Credential,
        page: &PageRequest,
    ) -> Result<Vec<Post>, AppError> {
        let url = self.home_timeline_url(&credential.origin_server, page)?;
        tracing::debug!(%url, "Fetching home timeline");

        let started = Instant::now();
        let response = match self.transport.get(url, &credential.access_token).await {
            Ok(response) => response,
            Err(e) => {
                metrics::observe_remote_request("error", started.elapsed());
                return Err(e);
            }
        };
        metrics::observe_remote_request(status_class(response.status), started.elapsed());

        if !response.is_success() {
            return Err(rejection(&response));
        }

        let statuses: Vec<StatusResponse> = serde_json::from_slice(&response.body)
            .map_err(|e| AppError::MalformedResponse(format!("home timeline: {}", e)))?;

        let posts: Vec<Post> = statuses
            .iter()
            .map(|status| status_to_post(status, &credential.origin_server))
            .collect();

        tracing::debug!(
            origin = %credential.origin_server,
            count = posts.len(),
            "Fetched home timeline page"
        );

        Ok(posts)
    }
}

fn status_class(status: u16) -> &'static str {
    match status {
        200..=299 => "2xx",
        300..=399 => "3xx",
        400..=499 => "4xx",
        500..=599 => "5xx",
        _ => "other",
    }
}

/// Non-success reply to an error; the body is decoded when it is a
/// Mastodon error document
fn rejection(response: &HttpResponse) -> AppError {
    let body = serde_json::from_slice::<ErrorResponse>(&response.body).ok();

    tracing::warn!(
        status = response.status,
        error = body.as_ref().map(|b| b.error.as_str()),
        "Home timeline request rejected"
    );

    AppError::ServerRejected {
        status: response.status,
        error: body.as_ref().map(|b| b.error.clone()),
        description: body.and_then(|b| b.error_description),
    }
}
