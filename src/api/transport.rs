//! HTTP transport
//!
//! The feed client only needs "GET this URL with this bearer token and
//! give me the status and the body". Keeping that behind a trait lets
//! the client be tested without a network.

use async_trait::async_trait;
use std::time::Duration;
use url::Url;

use crate::error::AppError;

/// Raw reply from a server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Performs authenticated GET requests
///
/// Errors are reserved for requests that never produced a reply; any
/// HTTP status, including 4xx/5xx, is returned as a response.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn get(&self, url: Url, bearer_token: &str) -> Result<HttpResponse, AppError>;
}

/// Production transport backed by a shared `reqwest::Client`
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()?;

        Ok(Self { client })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get(&self, url: Url, bearer_token: &str) -> Result<HttpResponse, AppError> {
        let response = self
            .client
            .get(url)
            .bearer_auth(bearer_token)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?;

        let status = response.status().as_u16();
        let body = response.bytes().await?.to_vec();

        Ok(HttpResponse { status, body })
    }
}
