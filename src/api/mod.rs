//! Remote feed layer
//!
//! - Wire types for the Mastodon home timeline
//! - Wire to domain mapping
//! - HTTP transport and the feed client built on it

mod client;
mod converters;
mod dto;
mod transport;

pub use client::{MastodonClient, PageRequest, RemoteFeedClient};
pub use converters::*;
pub use dto::*;
pub use transport::{HttpResponse, HttpTransport, ReqwestTransport};

#[cfg(test)]
pub use client::MockRemoteFeedClient;
#[cfg(test)]
pub use transport::MockHttpTransport;
