//! Service layer
//!
//! Orchestration on top of the store and the remote client.

mod timeline;

pub use timeline::{TimelineRepository, TimelineResult, TimelineStream};
