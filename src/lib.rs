//! Feedline - offline-first home timeline sync for Mastodon-compatible servers
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Service Layer                            │
//! │  - TimelineRepository: load_latest / load_newer / load_older │
//! │  - Emits Local (cache) then Remote (server) stages           │
//! └─────────────────────────────────────────────────────────────┘
//!               │                               │
//! ┌───────────────────────────┐   ┌─────────────────────────────┐
//! │        Data Layer          │   │         API Layer            │
//! │  - EntityStore trait       │   │  - RemoteFeedClient trait    │
//! │  - SQLite (sqlx)           │   │  - Mastodon REST (reqwest)   │
//! └───────────────────────────┘   └─────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - `data`: Domain model and the SQLite entity store
//! - `api`: Home timeline client and wire types
//! - `service`: Timeline sync engine
//! - `auth`: Session credentials
//! - `config`: Configuration management
//! - `logging`: Tracing setup
//! - `metrics`: Prometheus instruments
//! - `error`: Error types

pub mod api;
pub mod auth;
pub mod config;
pub mod data;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod service;

use std::sync::Arc;

use auth::CredentialProvider;

/// Application state
///
/// Owns the store, the remote client and the timeline repository built
/// on them. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<config::AppConfig>,

    /// Timeline cache database
    pub db: Arc<data::Database>,

    /// Home timeline sync engine
    pub timeline: service::TimelineRepository,

    /// Credential of the logged-in session
    pub credentials: Arc<dyn CredentialProvider>,
}

impl AppState {
    /// Initialize application state
    ///
    /// # Steps
    /// 1. Connect to SQLite database (runs migrations)
    /// 2. Build the HTTP transport and feed client
    /// 3. Wire the timeline repository
    ///
    /// # Errors
    /// Returns error if any initialization step fails
    pub async fn new(config: config::AppConfig) -> Result<Self, error::AppError> {
        tracing::info!("Initializing application state...");
        metrics::init_metrics();

        // 1. Connect to SQLite database
        let db = Arc::new(
            data::Database::connect_with_pool_size(
                &config.database.path,
                config.database.max_connections,
            )
            .await?,
        );
        tracing::info!("Database connected");

        // 2. Remote feed client
        let transport =
            api::ReqwestTransport::new(&config.remote.user_agent, config.remote.timeout())?;
        let remote = Arc::new(api::MastodonClient::new(
            Arc::new(transport),
            config.remote.protocol.to_ascii_lowercase(),
        ));

        // 3. Timeline repository
        let timeline = service::TimelineRepository::new(db.clone(), remote)
            .with_local_only(config.remote.local_only);

        let credentials: Arc<dyn CredentialProvider> =
            Arc::new(config.account.credential_provider());

        tracing::info!(
            server = %config.account.server,
            page_size = config.timeline.page_size,
            "Application state initialized successfully"
        );

        Ok(Self {
            config: Arc::new(config),
            db,
            timeline,
            credentials,
        })
    }

    /// Credential of the logged-in session
    pub fn current_credential(&self) -> Result<auth::Credential, error::AppError> {
        self.credentials.credential()
    }

    /// Configured page size for timeline loads
    pub fn page_size(&self) -> usize {
        self.config.timeline.page_size
    }
}
