//! Common test utilities for E2E tests
//!
//! Runs a stub of the Mastodon home timeline endpoint on a random local
//! port and wires a full `AppState` against it.

#![allow(dead_code)]

use axum::{
    Json, Router,
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
};
use chrono::{TimeZone, Utc};
use feedline::api::{AccountResponse, ErrorResponse, StatusResponse};
use feedline::{AppState, config};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tokio::net::TcpListener;

pub const ACCESS_TOKEN: &str = "test-access-token";

/// How the stub answers the next requests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StubMode {
    Serve,
    Unavailable,
    Garbage,
}

/// Request as seen by the stub
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub query: HashMap<String, String>,
    pub authorization: Option<String>,
}

#[derive(Debug)]
struct StubState {
    /// Newest first, ids are numeric strings
    feed: Vec<StatusResponse>,
    mode: StubMode,
    requests: Vec<RecordedRequest>,
}

type SharedStub = Arc<Mutex<StubState>>;

/// Test server instance
pub struct TestServer {
    pub origin: String,
    pub state: AppState,
    pub _temp_dir: TempDir,
    stub: SharedStub,
}

impl TestServer {
    /// Create a new test server instance serving `feed_size` posts
    pub async fn new(feed_size: u64) -> Self {
        let stub = Arc::new(Mutex::new(StubState {
            feed: (1..=feed_size).rev().map(status).collect(),
            mode: StubMode::Serve,
            requests: Vec::new(),
        }));

        // Bind to random port
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let app = Router::new()
            .route("/api/v1/timelines/home", get(home_timeline))
            .with_state(stub.clone());

        // Spawn server in background
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        // Create temporary directory for test database
        let temp_dir = TempDir::new().unwrap();
        let origin = addr.to_string();

        let config = config::AppConfig {
            database: config::DatabaseConfig {
                path: temp_dir.path().join("test.db"),
                max_connections: 2,
            },
            remote: config::RemoteConfig {
                protocol: "http".to_string(),
                user_agent: "feedline-e2e".to_string(),
                timeout_seconds: 10,
                local_only: true,
            },
            timeline: config::TimelineConfig { page_size: 20 },
            account: config::AccountConfig {
                server: origin.clone(),
                access_token: Some(ACCESS_TOKEN.to_string()),
            },
            logging: config::LoggingConfig {
                level: "debug".to_string(),
                format: "pretty".to_string(),
            },
        };
        config.validate().unwrap();

        // Initialize app state
        let state = AppState::new(config).await.unwrap();

        Self {
            origin,
            state,
            _temp_dir: temp_dir,
            stub,
        }
    }

    pub fn set_mode(&self, mode: StubMode) {
        self.stub.lock().unwrap().mode = mode;
    }

    /// Publish a new post at the top of the feed
    pub fn publish(&self, id: u64) {
        self.stub.lock().unwrap().feed.insert(0, status(id));
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.stub.lock().unwrap().requests.clone()
    }
}

/// Millisecond timestamp the stub assigns to post `id`
pub fn created_at_millis(id: u64) -> i64 {
    1_700_000_000_000 + id as i64 * 1_000
}

fn status(id: u64) -> StatusResponse {
    StatusResponse {
        id: id.to_string(),
        created_at: Utc.timestamp_millis_opt(created_at_millis(id)).unwrap(),
        in_reply_to_id: None,
        in_reply_to_account_id: None,
        uri: format!("https://stub.example/statuses/{}", id),
        replies_count: 0,
        reblogs_count: 0,
        favourites_count: id as i64,
        content: format!("<p>post {}</p>", id),
        reblog: None,
        account: AccountResponse {
            id: "1".to_string(),
            username: "alice".to_string(),
            acct: "alice".to_string(),
            display_name: "Alice".to_string(),
            avatar: "https://stub.example/alice.png".to_string(),
        },
        media_attachments: vec![],
        mentions: vec![],
        tags: vec![],
        card: None,
        favourited: Some(false),
        reblogged: Some(false),
    }
}

fn id_param(query: &HashMap<String, String>, name: &str) -> Option<u64> {
    query.get(name).and_then(|value| value.parse().ok())
}

async fn home_timeline(
    State(stub): State<SharedStub>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    let authorization = headers
        .get("authorization")
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);

    let mut stub = stub.lock().unwrap();
    stub.requests.push(RecordedRequest {
        query: query.clone(),
        authorization: authorization.clone(),
    });

    let expected = format!("Bearer {}", ACCESS_TOKEN);
    if authorization.as_deref() != Some(expected.as_str()) {
        return (
            StatusCode::UNAUTHORIZED,
            Json(ErrorResponse {
                error: "invalid_token".to_string(),
                error_description: Some("The access token is invalid".to_string()),
            }),
        )
            .into_response();
    }

    match stub.mode {
        StubMode::Unavailable => {
            return (StatusCode::SERVICE_UNAVAILABLE, "<html>maintenance</html>").into_response();
        }
        StubMode::Garbage => {
            return (StatusCode::OK, r#"{"statuses": "soon"}"#).into_response();
        }
        StubMode::Serve => {}
    }

    let limit = query
        .get("limit")
        .and_then(|value| value.parse::<usize>().ok())
        .unwrap_or(20);
    let min_id = id_param(&query, "min_id");
    let max_id = id_param(&query, "max_id");

    let window: Vec<StatusResponse> = stub
        .feed
        .iter()
        .filter(|status| {
            let id: u64 = status.id.parse().unwrap();
            min_id.is_none_or(|min| id > min) && max_id.is_none_or(|max| id < max)
        })
        .cloned()
        .collect();

    // min_id pages start right after the cursor, others at the top
    let page: Vec<StatusResponse> = if min_id.is_some() {
        let skip = window.len().saturating_sub(limit);
        window.into_iter().skip(skip).collect()
    } else {
        window.into_iter().take(limit).collect()
    };

    Json(page).into_response()
}
