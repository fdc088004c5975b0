//! E2E tests for timeline operations

mod common;

use common::{StubMode, TestServer, created_at_millis};
use feedline::data::{EntityKey, EntityStore, Post};
use feedline::error::AppError;
use feedline::service::TimelineResult;
use futures::StreamExt;

async fn collect(
    stream: feedline::service::TimelineStream,
) -> Vec<Result<TimelineResult, AppError>> {
    stream.collect().await
}

fn ids(posts: &[Post]) -> Vec<String> {
    posts.iter().map(|p| p.key.local_id.clone()).collect()
}

#[tokio::test]
async fn test_cold_cache_loads_from_server_and_persists() {
    let server = TestServer::new(5).await;
    let credential = server.state.current_credential().unwrap();

    let stages = collect(server.state.timeline.load_latest(credential, 3)).await;

    assert_eq!(stages.len(), 1);
    let stage = stages.into_iter().next().unwrap().unwrap();
    assert!(!stage.is_local());
    assert_eq!(ids(stage.posts()), vec!["5", "4", "3"]);
    assert_eq!(
        stage.posts()[0].created_at.timestamp_millis(),
        created_at_millis(5)
    );

    let cached = server
        .state
        .db
        .read_by_key(&EntityKey::new(server.origin.clone(), "4"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(cached.sender.username, "alice");
    assert_eq!(cached.favourites_count, 4);

    let requests = server.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(
        requests[0].authorization.as_deref(),
        Some("Bearer test-access-token")
    );
    assert_eq!(requests[0].query.get("local").map(String::as_str), Some("true"));
    assert!(!requests[0].query.contains_key("min_id"));
}

#[tokio::test]
async fn test_warm_cache_emits_local_then_only_new_posts() {
    let server = TestServer::new(3).await;
    let credential = server.state.current_credential().unwrap();

    collect(server.state.timeline.load_latest(credential.clone(), 20)).await;
    server.publish(4);

    let stages: Vec<TimelineResult> = collect(server.state.timeline.load_latest(credential, 20))
        .await
        .into_iter()
        .map(|stage| stage.unwrap())
        .collect();

    assert_eq!(stages.len(), 2);
    assert!(stages[0].is_local());
    assert_eq!(ids(stages[0].posts()), vec!["3", "2", "1"]);
    assert_eq!(ids(stages[1].posts()), vec!["4"]);

    let requests = server.requests();
    assert_eq!(requests[1].query.get("min_id").map(String::as_str), Some("3"));
}

#[tokio::test]
async fn test_load_older_pages_past_the_cache() {
    let server = TestServer::new(6).await;
    let credential = server.state.current_credential().unwrap();

    let first = collect(server.state.timeline.load_latest(credential.clone(), 2)).await;
    let newest_page = first.into_iter().next().unwrap().unwrap().into_posts();
    let anchor = newest_page.last().unwrap().clone();
    assert_eq!(anchor.key.local_id, "5");

    let stages: Vec<TimelineResult> =
        collect(server.state.timeline.load_older(credential, &anchor, 2))
            .await
            .into_iter()
            .map(|stage| stage.unwrap())
            .collect();

    assert_eq!(stages.len(), 1);
    assert_eq!(ids(stages[0].posts()), vec!["4", "3"]);

    let requests = server.requests();
    assert_eq!(requests[1].query.get("max_id").map(String::as_str), Some("5"));
}

#[tokio::test]
async fn test_load_newer_served_from_cache_skips_server() {
    let server = TestServer::new(6).await;
    let credential = server.state.current_credential().unwrap();

    let first = collect(server.state.timeline.load_latest(credential.clone(), 6)).await;
    let cached = first.into_iter().next().unwrap().unwrap().into_posts();
    let anchor = cached.last().unwrap().clone();

    let stages = collect(server.state.timeline.load_newer(credential, &anchor, 2)).await;

    assert_eq!(stages.len(), 1);
    assert_eq!(
        ids(stages[0].as_ref().unwrap().posts()),
        vec!["2", "3"]
    );
    assert_eq!(server.requests().len(), 1);
}

#[tokio::test]
async fn test_server_outage_after_local_stage() {
    let server = TestServer::new(2).await;
    let credential = server.state.current_credential().unwrap();

    collect(server.state.timeline.load_latest(credential.clone(), 20)).await;
    server.set_mode(StubMode::Unavailable);

    let mut stages = collect(server.state.timeline.load_latest(credential, 20)).await;

    assert_eq!(stages.len(), 2);
    assert!(matches!(
        stages.pop().unwrap(),
        Err(AppError::ServerRejected {
            status: 503,
            error: None,
            ..
        })
    ));
    assert!(stages.pop().unwrap().unwrap().is_local());
}

#[tokio::test]
async fn test_undecodable_page_is_malformed_response() {
    let server = TestServer::new(2).await;
    server.set_mode(StubMode::Garbage);
    let credential = server.state.current_credential().unwrap();

    let stages = collect(server.state.timeline.load_latest(credential, 20)).await;

    assert_eq!(stages.len(), 1);
    assert!(matches!(
        stages.into_iter().next().unwrap(),
        Err(AppError::MalformedResponse(_))
    ));
}

#[tokio::test]
async fn test_rejected_token_surfaces_server_error_code() {
    let server = TestServer::new(2).await;
    let mut credential = server.state.current_credential().unwrap();
    credential.access_token = "revoked".to_string();

    let stages = collect(server.state.timeline.load_latest(credential, 20)).await;

    match stages.into_iter().next().unwrap() {
        Err(AppError::ServerRejected {
            status,
            error,
            description,
        }) => {
            assert_eq!(status, 401);
            assert_eq!(error.as_deref(), Some("invalid_token"));
            assert_eq!(description.as_deref(), Some("The access token is invalid"));
        }
        other => panic!("unexpected stage: {:?}", other),
    }
}

#[tokio::test]
async fn test_unreachable_server_is_transport_error() {
    let server = TestServer::new(0).await;
    let mut credential = server.state.current_credential().unwrap();
    // Nothing listens on port 9 (discard) in the test environment
    credential.origin_server = "127.0.0.1:9".to_string();

    let stages = collect(server.state.timeline.load_latest(credential, 20)).await;

    assert_eq!(stages.len(), 1);
    assert!(matches!(
        stages.into_iter().next().unwrap(),
        Err(AppError::Transport(_))
    ));
}
