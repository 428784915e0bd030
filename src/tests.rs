use super::*;
use crate::test_utils::{sample_workflow, sample_workflow_json, FakeSource, FakeStore};
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use serde_json::{json, Value};
use std::time::Duration;
use tower::ServiceExt;

/// Sets up an application state backed by in-memory fakes
///
/// The fake Argo server knows `argo/modgp-abcde`, with one file in each of
/// its two archivable artifacts.
fn setup_state() -> (AppState, Arc<FakeSource>, Arc<FakeStore>) {
    let source = Arc::new(FakeSource::new());
    source.add_workflow(sample_workflow("modgp-abcde"));
    source.add_file("modgp-abcde-1", "results", "modgp-abcde-1/outputs/model.csv", b"species,score\nx,1\n");
    source.add_file("modgp-abcde-1", "main-logs", "modgp-abcde-1/main.log", b"done\n");
    let store = FakeStore::shared();
    let state = AppState::new(source.clone(), store.clone());
    (state, source, store)
}

/// Sends a GET request and returns the status and parsed body
async fn get_json(app: Router, uri: &str) -> (StatusCode, Value) {
    let response = app
        .oneshot(Request::builder().uri(uri).method("GET").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&body).unwrap())
}

/// Waits until no ingest is running
async fn wait_for_idle(tracker: &IngestTracker) {
    for _ in 0..200 {
        if tracker.in_flight() == 0 {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("ingest did not finish in time");
}

/// Tests the notify handler for a finished workflow
///
/// This test verifies that:
/// 1. The request is answered with 202 Accepted and the artifact list
/// 2. The background ingest creates the dataset
#[tokio::test]
async fn test_notify_handler_accepts_succeeded_workflow() {
    let (state, _source, store) = setup_state();
    let app = create_app(state.clone());

    let (status, body) = get_json(app, "/notify/argo/modgp-abcde").await;

    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["status"], "accepted");
    assert_eq!(body["workflow_status"], "Succeeded");
    assert_eq!(body["workflow_name"], "modgp-abcde");
    assert_eq!(body["workflow_namespace"], "argo");
    assert_eq!(
        body["artifacts"],
        json!([
            { "node_id": "modgp-abcde-1", "path": "/outputs" },
            { "node_id": "modgp-abcde-1", "path": "main.log" }
        ])
    );
    assert!(body["job_id"].is_string());

    wait_for_idle(&state.tracker).await;
    assert_eq!(store.of_type("Dataset").len(), 1);
    assert_eq!(store.of_type("FileObject").len(), 2);
}

#[tokio::test]
async fn test_notify_handler_unknown_workflow() {
    let (state, _source, _store) = setup_state();
    let (status, body) = get_json(create_app(state), "/notify/argo/missing").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Workflow not found: argo/missing");
}

#[tokio::test]
async fn test_notify_handler_rejects_failed_workflow() {
    let (state, source, store) = setup_state();
    let mut raw = sample_workflow_json("failed-wf");
    raw["status"]["phase"] = json!("Failed");
    source.add_workflow(serde_json::from_value(raw).unwrap());

    let (status, body) = get_json(create_app(state), "/notify/argo/failed-wf").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Workflow did not succeed");
    assert!(store.is_empty());
}

#[tokio::test]
async fn test_notify_handler_rejects_workflow_without_artifacts() {
    let (state, source, store) = setup_state();
    let mut raw = sample_workflow_json("empty-wf");
    raw["status"]["nodes"] = json!({});
    source.add_workflow(serde_json::from_value(raw).unwrap());

    let (status, body) = get_json(create_app(state), "/notify/argo/empty-wf").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "No artifacts found");
    assert!(store.is_empty());
}

#[tokio::test]
async fn test_notify_handler_refuses_duplicate_while_running() {
    let (state, _source, store) = setup_state();
    let _guard = state.tracker.try_start("argo", "modgp-abcde").unwrap();

    let (status, body) = get_json(create_app(state.clone()), "/notify/argo/modgp-abcde").await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "Ingest already running for argo/modgp-abcde");
    assert!(store.is_empty());
}

#[tokio::test]
async fn test_notify_handler_releases_claim_after_failed_ingest() {
    let (state, _source, store) = setup_state();
    store.fail_on_create("Dataset");

    let (status, _) = get_json(create_app(state.clone()), "/notify/argo/modgp-abcde").await;
    assert_eq!(status, StatusCode::ACCEPTED);

    wait_for_idle(&state.tracker).await;
    assert!(store.is_empty(), "rollback should leave no objects behind");
    assert!(state.tracker.try_start("argo", "modgp-abcde").is_some());
}

/// Tests that shutdown rolls back an ingest that cannot finish
///
/// This test verifies that:
/// 1. Draining gives up on an ingest stuck in Cordra and cancels it
/// 2. The objects it had already created are deleted again
#[tokio::test]
async fn test_drain_rolls_back_stuck_ingest() {
    let (state, _source, store) = setup_state();
    store.stall_on_create("FileObject");

    let (status, _) = get_json(create_app(state.clone()), "/notify/argo/modgp-abcde").await;
    assert_eq!(status, StatusCode::ACCEPTED);

    // Both submitters are created before the first file stalls
    for _ in 0..200 {
        if store.len() == 2 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(store.len(), 2);

    let completed = state.tracker.drain(Duration::from_millis(50)).await;

    assert!(!completed);
    assert!(store.is_empty(), "cancelled ingest left objects behind");
    let mut expected = store.created_ids();
    expected.reverse();
    assert_eq!(store.deleted(), expected);
    assert_eq!(state.tracker.in_flight(), 0);
}

/// Tests that shutdown waits for an ingest that is making progress
#[tokio::test]
async fn test_drain_waits_for_running_ingest() {
    let (state, _source, store) = setup_state();

    let (status, _) = get_json(create_app(state.clone()), "/notify/argo/modgp-abcde").await;
    assert_eq!(status, StatusCode::ACCEPTED);

    assert!(state.tracker.drain(Duration::from_secs(10)).await);
    assert_eq!(store.of_type("Dataset").len(), 1);
    assert!(store.deleted().is_empty());
}

#[tokio::test]
async fn test_health_handler_healthy() {
    let (state, _source, _store) = setup_state();
    let (status, body) = get_json(create_app(state), "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({ "cordra_connection": "true", "argo_connection": "true", "ingests_in_flight": 0 })
    );
}

#[tokio::test]
async fn test_health_handler_reports_failures() {
    let (state, source, store) = setup_state();
    source.set_unhealthy("argo down");
    store.set_schema_count(0);

    let (status, body) = get_json(create_app(state), "/health").await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["cordra_connection"], "No schemas found");
    assert!(body["argo_connection"].as_str().unwrap().contains("argo down"));
}

#[tokio::test]
async fn test_unknown_route() {
    let (state, _source, _store) = setup_state();
    let response = create_app(state)
        .oneshot(Request::builder().uri("/notify/argo").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
