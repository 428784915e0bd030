//! Common test utilities for the connector integration tests
//!
//! Shared helpers for building an application over the in-memory fakes, or
//! over a mock Argo server, and for driving it with plain requests.

#![allow(dead_code)]

use argo_connector::{
    argo::ArgoClient,
    create_app,
    jobs::IngestTracker,
    test_utils::{sample_workflow, sample_workflow_json, FakeSource, FakeStore},
    AppState,
};
use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use mockito::ServerGuard;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tower::Service;

/// Name of the workflow every fixture knows about
pub const WORKFLOW: &str = "modgp-abcde";

/// Creates a test application over the in-memory fakes
///
/// The fake Argo server holds `argo/modgp-abcde` with one file in each of
/// its two archivable artifacts; the fake Cordra has schemas installed.
///
/// ### Returns
///
/// The application state, and the fakes for inspection
pub fn create_test_state() -> (AppState, Arc<FakeSource>, Arc<FakeStore>) {
    let source = Arc::new(FakeSource::new());
    source.add_workflow(sample_workflow(WORKFLOW));
    source.add_file(
        &format!("{}-1", WORKFLOW),
        "results",
        &format!("{}-1/outputs/model.csv", WORKFLOW),
        b"species,score\nx,1\n",
    );
    source.add_file(
        &format!("{}-1", WORKFLOW),
        "main-logs",
        &format!("{}-1/main.log", WORKFLOW),
        b"done\n",
    );
    let store = FakeStore::shared();
    let state = AppState::new(source.clone(), store.clone());
    (state, source, store)
}

fn artifact_root(name: &str) -> String {
    format!("/artifact-files/argo/workflows/{name}/{name}-1/outputs")
}

/// Serves `name` from a mock Argo server, with the artifacts of the sample workflow
///
/// `results` is a directory holding `model.csv`, `main-logs` is a single file.
pub async fn mock_argo(server: &mut ServerGuard, name: &str) {
    mock_workflow(server, name).await;
    mock_results(server, name).await;
    server
        .mock("GET", format!("{}/main-logs", artifact_root(name)).as_str())
        .with_status(200)
        .with_header("content-disposition", "attachment; filename=\"main.log\"")
        .with_body("done\n")
        .create_async()
        .await;
}

/// Serves the sample workflow document for `name`
pub async fn mock_workflow(server: &mut ServerGuard, name: &str) {
    server
        .mock("GET", format!("/api/v1/workflows/argo/{}", name).as_str())
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(sample_workflow_json(name).to_string())
        .create_async()
        .await;
}

/// Serves the `results` directory artifact of `name`
pub async fn mock_results(server: &mut ServerGuard, name: &str) {
    let root = artifact_root(name);
    server
        .mock("GET", format!("{}/results", root).as_str())
        .with_status(200)
        .with_body("<html><body><ul><li><a href=\"..\">..</a></li><li><a href=\"model.csv\">model.csv</a></li></ul></body></html>")
        .create_async()
        .await;
    server
        .mock("GET", format!("{}/results/model.csv", root).as_str())
        .with_status(200)
        .with_header("content-disposition", "attachment; filename=\"model.csv\"")
        .with_body("species,score\nx,1\n")
        .create_async()
        .await;
}

/// Builds an Argo client for a mock server
pub fn argo_client(server: &ServerGuard) -> ArgoClient {
    ArgoClient::new(server.url(), "test-token", true).unwrap()
}

/// Sends a GET request and returns the status and parsed JSON body
pub async fn get_json(app: &mut Router, uri: &str) -> (StatusCode, Value) {
    let request = Request::builder().uri(uri).method("GET").body(Body::empty()).unwrap();
    let response = app.call(request).await.unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&body).unwrap())
}

/// Creates the application router for `state`
pub fn create_test_app(state: AppState) -> Router {
    create_app(state)
}

/// Waits until the background ingests have finished
pub async fn wait_for_idle(tracker: &IngestTracker) {
    for _ in 0..300 {
        if tracker.in_flight() == 0 {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("ingest did not finish in time");
}
