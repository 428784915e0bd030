/// Argo Connector: archives Argo Workflows runs in Cordra
///
/// When a workflow finishes, Argo notifies the connector. The connector
/// collects the run's output artifacts and publishes them, together with
/// the workflow definition, its parameters and its submitters, as a linked
/// RO-Crate style dataset in a Cordra repository.
///
/// ### Modules
///
/// - `argo`: Argo server client and artifact directory crawling
/// - `cordra`: Cordra REST client
/// - `ingest`: The dataset ingest pipeline with rollback
/// - `models`: Typed views of workflow documents and artifacts
/// - `jobs`: In-flight ingest tracking
/// - `config`: Layered configuration
///
/// ### Web API
///
/// The library exposes an HTTP API using Axum with the following endpoints:
///
/// - `GET /notify/{namespace}/{name}`: Validate a workflow and ingest it in the background
/// - `GET /health`: Check the Argo and Cordra connections

/// Argo Workflows access
pub mod argo;

/// Configuration module
pub mod config;

/// Cordra access
pub mod cordra;

/// Data transfer objects for the HTTP API
pub mod dto;

/// Error types
pub mod errors;

/// Web API handlers
pub mod handlers;

/// Dataset ingest pipeline
pub mod ingest;

/// In-flight ingest tracking
pub mod jobs;

/// Logging setup
pub mod logging;

/// Content type detection
pub mod mime;

/// Data models module
pub mod models;

#[cfg(any(test, feature = "test"))]
pub mod test_utils;

use std::sync::Arc;

use axum::{http::Method, routing::get, Router};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use argo::WorkflowSource;
use cordra::ObjectStore;
use handlers::*;
use ingest::IngestOptions;
use jobs::IngestTracker;

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub source: Arc<dyn WorkflowSource>,
    pub store: Arc<dyn ObjectStore>,
    pub options: IngestOptions,
    pub tracker: IngestTracker,
    /// Namespace checked by the health check
    pub argo_namespace: String,
}

impl AppState {
    pub fn new(source: Arc<dyn WorkflowSource>, store: Arc<dyn ObjectStore>) -> Self {
        Self {
            source,
            store,
            options: IngestOptions::default(),
            tracker: IngestTracker::new(),
            argo_namespace: "argo".to_string(),
        }
    }

    pub fn with_options(mut self, options: IngestOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_argo_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.argo_namespace = namespace.into();
        self
    }
}

/// Creates the application router
///
/// ### Arguments
///
/// * `state` - Clients, ingest options and the in-flight tracker
///
/// ### Returns
///
/// An Axum Router configured with all routes and the shared state
pub fn create_app(state: AppState) -> Router {
    Router::new()
        // Route for workflow completion notifications
        .route("/notify/{namespace}/{name}", get(notify_handler))
        // Route for the health check
        .route("/health", get(health_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::new().allow_methods([Method::GET]).allow_origin(Any))
        .with_state(state)
}

#[cfg(test)]
mod tests;
