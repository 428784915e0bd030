use axum::{
    response::{IntoResponse, Response},
    http::StatusCode,
    Json
};
use thiserror::Error;

/// Errors raised while talking to the Argo Workflows server
#[derive(Error, Debug)]
pub enum ArgoError {
    #[error("Workflow {namespace}/{name} not found")]
    NotFound { namespace: String, name: String },
    #[error("Argo returned {status} for {url}")]
    Status { status: reqwest::StatusCode, url: String },
    #[error("Argo request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Unexpected workflow payload: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("Artifact directory nesting exceeds {0} levels at {1}")]
    TooDeep(usize, String),
    #[error("Invalid artifact URL {0}: {1}")]
    InvalidUrl(String, String),
    #[error("Failed to write artifact data: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised by the Cordra REST API
#[derive(Error, Debug)]
pub enum CordraError {
    #[error("Cordra returned {status}: {message}")]
    Status { status: reqwest::StatusCode, message: String },
    #[error("Cordra request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Cordra response for a {0} object carries no @id")]
    MissingId(String),
    #[error("Failed to open payload {0}: {1}")]
    Payload(String, std::io::Error),
    #[error("No schemas found")]
    NoSchemas,
}

/// Errors that abort a dataset ingest
#[derive(Error, Debug)]
pub enum IngestError {
    #[error(transparent)]
    Argo(#[from] ArgoError),
    #[error(transparent)]
    Cordra(#[from] CordraError),
    #[error("Failed to stage artifact {0}: {1}")]
    Staging(String, std::io::Error),
    #[error("Failed to serialise workflow definition: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("Invalid workflow timestamp {0:?}")]
    Timestamp(String),
    #[error("Workflow has no start time")]
    MissingStartTime,
    #[error("Ingest cancelled during shutdown")]
    Cancelled,
}

/// Errors returned to HTTP clients
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Workflow not found: {0}")]
    WorkflowNotFound(String),
    #[error("Workflow did not succeed")]
    WorkflowNotSucceeded,
    #[error("No artifacts found")]
    NoArtifacts,
    #[error("Ingest already running for {0}")]
    AlreadyRunning(String),
    #[error("Upstream error: {0}")]
    Upstream(#[from] ArgoError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::WorkflowNotFound(_) => StatusCode::NOT_FOUND,
            ApiError::WorkflowNotSucceeded => StatusCode::BAD_REQUEST,
            ApiError::NoArtifacts => StatusCode::BAD_REQUEST,
            ApiError::AlreadyRunning(_) => StatusCode::CONFLICT,
            ApiError::Upstream(_) => StatusCode::BAD_GATEWAY,
        };

        let body = Json(serde_json::json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}
