use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::ArtifactRef;

/// An artifact as reported back to the notifier
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ArtifactDto {
    pub node_id: String,
    pub path: String,
}

impl From<&ArtifactRef> for ArtifactDto {
    fn from(artifact: &ArtifactRef) -> Self {
        Self {
            node_id: artifact.node_id.clone(),
            path: artifact.path.clone(),
        }
    }
}

/// Response body of an accepted notification
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct NotificationResponse {
    /// Always `accepted`; rejections use the error body instead
    pub status: String,
    /// Phase of the workflow at notification time
    pub workflow_status: String,
    pub workflow_name: String,
    pub workflow_namespace: String,
    pub artifacts: Vec<ArtifactDto>,
    /// Id of the background ingest, also attached to its log lines
    pub job_id: Uuid,
}

/// Response body of `GET /health`
///
/// Each connection field is `"true"` when healthy, otherwise the error message.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct HealthResponse {
    pub cordra_connection: String,
    pub argo_connection: String,
    pub ingests_in_flight: usize,
}

impl HealthResponse {
    pub fn is_healthy(&self) -> bool {
        self.cordra_connection == "true" && self.argo_connection == "true"
    }
}

/// Renders a health check result the way `HealthResponse` reports it
pub fn connection_state<E: std::fmt::Display>(result: &Result<(), E>) -> String {
    match result {
        Ok(()) => "true".to_string(),
        Err(e) => e.to_string(),
    }
}
