use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use tokio::task::JoinHandle;
use tracing::{error, info, info_span, Instrument};
use uuid::Uuid;

use crate::dto::{ArtifactDto, NotificationResponse};
use crate::errors::{ApiError, ArgoError};
use crate::ingest::ingest_workflow_until;
use crate::jobs::IngestGuard;
use crate::models::{ArtifactRef, Workflow};
use crate::AppState;

/// Handler for workflow completion notifications
///
/// This function handles GET requests to `/notify/{namespace}/{name}`.
/// The workflow is checked synchronously; the ingest itself runs in the
/// background and the caller gets `202 Accepted` right away.
///
/// ### Errors
///
/// * `404` - Argo does not know the workflow
/// * `400` - The workflow did not succeed or has no archivable artifacts
/// * `409` - The workflow is already being ingested
/// * `502` - Argo could not be queried
pub async fn notify_handler(
    State(state): State<AppState>,
    Path((namespace, name)): Path<(String, String)>,
) -> Result<(StatusCode, Json<NotificationResponse>), ApiError> {
    // Sanity check, is this a finished workflow with something to archive
    let workflow = state
        .source
        .get_workflow(&namespace, &name)
        .await
        .map_err(|e| match e {
            ArgoError::NotFound { .. } => ApiError::WorkflowNotFound(format!("{}/{}", namespace, name)),
            other => ApiError::Upstream(other),
        })?;

    if !workflow.is_succeeded() {
        return Err(ApiError::WorkflowNotSucceeded);
    }

    let artifacts = workflow.artifact_list();
    if artifacts.is_empty() {
        return Err(ApiError::NoArtifacts);
    }

    let guard = state
        .tracker
        .try_start(&namespace, &name)
        .ok_or_else(|| ApiError::AlreadyRunning(format!("{}/{}", namespace, name)))?;

    let job_id = Uuid::new_v4();
    let response = NotificationResponse {
        status: "accepted".to_string(),
        workflow_status: workflow.phase().to_string(),
        workflow_name: workflow.name().to_string(),
        workflow_namespace: workflow.namespace().to_string(),
        artifacts: artifacts.iter().map(ArtifactDto::from).collect(),
        job_id,
    };

    spawn_ingest(state, workflow, artifacts, guard, job_id);

    Ok((StatusCode::ACCEPTED, Json(response)))
}

/// Runs the ingest on the runtime, releasing `guard` once it finishes
///
/// The task is tracked by `state.tracker`, so shutdown drains it and
/// cancellation rolls it back.
pub fn spawn_ingest(
    state: AppState,
    workflow: Workflow,
    artifacts: Vec<ArtifactRef>,
    guard: IngestGuard,
    job_id: Uuid,
) -> JoinHandle<()> {
    let span = info_span!(
        "ingest",
        %job_id,
        namespace = %workflow.namespace(),
        workflow = %workflow.name()
    );

    let cancel = state.tracker.cancellation();
    let tracker = state.tracker.clone();
    tracker.spawn(
        async move {
            let _guard = guard;
            info!("Ingesting {}/{}", workflow.namespace(), workflow.name());
            info!("Found {} artifacts to process", artifacts.len());

            match ingest_workflow_until(
                state.store.as_ref(),
                state.source.as_ref(),
                &workflow,
                &artifacts,
                &state.options,
                &cancel,
            )
            .await
            {
                Ok(dataset_id) => info!(
                    "Successfully ingested {}/{} as {}",
                    workflow.namespace(),
                    workflow.name(),
                    dataset_id
                ),
                Err(e) => error!("Ingest of {}/{} failed: {}", workflow.namespace(), workflow.name(), e),
            }
        }
        .instrument(span),
    )
}
