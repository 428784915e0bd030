use axum::{extract::State, http::StatusCode, Json};
use tracing::warn;

use crate::dto::{connection_state, HealthResponse};
use crate::AppState;

/// Handler for the health check
///
/// This function handles GET requests to `/health`. Argo and Cordra are
/// checked concurrently; the status is `200` when both answer and `503`
/// otherwise, with the failure messages in the body.
pub async fn health_handler(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let (argo, cordra) = tokio::join!(
        state.source.check_health(&state.argo_namespace),
        state.store.check_health()
    );

    let response = HealthResponse {
        cordra_connection: connection_state(&cordra),
        argo_connection: connection_state(&argo),
        ingests_in_flight: state.tracker.in_flight(),
    };

    if response.is_healthy() {
        (StatusCode::OK, Json(response))
    } else {
        warn!(
            "Health check failed: argo={}, cordra={}",
            response.argo_connection, response.cordra_connection
        );
        (StatusCode::SERVICE_UNAVAILABLE, Json(response))
    }
}
