use argo_connector::{
    argo::WorkflowSource,
    cordra::ObjectStore,
    dto::{connection_state, HealthResponse},
};

use crate::output::{self, OutputConfig};
use crate::Clients;

/// Checks both services; returns whether both are healthy
pub async fn execute(clients: &Clients, config: &OutputConfig) -> anyhow::Result<bool> {
    let (argo, cordra) = tokio::join!(
        clients.argo.check_health(&clients.config.argo_namespace),
        clients.cordra.check_health()
    );
    let report = HealthResponse {
        cordra_connection: connection_state(&cordra),
        argo_connection: connection_state(&argo),
        ingests_in_flight: 0,
    };
    output::print_health(&report, config);
    Ok(report.is_healthy())
}
