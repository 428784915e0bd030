use anyhow::bail;
use argo_connector::{
    cordra::ObjectStore,
    ingest::{ingest_workflow, IngestOptions},
};

use crate::output::{self, OutputConfig};
use crate::{Clients, WorkflowArgs};

/// Runs the full ingest in the foreground
pub async fn execute(clients: &Clients, args: &WorkflowArgs, config: &OutputConfig) -> anyhow::Result<()> {
    let workflow = super::fetch_succeeded(&clients.argo, args).await?;
    let artifacts = workflow.artifact_list();
    if artifacts.is_empty() {
        bail!("No artifacts found in {}/{}", args.namespace, args.name);
    }

    let options = IngestOptions {
        file_max_size: clients.config.file_max_size,
    };
    let dataset_id = ingest_workflow(&clients.cordra, &clients.argo, &workflow, &artifacts, &options).await?;

    output::print_dataset(&dataset_id, &clients.cordra.object_url(&dataset_id), config);
    Ok(())
}
