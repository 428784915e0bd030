use argo_connector::dto::ArtifactDto;

use crate::output::{self, OutputConfig};
use crate::{Clients, WorkflowArgs};

pub async fn execute(clients: &Clients, args: &WorkflowArgs, config: &OutputConfig) -> anyhow::Result<()> {
    let workflow = super::fetch_succeeded(&clients.argo, args).await?;
    let artifacts: Vec<ArtifactDto> = workflow.artifact_list().iter().map(ArtifactDto::from).collect();
    output::print_artifacts(&artifacts, config);
    Ok(())
}
