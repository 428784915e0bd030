use std::path::Path;

use anyhow::Context;
use argo_connector::argo::WorkflowSource;

use crate::output::{self, OutputConfig};
use crate::{Clients, WorkflowArgs};

/// Writes the standalone workflow definition, as it is archived in Cordra
pub async fn execute(
    clients: &Clients,
    args: &WorkflowArgs,
    destination: Option<&Path>,
    config: &OutputConfig,
) -> anyhow::Result<()> {
    let workflow = clients
        .argo
        .get_workflow(&args.namespace, &args.name)
        .await
        .with_context(|| format!("Failed to fetch workflow {}/{}", args.namespace, args.name))?;
    let yaml = serde_yaml::to_string(&workflow.reconstruct())?;

    match destination {
        Some(path) => {
            tokio::fs::write(path, yaml.as_bytes())
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?;
            output::print_success(&format!("Wrote workflow definition to {}", path.display()), config);
        }
        None => print!("{}", yaml),
    }
    Ok(())
}
