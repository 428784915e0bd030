pub mod artifacts;
pub mod export_workflow;
pub mod health;
pub mod ingest;

use anyhow::{bail, Context};
use argo_connector::{argo::WorkflowSource, models::Workflow};

use crate::WorkflowArgs;

/// Fetches a workflow, failing unless it succeeded
pub async fn fetch_succeeded(source: &dyn WorkflowSource, args: &WorkflowArgs) -> anyhow::Result<Workflow> {
    let workflow = source
        .get_workflow(&args.namespace, &args.name)
        .await
        .with_context(|| format!("Failed to fetch workflow {}/{}", args.namespace, args.name))?;
    if !workflow.is_succeeded() {
        bail!(
            "Workflow {}/{} did not succeed (phase: {})",
            args.namespace,
            args.name,
            workflow.phase()
        );
    }
    Ok(workflow)
}
