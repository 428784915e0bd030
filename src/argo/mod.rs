/// Argo Workflows access
///
/// `WorkflowSource` is the seam the HTTP handlers and the ingest pipeline
/// depend on; `ArgoClient` implements it against the Argo server's REST API.

mod client;
pub mod listing;

pub use client::ArgoClient;

use async_trait::async_trait;
use tokio::fs::File;

use crate::errors::ArgoError;
use crate::models::{ArtifactFile, ArtifactRef, Workflow};

#[async_trait]
pub trait WorkflowSource: Send + Sync {
    /// Fetches a single workflow
    async fn get_workflow(&self, namespace: &str, name: &str) -> Result<Workflow, ArgoError>;

    /// Lists at most one workflow to prove the server and token work
    async fn check_health(&self, namespace: &str) -> Result<(), ArgoError>;

    /// Expands an artifact into the files it contains, crawling directory listings
    async fn resolve_files(
        &self,
        namespace: &str,
        workflow_name: &str,
        artifact: &ArtifactRef,
    ) -> Result<Vec<ArtifactFile>, ArgoError>;

    /// Streams a file into `dest`, returning the number of bytes written
    async fn download(&self, file: &ArtifactFile, dest: &mut File) -> Result<u64, ArgoError>;
}
