/// Data models module
///
/// Typed views of the Argo workflow document and the artifacts selected from it.

mod workflow;
pub use workflow::{
    format_timestamp, parse_timestamp, ArtifactGc, ArtifactSpec, NodeOutputs, S3Location,
    Submitter, Workflow, WorkflowMetadata, WorkflowNode, WorkflowParameter, WorkflowStatus,
    TIMESTAMP_FORMAT,
};

mod artifact;
pub use artifact::{ArtifactFile, ArtifactRef};
