use serde::{Deserialize, Serialize};

/// An output artifact of a workflow node that is worth archiving
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRef {
    /// Id of the node that produced the artifact
    pub node_id: String,
    /// Artifact name as declared in the template
    pub name: String,
    /// Path of the artifact inside the producing container
    pub path: String,
}

impl ArtifactRef {
    pub fn new(node_id: impl Into<String>, name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            name: name.into(),
            path: path.into(),
        }
    }

    /// Path under which the artifact is archived, `<node id>/<path>`
    pub fn relative_path(&self) -> String {
        let path = self.path.trim_start_matches('/');
        if path.is_empty() {
            self.node_id.clone()
        } else {
            format!("{}/{}", self.node_id, path)
        }
    }

    /// URL of the artifact on the Argo server
    ///
    /// Built by hand because the generated API uses `workflow` as the
    /// discriminator where the server expects `workflows`.
    pub fn download_url(&self, base_url: &str, namespace: &str, workflow_name: &str) -> String {
        format!(
            "{}/artifact-files/{}/workflows/{}/{}/outputs/{}",
            base_url.trim_end_matches('/'),
            namespace,
            workflow_name,
            self.node_id,
            self.name
        )
    }
}

/// A single downloadable file, found by crawling an artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactFile {
    pub url: String,
    pub relative_path: String,
}

impl ArtifactFile {
    /// Last path segment, used as the file object's name
    pub fn file_name(&self) -> &str {
        self.relative_path
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or(&self.relative_path)
    }
}
