use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::ArtifactRef;

/// Timestamp format used by Argo and written to Cordra
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

const SUBMITTER_ID_PREFIX: &str = "argo-connector/submitterId";
const SUBMITTER_NAME_PREFIX: &str = "argo-connector/submitterName";
const TITLE_ANNOTATION: &str = "workflows.argoproj.io/title";
const DESCRIPTION_ANNOTATION: &str = "workflows.argoproj.io/description";
const ORCID_PREFIX: &str = "https://orcid.org/";

/// Parses an Argo timestamp such as `2024-05-02T10:11:12Z`
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(value, TIMESTAMP_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}

pub fn format_timestamp(value: &DateTime<Utc>) -> String {
    value.format(TIMESTAMP_FORMAT).to_string()
}

/// A workflow as returned by `GET /api/v1/workflows/{namespace}/{name}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workflow {
    pub metadata: WorkflowMetadata,
    #[serde(default)]
    pub spec: Value,
    #[serde(default)]
    pub status: WorkflowStatus,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkflowMetadata {
    pub name: String,
    #[serde(default)]
    pub namespace: String,
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowStatus {
    #[serde(default)]
    pub phase: String,
    pub started_at: Option<String>,
    pub finished_at: Option<String>,
    #[serde(default)]
    pub nodes: BTreeMap<String, WorkflowNode>,
    pub stored_workflow_template_spec: Option<Map<String, Value>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowNode {
    pub finished_at: Option<String>,
    pub outputs: Option<NodeOutputs>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeOutputs {
    pub artifacts: Option<Vec<ArtifactSpec>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArtifactSpec {
    pub name: String,
    pub path: Option<String>,
    pub s3: Option<S3Location>,
    #[serde(default)]
    pub deleted: bool,
    #[serde(rename = "artifactGC")]
    pub artifact_gc: Option<ArtifactGc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct S3Location {
    pub key: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArtifactGc {
    pub strategy: Option<String>,
}

impl ArtifactSpec {
    /// True when Argo removes the artifact once the run is over
    fn is_garbage_collected(&self) -> bool {
        match self.artifact_gc.as_ref().and_then(|gc| gc.strategy.as_deref()) {
            None | Some("") | Some("Never") => false,
            Some(_) => true,
        }
    }
}

/// Someone credited with a run through `argo-connector/submitter*` annotations
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submitter {
    /// Suffix of the annotation key, `"1"` marks the primary submitter
    pub index: String,
    /// ORCID URL
    pub identifier: String,
    pub name: Option<String>,
}

impl Submitter {
    pub fn is_primary(&self) -> bool {
        self.index == "1"
    }
}

/// An input parameter of the workflow
#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowParameter {
    pub name: String,
    pub description: Option<String>,
    pub value: Option<Value>,
}

impl Workflow {
    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    pub fn namespace(&self) -> &str {
        &self.metadata.namespace
    }

    pub fn phase(&self) -> &str {
        &self.status.phase
    }

    pub fn is_succeeded(&self) -> bool {
        self.status.phase == "Succeeded"
    }

    /// Returns the artifacts worth archiving, in node order
    ///
    /// Skips artifacts whose S3 key lies outside this workflow (cache entries),
    /// artifacts that are deleted, and artifacts scheduled for garbage
    /// collection, which only carry data between steps.
    pub fn artifact_list(&self) -> Vec<ArtifactRef> {
        let mut artifacts = Vec::new();
        for (node_id, node) in &self.status.nodes {
            let Some(specs) = node.outputs.as_ref().and_then(|o| o.artifacts.as_ref()) else {
                continue;
            };

            for spec in specs {
                let in_workflow = spec
                    .s3
                    .as_ref()
                    .and_then(|s3| s3.key.as_deref())
                    .is_some_and(|key| key.contains(self.name()));
                if !in_workflow || spec.deleted || spec.is_garbage_collected() {
                    continue;
                }

                let path = if spec.name == "main-logs" {
                    "main.log".to_string()
                } else {
                    spec.path.clone().unwrap_or_else(|| spec.name.clone())
                };
                artifacts.push(ArtifactRef::new(node_id.clone(), spec.name.clone(), path));
            }
        }
        artifacts
    }

    /// Rebuilds a submittable workflow document
    ///
    /// The stored template spec is inlined and the template reference dropped,
    /// so the exported definition stands on its own.
    pub fn reconstruct(&self) -> Value {
        let mut spec = match &self.spec {
            Value::Object(map) => map.clone(),
            _ => Map::new(),
        };
        if let Some(template_spec) = &self.status.stored_workflow_template_spec {
            for (key, value) in template_spec {
                spec.insert(key.clone(), value.clone());
            }
        }
        spec.remove("workflowTemplateRef");

        let mut metadata = Map::new();
        metadata.insert("name".to_string(), Value::from(self.metadata.name.clone()));
        metadata.insert("namespace".to_string(), Value::from(self.metadata.namespace.clone()));
        if !self.metadata.annotations.is_empty() {
            metadata.insert(
                "annotations".to_string(),
                Value::Object(
                    self.metadata
                        .annotations
                        .iter()
                        .map(|(k, v)| (k.clone(), Value::from(v.clone())))
                        .collect(),
                ),
            );
        }

        serde_json::json!({
            "kind": "Workflow",
            "metadata": metadata,
            "spec": spec,
        })
    }

    pub fn started_at(&self) -> Option<&str> {
        self.status.started_at.as_deref()
    }

    /// End of the run: the workflow's own finish time, else the latest node finish time
    ///
    /// Unparseable node timestamps are ignored.
    pub fn end_time(&self) -> Option<DateTime<Utc>> {
        if let Some(finished) = self.status.finished_at.as_deref().and_then(parse_timestamp) {
            return Some(finished);
        }
        self.status
            .nodes
            .values()
            .filter_map(|node| node.finished_at.as_deref().and_then(parse_timestamp))
            .max()
    }

    pub fn title(&self) -> &str {
        self.metadata
            .annotations
            .get(TITLE_ANNOTATION)
            .map(String::as_str)
            .unwrap_or(&self.metadata.name)
    }

    pub fn description(&self) -> Option<&str> {
        self.metadata.annotations.get(DESCRIPTION_ANNOTATION).map(String::as_str)
    }

    /// Submitters ordered by annotation key
    pub fn submitters(&self) -> Vec<Submitter> {
        let annotations = &self.metadata.annotations;
        annotations
            .iter()
            .filter_map(|(key, orcid)| {
                let index = key.strip_prefix(SUBMITTER_ID_PREFIX)?;
                Some(Submitter {
                    index: index.to_string(),
                    identifier: format!("{}{}", ORCID_PREFIX, orcid),
                    name: annotations.get(&format!("{}{}", SUBMITTER_NAME_PREFIX, index)).cloned(),
                })
            })
            .collect()
    }

    /// Parameters of the reconstructed workflow (`spec.arguments.parameters`)
    pub fn parameters(&self) -> Vec<WorkflowParameter> {
        let reconstructed = self.reconstruct();
        let Some(parameters) = reconstructed
            .pointer("/spec/arguments/parameters")
            .and_then(Value::as_array)
        else {
            return Vec::new();
        };

        parameters
            .iter()
            .filter_map(|parameter| {
                let name = parameter.get("name")?.as_str()?.to_string();
                Some(WorkflowParameter {
                    name,
                    description: parameter
                        .get("description")
                        .and_then(Value::as_str)
                        .map(str::to_string),
                    value: parameter.get("value").cloned(),
                })
            })
            .collect()
    }

    /// Value of the named parameter, if set
    pub fn parameter_value(&self, name: &str) -> Option<Value> {
        self.parameters()
            .into_iter()
            .find(|p| p.name == name)
            .and_then(|p| p.value)
    }
}
