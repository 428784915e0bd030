/// In-memory fakes of Argo and Cordra plus sample workflow documents
///
/// Compiled for unit tests and, behind the `test` feature, for the
/// integration tests in `tests/`.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

use crate::argo::WorkflowSource;
use crate::cordra::{ObjectStore, Payload, SearchResults};
use crate::errors::{ArgoError, CordraError};
use crate::models::{ArtifactFile, ArtifactRef, Workflow};

/// Raw Argo JSON for a finished workflow named `name` in namespace `argo`
///
/// Node `{name}-1` has five artifacts of which only `results` and
/// `main-logs` survive filtering. Node `{name}-2` has no outputs.
pub fn sample_workflow_json(name: &str) -> Value {
    let node_1 = format!("{}-1", name);
    let node_2 = format!("{}-2", name);
    json!({
        "metadata": {
            "name": name,
            "namespace": "argo",
            "annotations": {
                "workflows.argoproj.io/title": "ModGP run",
                "workflows.argoproj.io/description": "Species distribution modelling",
                "argo-connector/submitterId1": "0000-0001-9447-460X",
                "argo-connector/submitterName1": "Daniel Bauer",
                "argo-connector/submitterId2": "0000-0002-4984-7646"
            }
        },
        "spec": {
            "workflowTemplateRef": { "name": "modgp" },
            "arguments": {
                "parameters": [ { "name": "species", "value": "Lathyrus" } ]
            }
        },
        "status": {
            "phase": "Succeeded",
            "startedAt": "2024-05-02T10:00:00Z",
            "finishedAt": "2024-05-02T11:30:00Z",
            "storedWorkflowTemplateSpec": {
                "entrypoint": "main",
                "templates": [ { "name": "main", "container": { "image": "modgp:latest" } } ],
                "arguments": {
                    "parameters": [
                        { "name": "species", "value": "Lathyrus sativus", "description": "Species to model" },
                        { "name": "resolution" }
                    ]
                }
            },
            "nodes": {
                (node_1): {
                    "finishedAt": "2024-05-02T11:20:00Z",
                    "outputs": {
                        "artifacts": [
                            { "name": "results", "path": "/outputs", "s3": { "key": format!("{}/{}-1/results.tgz", name, name) } },
                            { "name": "main-logs", "s3": { "key": format!("{}/{}-1/main.log", name, name) } },
                            { "name": "cache", "path": "/cache", "s3": { "key": "cache/abcdef.tgz" } },
                            { "name": "intermediate", "path": "/tmp/x", "s3": { "key": format!("{}/x.tgz", name) }, "artifactGC": { "strategy": "OnWorkflowDeletion" } },
                            { "name": "old", "path": "/tmp/y", "s3": { "key": format!("{}/y.tgz", name) }, "deleted": true }
                        ]
                    }
                },
                (node_2): {
                    "finishedAt": "2024-05-02T11:25:00Z"
                }
            }
        }
    })
}

pub fn sample_workflow(name: &str) -> Workflow {
    serde_json::from_value(sample_workflow_json(name)).expect("sample workflow parses")
}

/// Argo fake serving workflows and artifact files from memory
#[derive(Default)]
pub struct FakeSource {
    workflows: Mutex<HashMap<(String, String), Workflow>>,
    files: Mutex<HashMap<String, Vec<(ArtifactFile, Vec<u8>)>>>,
    failing_downloads: Mutex<Vec<String>>,
    unhealthy: Mutex<Option<String>>,
}

impl FakeSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_workflow(&self, workflow: Workflow) {
        let key = (workflow.namespace().to_string(), workflow.name().to_string());
        self.workflows.lock().unwrap().insert(key, workflow);
    }

    /// Registers a file under the artifact named `artifact_name` of `node_id`
    pub fn add_file(&self, node_id: &str, artifact_name: &str, relative_path: &str, content: &[u8]) {
        let file = ArtifactFile {
            url: format!("fake://{}/{}", node_id, relative_path),
            relative_path: relative_path.to_string(),
        };
        self.files
            .lock()
            .unwrap()
            .entry(format!("{}/{}", node_id, artifact_name))
            .or_default()
            .push((file, content.to_vec()));
    }

    /// Makes downloads of `relative_path` fail
    pub fn fail_download(&self, relative_path: &str) {
        self.failing_downloads.lock().unwrap().push(relative_path.to_string());
    }

    pub fn set_unhealthy(&self, message: &str) {
        *self.unhealthy.lock().unwrap() = Some(message.to_string());
    }
}

#[async_trait]
impl WorkflowSource for FakeSource {
    async fn get_workflow(&self, namespace: &str, name: &str) -> Result<Workflow, ArgoError> {
        self.workflows
            .lock()
            .unwrap()
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
            .ok_or_else(|| ArgoError::NotFound {
                namespace: namespace.to_string(),
                name: name.to_string(),
            })
    }

    async fn check_health(&self, _namespace: &str) -> Result<(), ArgoError> {
        match self.unhealthy.lock().unwrap().clone() {
            Some(message) => Err(ArgoError::Status {
                status: reqwest::StatusCode::SERVICE_UNAVAILABLE,
                url: message,
            }),
            None => Ok(()),
        }
    }

    async fn resolve_files(
        &self,
        _namespace: &str,
        _workflow_name: &str,
        artifact: &ArtifactRef,
    ) -> Result<Vec<ArtifactFile>, ArgoError> {
        Ok(self
            .files
            .lock()
            .unwrap()
            .get(&format!("{}/{}", artifact.node_id, artifact.name))
            .map(|files| files.iter().map(|(file, _)| file.clone()).collect())
            .unwrap_or_default())
    }

    async fn download(&self, file: &ArtifactFile, dest: &mut File) -> Result<u64, ArgoError> {
        if self.failing_downloads.lock().unwrap().contains(&file.relative_path) {
            return Err(ArgoError::Status {
                status: reqwest::StatusCode::INTERNAL_SERVER_ERROR,
                url: file.url.clone(),
            });
        }
        let content = self
            .files
            .lock()
            .unwrap()
            .values()
            .flatten()
            .find(|(f, _)| f == file)
            .map(|(_, content)| content.clone())
            .unwrap_or_default();
        dest.write_all(&content).await?;
        dest.flush().await?;
        Ok(content.len() as u64)
    }
}

/// An object held by `FakeStore`
#[derive(Debug, Clone)]
pub struct StoredObject {
    pub obj_type: String,
    pub content: Value,
    /// Payload name and bytes read at creation time
    pub payload: Option<(String, Vec<u8>)>,
}

/// Cordra fake keeping objects in memory
#[derive(Default)]
pub struct FakeStore {
    objects: Mutex<BTreeMap<String, StoredObject>>,
    creation_order: Mutex<Vec<String>>,
    deleted: Mutex<Vec<String>>,
    next_id: Mutex<u64>,
    fail_on_create: Mutex<Option<String>>,
    stall_on_create: Mutex<Option<String>>,
    schemas: Mutex<u64>,
}

impl FakeStore {
    pub fn new() -> Self {
        let store = Self::default();
        *store.schemas.lock().unwrap() = 3;
        store
    }

    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Makes every `create` of `obj_type` fail
    pub fn fail_on_create(&self, obj_type: &str) {
        *self.fail_on_create.lock().unwrap() = Some(obj_type.to_string());
    }

    /// Makes every `create` of `obj_type` hang until the caller gives up
    pub fn stall_on_create(&self, obj_type: &str) {
        *self.stall_on_create.lock().unwrap() = Some(obj_type.to_string());
    }

    pub fn set_schema_count(&self, count: u64) {
        *self.schemas.lock().unwrap() = count;
    }

    pub fn get(&self, id: &str) -> Option<StoredObject> {
        self.objects.lock().unwrap().get(id).cloned()
    }

    /// Live objects of `obj_type`, in creation order
    pub fn of_type(&self, obj_type: &str) -> Vec<(String, StoredObject)> {
        let objects = self.objects.lock().unwrap();
        self.creation_order
            .lock()
            .unwrap()
            .iter()
            .filter_map(|id| objects.get(id).map(|o| (id.clone(), o.clone())))
            .filter(|(_, o)| o.obj_type == obj_type)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.objects.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }

    pub fn created_ids(&self) -> Vec<String> {
        self.creation_order.lock().unwrap().clone()
    }
}

fn not_found(id: &str) -> CordraError {
    CordraError::Status {
        status: reqwest::StatusCode::NOT_FOUND,
        message: format!("Missing object {}", id),
    }
}

#[async_trait]
impl ObjectStore for FakeStore {
    async fn create(&self, obj_type: &str, content: &Value, payload: Option<Payload>) -> Result<Value, CordraError> {
        if self.fail_on_create.lock().unwrap().as_deref() == Some(obj_type) {
            return Err(CordraError::Status {
                status: reqwest::StatusCode::BAD_REQUEST,
                message: format!("{} rejected", obj_type),
            });
        }
        let stalled = self.stall_on_create.lock().unwrap().as_deref() == Some(obj_type);
        if stalled {
            std::future::pending::<()>().await;
        }

        let payload = match payload {
            Some(payload) => {
                let bytes = tokio::fs::read(&payload.path)
                    .await
                    .map_err(|e| CordraError::Payload(payload.name.clone(), e))?;
                Some((payload.name, bytes))
            }
            None => None,
        };

        let id = {
            let mut next = self.next_id.lock().unwrap();
            *next += 1;
            format!("test/{}", *next)
        };
        let mut stored = content.clone();
        if let Some(map) = stored.as_object_mut() {
            map.insert("@id".to_string(), Value::from(id.clone()));
        }

        self.objects.lock().unwrap().insert(
            id.clone(),
            StoredObject {
                obj_type: obj_type.to_string(),
                content: stored.clone(),
                payload,
            },
        );
        self.creation_order.lock().unwrap().push(id);
        Ok(stored)
    }

    async fn read(&self, id: &str) -> Result<Value, CordraError> {
        self.get(id).map(|o| o.content).ok_or_else(|| not_found(id))
    }

    async fn update(&self, id: &str, content: &Value) -> Result<Value, CordraError> {
        let mut objects = self.objects.lock().unwrap();
        let object = objects.get_mut(id).ok_or_else(|| not_found(id))?;
        object.content = content.clone();
        Ok(content.clone())
    }

    async fn delete(&self, id: &str) -> Result<(), CordraError> {
        self.objects.lock().unwrap().remove(id).ok_or_else(|| not_found(id))?;
        self.deleted.lock().unwrap().push(id.to_string());
        Ok(())
    }

    async fn search(&self, query: &str) -> Result<SearchResults, CordraError> {
        if query == "type:Schema" {
            return Ok(SearchResults {
                size: *self.schemas.lock().unwrap(),
                results: Vec::new(),
            });
        }
        let obj_type = query.strip_prefix("type:").unwrap_or(query);
        let results: Vec<Value> = self.of_type(obj_type).into_iter().map(|(_, o)| o.content).collect();
        Ok(SearchResults {
            size: results.len() as u64,
            results,
        })
    }

    fn object_url(&self, id: &str) -> String {
        format!("fake://cordra/objects/{}", id)
    }
}
