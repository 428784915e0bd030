/// Dataset ingest
///
/// Turns a finished workflow into a linked set of Cordra objects:
/// submitters (`Person`), artifact files (`FileObject`), parameters
/// (`FormalParameter` / `PropertyValue`), the workflow definition
/// (`Workflow`), the run (`CreateAction`) and the `Dataset` tying them
/// together. Either the whole dataset is created or nothing is left behind.

pub mod profile;

use serde_json::{json, Map, Value};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::argo::WorkflowSource;
use crate::config::DEFAULT_FILE_MAX_SIZE;
use crate::cordra::{object_id, ObjectStore, Payload};
use crate::errors::{CordraError, IngestError};
use crate::mime::detect_mime;
use crate::models::{format_timestamp, parse_timestamp, ArtifactFile, ArtifactRef, Workflow};

pub use profile::json_merge_patch;

const WORKFLOW_FILE_NAME: &str = "workflow.yaml";

/// Tunables for a single ingest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestOptions {
    /// Artifact files larger than this many bytes are skipped
    pub file_max_size: u64,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            file_max_size: DEFAULT_FILE_MAX_SIZE,
        }
    }
}

/// Cordra types created by an ingest
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    Person,
    FileObject,
    FormalParameter,
    PropertyValue,
    Workflow,
    CreateAction,
    Dataset,
}

impl ObjectKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectKind::Person => "Person",
            ObjectKind::FileObject => "FileObject",
            ObjectKind::FormalParameter => "FormalParameter",
            ObjectKind::PropertyValue => "PropertyValue",
            ObjectKind::Workflow => "Workflow",
            ObjectKind::CreateAction => "CreateAction",
            ObjectKind::Dataset => "Dataset",
        }
    }
}

/// Objects created so far, in creation order
#[derive(Debug, Default)]
pub struct CreatedObjects {
    entries: Vec<(String, ObjectKind)>,
}

impl CreatedObjects {
    pub fn push(&mut self, id: String, kind: ObjectKind) {
        self.entries.push((id, kind));
    }

    /// Ids of the given kind, in creation order
    pub fn ids_of(&self, kind: ObjectKind) -> Vec<String> {
        self.entries
            .iter()
            .filter(|(_, k)| *k == kind)
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// Ids of any of the given kinds, in creation order
    pub fn ids_of_any(&self, kinds: &[ObjectKind]) -> Vec<String> {
        self.entries
            .iter()
            .filter(|(_, k)| kinds.contains(k))
            .map(|(id, _)| id.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn newest_first(&self) -> impl Iterator<Item = &(String, ObjectKind)> {
        self.entries.iter().rev()
    }
}

/// Publishes `workflow` and its artifacts as a Cordra dataset
///
/// Returns the id of the created `Dataset`. On failure every object created
/// by this call is deleted again before the error is returned.
pub async fn ingest_workflow(
    store: &dyn ObjectStore,
    source: &dyn WorkflowSource,
    workflow: &Workflow,
    artifacts: &[ArtifactRef],
    options: &IngestOptions,
) -> Result<String, IngestError> {
    ingest_workflow_until(store, source, workflow, artifacts, options, &CancellationToken::new()).await
}

/// Like `ingest_workflow`, but gives up when `cancel` fires
///
/// A cancelled ingest stops at its next await point and is rolled back
/// like a failed one.
pub async fn ingest_workflow_until(
    store: &dyn ObjectStore,
    source: &dyn WorkflowSource,
    workflow: &Workflow,
    artifacts: &[ArtifactRef],
    options: &IngestOptions,
    cancel: &CancellationToken,
) -> Result<String, IngestError> {
    let mut created = CreatedObjects::default();
    let outcome = tokio::select! {
        result = build_dataset(store, source, workflow, artifacts, options, &mut created) => result,
        _ = cancel.cancelled() => Err(IngestError::Cancelled),
    };

    match outcome {
        Ok(dataset_id) => {
            info!(
                "Dataset ingested. Cordra ID: {} ({})",
                dataset_id,
                store.object_url(&dataset_id)
            );
            Ok(dataset_id)
        }
        Err(e) => {
            error!(
                "Failed to create Cordra dataset for {}/{}: {}. Cleaning up {} uploaded objects",
                workflow.namespace(),
                workflow.name(),
                e,
                created.len()
            );
            rollback(store, &created).await;
            Err(e)
        }
    }
}

/// Deletes created objects, newest first; failures are logged and skipped
pub async fn rollback(store: &dyn ObjectStore, created: &CreatedObjects) {
    for (id, kind) in created.newest_first() {
        if let Err(e) = store.delete(id).await {
            warn!("Failed to delete {} {} during cleanup: {}", kind.as_str(), id, e);
        }
    }
}

async fn create_object(
    store: &dyn ObjectStore,
    created: &mut CreatedObjects,
    kind: ObjectKind,
    content: &Value,
    payload: Option<Payload>,
) -> Result<String, IngestError> {
    let object = store.create(kind.as_str(), content, payload).await?;
    let id = object_id(&object)
        .ok_or_else(|| CordraError::MissingId(kind.as_str().to_string()))?
        .to_string();
    created.push(id.clone(), kind);
    Ok(id)
}

fn with_optional(mut content: Value, key: &str, value: Option<Value>) -> Value {
    if let (Some(value), Some(map)) = (value, content.as_object_mut()) {
        map.insert(key.to_string(), value);
    }
    content
}

async fn build_dataset(
    store: &dyn ObjectStore,
    source: &dyn WorkflowSource,
    workflow: &Workflow,
    artifacts: &[ArtifactRef],
    options: &IngestOptions,
    created: &mut CreatedObjects,
) -> Result<String, IngestError> {
    // Validated before anything is uploaded
    let started_at = workflow.started_at().ok_or(IngestError::MissingStartTime)?;
    let start_time = parse_timestamp(started_at).ok_or_else(|| IngestError::Timestamp(started_at.to_string()))?;
    let end_time = workflow.end_time();

    let mut agent = None;
    for submitter in workflow.submitters() {
        let content = with_optional(
            json!({ "identifier": submitter.identifier }),
            "name",
            submitter.name.clone().map(Value::from),
        );
        let id = create_object(store, created, ObjectKind::Person, &content, None).await?;
        if submitter.is_primary() {
            agent = Some(id);
        }
    }

    debug!("Creating file objects");
    for artifact in artifacts {
        let files = source
            .resolve_files(workflow.namespace(), workflow.name(), artifact)
            .await?;
        for file in &files {
            upload_file(store, source, file, options, created).await?;
        }
    }

    debug!("Create workflow and action parameters");
    for parameter in workflow.parameters() {
        let content = with_optional(
            json!({ "name": parameter.name }),
            "description",
            parameter.description.clone().map(Value::from),
        );
        create_object(store, created, ObjectKind::FormalParameter, &content, None).await?;

        if let Some(value) = parameter.value {
            let content = with_optional(content, "value", Some(value));
            create_object(store, created, ObjectKind::PropertyValue, &content, None).await?;
        }
    }

    debug!("Create workflow");
    let workflow_id = upload_workflow_definition(store, workflow, created).await?;

    debug!("Create CreateAction");
    let mut action = json!({
        "result": created.ids_of(ObjectKind::FileObject),
        "startTime": format_timestamp(&start_time),
        "instrument": workflow_id,
        "object": created.ids_of(ObjectKind::PropertyValue),
    });
    action = with_optional(action, "endTime", end_time.map(|t| Value::from(format_timestamp(&t))));
    action = with_optional(action, "agent", agent.map(Value::from));
    let action_id = create_object(store, created, ObjectKind::CreateAction, &action, None).await?;

    let properties = json!({
        "name": workflow.title(),
        "author": created.ids_of(ObjectKind::Person),
        "hasPart": created.ids_of_any(&[ObjectKind::FileObject, ObjectKind::Workflow]),
        "mentions": [action_id],
        "mainEntity": workflow_id,
    });
    let properties = with_optional(properties, "description", workflow.description().map(Value::from));
    let properties = profile::apply_profiles(workflow, properties);

    debug!("Create Dataset");
    let dataset_id = create_object(store, created, ObjectKind::Dataset, &properties, None).await?;

    debug!("Updating files backref to dataset/action");
    for file_id in created.ids_of(ObjectKind::FileObject) {
        let mut object = store.read(&file_id).await?;
        if let Some(map) = object.as_object_mut() {
            if map.get("partOf").is_none_or(Value::is_null) {
                map.insert("partOf".to_string(), json!([dataset_id]));
            }
            map.insert("resultOf".to_string(), Value::from(action_id.clone()));
        }
        store.update(&file_id, &object).await?;
    }

    Ok(dataset_id)
}

/// Stages one artifact file on disk and creates its `FileObject`
///
/// Files above the size limit are skipped with a warning.
async fn upload_file(
    store: &dyn ObjectStore,
    source: &dyn WorkflowSource,
    file: &ArtifactFile,
    options: &IngestOptions,
    created: &mut CreatedObjects,
) -> Result<(), IngestError> {
    let relative_path = file.relative_path.clone();
    let staging = |e: std::io::Error| IngestError::Staging(relative_path.clone(), e);

    debug!("Creating FileObject from {}", relative_path);
    let tmp_file = tempfile::Builder::new()
        .prefix(&format!("argo-artifact-tmp-{}-", file.file_name()))
        .tempfile()
        .map_err(staging)?;
    let mut dest = tokio::fs::File::from_std(tmp_file.as_file().try_clone().map_err(staging)?);

    debug!("Downloading content to temp file: {:?}", tmp_file.path());
    if let Err(e) = source.download(file, &mut dest).await {
        error!("Failed to download file content: {}", e);
        return Err(e.into());
    }
    let file_size = dest.metadata().await.map_err(staging)?.len();
    debug!("Download done ({:.2} MB)", megabytes(file_size));

    if file_size > options.file_max_size {
        warn!(
            "File {} is {:.2} MB, which is too large to upload. Skipping...",
            relative_path,
            megabytes(file_size)
        );
        return Ok(());
    }

    let encoding_format = detect_mime(tmp_file.path()).await;
    match &encoding_format {
        Some(format) => debug!("Inferred encoding format: {}", format),
        None => warn!("Failed to get encoding format for {}", relative_path),
    }

    let mut content = Map::new();
    content.insert("name".to_string(), Value::from(file.file_name()));
    content.insert("contentSize".to_string(), Value::from(file_size));
    if let Some(format) = encoding_format {
        content.insert("encodingFormat".to_string(), Value::from(format));
    }
    content.insert("contentUrl".to_string(), Value::from(relative_path.clone()));

    debug!("Sending file to cordra");
    let payload = Payload::new(relative_path.clone(), tmp_file.path());
    create_object(store, created, ObjectKind::FileObject, &Value::Object(content), Some(payload)).await?;
    debug!("File ingested");
    Ok(())
}

/// Uploads the reconstructed workflow as `workflow.yaml`
async fn upload_workflow_definition(
    store: &dyn ObjectStore,
    workflow: &Workflow,
    created: &mut CreatedObjects,
) -> Result<String, IngestError> {
    let yaml = serde_yaml::to_string(&workflow.reconstruct())?;
    let staging = |e: std::io::Error| IngestError::Staging(WORKFLOW_FILE_NAME.to_string(), e);

    let tmp_file = tempfile::Builder::new()
        .prefix("argo-workflow-tmp-")
        .tempfile()
        .map_err(staging)?;
    tokio::fs::write(tmp_file.path(), yaml.as_bytes())
        .await
        .map_err(staging)?;

    let content = json!({
        "name": WORKFLOW_FILE_NAME,
        "contentSize": yaml.len(),
        "encodingFormat": "text/yaml",
        "contentUrl": WORKFLOW_FILE_NAME,
        "description": "Argo workflow definition",
        "programmingLanguage": "https://argoproj.github.io/workflows",
        "input": created.ids_of(ObjectKind::FormalParameter),
    });
    let payload = Payload::new(WORKFLOW_FILE_NAME, tmp_file.path());
    let id = create_object(store, created, ObjectKind::Workflow, &content, Some(payload)).await?;
    debug!("Workflow ingested");
    Ok(id)
}

fn megabytes(bytes: u64) -> f64 {
    bytes as f64 / 1024.0 / 1024.0
}
