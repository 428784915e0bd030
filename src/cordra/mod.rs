/// Cordra digital object repository access
///
/// `ObjectStore` is the seam the ingest pipeline writes through;
/// `CordraClient` implements it against Cordra's REST API.

mod client;

pub use client::CordraClient;

use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::CordraError;

/// A binary attachment uploaded alongside an object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payload {
    /// Payload name, also sent as the file name
    pub name: String,
    /// File the payload is streamed from
    pub path: PathBuf,
}

impl Payload {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
        }
    }
}

/// Response of `GET /search`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchResults {
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub results: Vec<Value>,
}

/// Returns the `@id` of an object's content
pub fn object_id(content: &Value) -> Option<&str> {
    content.get("@id").and_then(Value::as_str)
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Creates an object of `obj_type` and returns its stored content
    async fn create(&self, obj_type: &str, content: &Value, payload: Option<Payload>) -> Result<Value, CordraError>;

    async fn read(&self, id: &str) -> Result<Value, CordraError>;

    async fn update(&self, id: &str, content: &Value) -> Result<Value, CordraError>;

    async fn delete(&self, id: &str) -> Result<(), CordraError>;

    async fn search(&self, query: &str) -> Result<SearchResults, CordraError>;

    /// Browser URL of an object, used in log lines
    fn object_url(&self, id: &str) -> String;

    /// Succeeds when the repository answers and has schemas installed
    async fn check_health(&self) -> Result<(), CordraError> {
        let schemas = self.search("type:Schema").await?;
        if schemas.size == 0 {
            return Err(CordraError::NoSchemas);
        }
        Ok(())
    }
}
