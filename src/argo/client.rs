use std::collections::HashSet;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::{header::CONTENT_DISPOSITION, Client, Response, StatusCode};
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use super::listing::{parse_directory_listing, resolve_entry};
use super::WorkflowSource;
use crate::errors::ArgoError;
use crate::models::{ArtifactFile, ArtifactRef, Workflow};

/// Directory listings nested deeper than this are treated as a loop
pub const DEFAULT_MAX_DEPTH: usize = 32;

/// HTTP client for the Argo Workflows server
pub struct ArgoClient {
    /// The base URL of the server (e.g. "https://argo.example.org:2746")
    base_url: String,
    token: String,
    max_depth: usize,
    client: Client,
}

impl ArgoClient {
    /// Creates a new ArgoClient
    ///
    /// ### Arguments
    ///
    /// * `base_url` - The base URL of the Argo server
    /// * `token` - Bearer token sent with every request
    /// * `verify_cert` - Whether the server certificate is checked
    pub fn new(base_url: impl Into<String>, token: impl Into<String>, verify_cert: bool) -> Result<Self, ArgoError> {
        let client = Client::builder()
            .danger_accept_invalid_certs(!verify_cert)
            .build()?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
            max_depth: DEFAULT_MAX_DEPTH,
            client,
        })
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get(&self, url: &str) -> Result<Response, ArgoError> {
        let response = self
            .client
            .get(url)
            .bearer_auth(&self.token)
            .send()
            .await?;
        check_status(response)
    }
}

fn check_status(response: Response) -> Result<Response, ArgoError> {
    if response.status() == StatusCode::OK {
        return Ok(response);
    }
    Err(ArgoError::Status {
        status: response.status(),
        url: response.url().to_string(),
    })
}

#[async_trait]
impl WorkflowSource for ArgoClient {
    async fn get_workflow(&self, namespace: &str, name: &str) -> Result<Workflow, ArgoError> {
        let url = format!("{}/api/v1/workflows/{}/{}", self.base_url, namespace, name);
        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(ArgoError::NotFound {
                namespace: namespace.to_string(),
                name: name.to_string(),
            });
        }
        let body = check_status(response)?.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }

    async fn check_health(&self, namespace: &str) -> Result<(), ArgoError> {
        let url = format!("{}/api/v1/workflows/{}", self.base_url, namespace);
        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .query(&[("listOptions.limit", "1")])
            .send()
            .await?;
        check_status(response)?;
        Ok(())
    }

    async fn resolve_files(
        &self,
        namespace: &str,
        workflow_name: &str,
        artifact: &ArtifactRef,
    ) -> Result<Vec<ArtifactFile>, ArgoError> {
        let mut files = Vec::new();
        let mut visited = HashSet::new();
        let mut pending = vec![(
            artifact.download_url(&self.base_url, namespace, workflow_name),
            artifact.relative_path(),
            0usize,
        )];

        while let Some((url, path, depth)) = pending.pop() {
            if depth > self.max_depth {
                return Err(ArgoError::TooDeep(self.max_depth, url));
            }
            if !visited.insert(url.clone()) {
                debug!("Skipping already visited {}", url);
                continue;
            }

            // HEAD is unreliable on Argo for large files, so the GET is
            // opened and only its headers are inspected before deciding.
            let response = self.get(&url).await?;
            if response.headers().contains_key(CONTENT_DISPOSITION) {
                debug!("Found file {}", url);
                files.push(ArtifactFile { url, relative_path: path });
                continue;
            }

            info!("Downloading directory recursively: {}", url);
            let listing = response.text().await?;
            let children = parse_directory_listing(&listing);
            // Reversed so the stack yields entries in listing order
            for href in children.iter().rev() {
                match resolve_entry(&url, &path, href)? {
                    Some(entry) => pending.push((entry.url, entry.relative_path, depth + 1)),
                    None => debug!("Ignoring link {} outside {}", href, url),
                }
            }
        }

        Ok(files)
    }

    async fn download(&self, file: &ArtifactFile, dest: &mut File) -> Result<u64, ArgoError> {
        let response = self.get(&file.url).await?;
        let mut stream = response.bytes_stream();
        let mut written = 0u64;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            if chunk.is_empty() {
                continue;
            }
            dest.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        dest.flush().await?;
        Ok(written)
    }
}
