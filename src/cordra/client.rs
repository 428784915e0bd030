use async_trait::async_trait;
use reqwest::{multipart, Body, Client, Response};
use serde_json::Value;
use tokio_util::io::ReaderStream;
use tracing::debug;

use super::{object_id, ObjectStore, Payload, SearchResults};
use crate::errors::CordraError;

/// HTTP client for a Cordra instance, authenticating with basic auth
pub struct CordraClient {
    /// The base URL of the instance (e.g. "https://cordra.example.org:8443")
    base_url: String,
    user: String,
    password: String,
    client: Client,
}

impl CordraClient {
    pub fn new(
        base_url: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
        verify_cert: bool,
    ) -> Result<Self, CordraError> {
        let client = Client::builder()
            .danger_accept_invalid_certs(!verify_cert)
            .build()?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            user: user.into(),
            password: password.into(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn objects_url(&self, id: &str) -> String {
        format!("{}/objects/{}", self.base_url, id)
    }

    async fn multipart_form(content: &Value, payload: Payload) -> Result<multipart::Form, CordraError> {
        let file = tokio::fs::File::open(&payload.path)
            .await
            .map_err(|e| CordraError::Payload(payload.name.clone(), e))?;
        let length = file
            .metadata()
            .await
            .map_err(|e| CordraError::Payload(payload.name.clone(), e))?
            .len();

        let file_part = multipart::Part::stream_with_length(Body::wrap_stream(ReaderStream::new(file)), length)
            .file_name(payload.name.clone());
        let content_part = multipart::Part::text(content.to_string()).mime_str("application/json")?;

        // Payload names are relative paths and must reach Cordra unescaped
        Ok(multipart::Form::new()
            .percent_encode_noop()
            .part("content", content_part)
            .part(payload.name, file_part))
    }
}

/// Turns non-success responses into `CordraError::Status`, keeping Cordra's message
async fn check_status(response: Response) -> Result<Response, CordraError> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status();
    let message = match response.json::<Value>().await {
        Ok(body) => body
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("Unknown error")
            .to_string(),
        Err(_) => format!("HTTP {}", status),
    };
    Err(CordraError::Status { status, message })
}

#[async_trait]
impl ObjectStore for CordraClient {
    async fn create(&self, obj_type: &str, content: &Value, payload: Option<Payload>) -> Result<Value, CordraError> {
        debug!("Creating {} object", obj_type);
        let request = self
            .client
            .post(format!("{}/objects", self.base_url))
            .basic_auth(&self.user, Some(&self.password))
            .query(&[("type", obj_type), ("full", "true")]);

        let request = match payload {
            Some(payload) => request.multipart(Self::multipart_form(content, payload).await?),
            None => request.json(content),
        };

        let response = check_status(request.send().await?).await?;
        let full: Value = response.json().await?;

        // Schemas without an @id mapping only report the handle at the top level
        let mut created = full.get("content").cloned().unwrap_or(Value::Null);
        if object_id(&created).is_none() {
            let id = full
                .get("id")
                .and_then(Value::as_str)
                .ok_or_else(|| CordraError::MissingId(obj_type.to_string()))?
                .to_string();
            match created.as_object_mut() {
                Some(map) => {
                    map.insert("@id".to_string(), Value::from(id));
                }
                None => created = serde_json::json!({ "@id": id }),
            }
        }
        Ok(created)
    }

    async fn read(&self, id: &str) -> Result<Value, CordraError> {
        let response = self
            .client
            .get(self.objects_url(id))
            .basic_auth(&self.user, Some(&self.password))
            .send()
            .await?;
        Ok(check_status(response).await?.json().await?)
    }

    async fn update(&self, id: &str, content: &Value) -> Result<Value, CordraError> {
        let response = self
            .client
            .put(self.objects_url(id))
            .basic_auth(&self.user, Some(&self.password))
            .json(content)
            .send()
            .await?;
        Ok(check_status(response).await?.json().await?)
    }

    async fn delete(&self, id: &str) -> Result<(), CordraError> {
        let response = self
            .client
            .delete(self.objects_url(id))
            .basic_auth(&self.user, Some(&self.password))
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }

    async fn search(&self, query: &str) -> Result<SearchResults, CordraError> {
        let response = self
            .client
            .get(format!("{}/search", self.base_url))
            .basic_auth(&self.user, Some(&self.password))
            .query(&[("query", query)])
            .send()
            .await?;
        Ok(check_status(response).await?.json().await?)
    }

    fn object_url(&self, id: &str) -> String {
        self.objects_url(id)
    }
}

#[cfg(test)]
mod tests;
