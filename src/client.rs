use crate::db::{ActivityRow, ClipboardRow};
use crate::error::StoreError;
use crate::files::FileView;
use crate::files::upload::{UploadGateway, UploadItem};
use anyhow::{Context, Result};
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::time::Duration;
use url::Url;

const REQUEST_TIMEOUT_SECONDS: u64 = 120;

#[derive(Debug, Deserialize)]
pub struct ActivityListPayload {
    pub filter: String,
    pub field: String,
    pub count: usize,
    pub activities: Vec<ActivityRow>,
}

#[derive(Debug, Deserialize)]
struct IdPayload {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct UrlPayload {
    url: String,
}

#[derive(Debug, Deserialize)]
struct TransferPayload {
    blob_id: String,
}

#[derive(Debug, Deserialize)]
struct FilesPayload {
    files: Vec<FileView>,
}

#[derive(Debug, Deserialize)]
struct ClipboardPayload {
    entry: Option<ClipboardRow>,
}

/// HTTP client for a running Daybook service.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: Client,
    base_url: Url,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let normalized = format!("{}/", base_url.trim().trim_end_matches('/'));
        let base_url =
            Url::parse(&normalized).with_context(|| format!("Invalid service URL: {base_url}"))?;
        let http = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECONDS))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self { http, base_url })
    }

    fn endpoint(&self, path: &str) -> Result<Url, StoreError> {
        self.base_url
            .join(path)
            .with_context(|| format!("Failed to build endpoint URL: {path}"))
            .map_err(StoreError::from)
    }

    pub async fn list_activities(
        &self,
        filter: &str,
        field: Option<&str>,
    ) -> Result<ActivityListPayload, StoreError> {
        let mut query = vec![("filter", filter)];
        if let Some(field) = field {
            query.push(("field", field));
        }

        let request = self
            .http
            .get(self.endpoint("api/v1/activities")?)
            .query(&query);
        decode(self.send(request).await?).await
    }

    pub async fn add_activity(&self, text: &str, date: i64) -> Result<i64, StoreError> {
        let request = self
            .http
            .post(self.endpoint("api/v1/activities")?)
            .json(&json!({ "text": text, "date": date }));
        let payload: IdPayload = decode(self.send(request).await?).await?;
        Ok(payload.id)
    }

    pub async fn delete_activity(&self, id: i64) -> Result<(), StoreError> {
        let request = self
            .http
            .delete(self.endpoint(&format!("api/v1/activities/{id}"))?);
        self.send(request).await.map(|_| ())
    }

    pub async fn clipboard(&self) -> Result<Option<ClipboardRow>, StoreError> {
        let response = self.send(self.http.get(self.endpoint("api/v1/clipboard")?)).await?;
        let payload: ClipboardPayload = decode(response).await?;
        Ok(payload.entry)
    }

    pub async fn set_clipboard(
        &self,
        id: Option<i64>,
        text: &str,
    ) -> Result<ClipboardRow, StoreError> {
        let request = self
            .http
            .put(self.endpoint("api/v1/clipboard")?)
            .json(&json!({ "id": id, "text": text }));
        decode(self.send(request).await?).await
    }

    pub async fn clear_clipboard(&self, id: i64) -> Result<(), StoreError> {
        let request = self
            .http
            .delete(self.endpoint(&format!("api/v1/clipboard/{id}"))?);
        self.send(request).await.map(|_| ())
    }

    pub async fn list_files(&self) -> Result<Vec<FileView>, StoreError> {
        let response = self.send(self.http.get(self.endpoint("api/v1/files")?)).await?;
        let payload: FilesPayload = decode(response).await?;
        Ok(payload.files)
    }

    pub async fn download_url(&self, blob_id: &str) -> Result<Url, StoreError> {
        let request = self
            .http
            .post(self.endpoint("api/v1/files/download-url")?)
            .json(&json!({ "blob_id": blob_id }));
        let payload: UrlPayload = decode(self.send(request).await?).await?;

        Url::parse(&payload.url)
            .with_context(|| format!("Service returned an invalid download URL: {}", payload.url))
            .map_err(StoreError::from)
    }

    pub async fn download(&self, url: &Url) -> Result<Vec<u8>, StoreError> {
        let response = self.send(self.http.get(url.clone())).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|error| StoreError::Transfer(error.to_string()))?;
        Ok(bytes.to_vec())
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<Response, StoreError> {
        let response = request
            .send()
            .await
            .map_err(|error| StoreError::Transfer(error.to_string()))?;

        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status();
        let message = response
            .json::<Value>()
            .await
            .ok()
            .and_then(|body| body.get("error").and_then(Value::as_str).map(str::to_owned))
            .unwrap_or_else(|| status.to_string());

        Err(match status {
            StatusCode::BAD_REQUEST => StoreError::Validation(message),
            StatusCode::NOT_FOUND => StoreError::NotFound(message),
            StatusCode::PAYLOAD_TOO_LARGE => StoreError::Transfer(message),
            _ => StoreError::Transfer(format!("{status}: {message}")),
        })
    }
}

impl UploadGateway for ApiClient {
    async fn request_upload_url(&self) -> Result<Url, StoreError> {
        let request = self.http.post(self.endpoint("api/v1/files/upload-url")?);
        let payload: UrlPayload = decode(self.send(request).await?).await?;

        Url::parse(&payload.url)
            .with_context(|| format!("Service returned an invalid upload URL: {}", payload.url))
            .map_err(StoreError::from)
    }

    async fn transfer(
        &self,
        url: &Url,
        item: &UploadItem,
        bytes: Vec<u8>,
    ) -> Result<String, StoreError> {
        let request = self
            .http
            .post(url.clone())
            .query(&[("name", item.name.as_str())])
            .header(CONTENT_TYPE, item.content_type.as_str())
            .body(bytes);
        let payload: TransferPayload = decode(self.send(request).await?).await?;
        Ok(payload.blob_id)
    }

    async fn register_file(&self, blob_id: &str) -> Result<i64, StoreError> {
        let request = self
            .http
            .post(self.endpoint("api/v1/files")?)
            .json(&json!({ "blob_id": blob_id }));
        let payload: IdPayload = decode(self.send(request).await?).await?;
        Ok(payload.id)
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, StoreError> {
    response
        .json::<T>()
        .await
        .map_err(|error| StoreError::Transfer(format!("Invalid response body: {error}")))
}
