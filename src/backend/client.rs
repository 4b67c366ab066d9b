//! HTTP client wrapper for the dashboard backend.

use std::time::Duration;

use reqwest::{Client, Method, multipart};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::backend::types::{
    ApiError, DriveAuthorization, DriveStatus, SearchBody, SearchResponse, VectorizeBody,
    document_from_entry, error_message, listing_entries, sink_from_entry,
};
use crate::config::Config;
use crate::workflow::{Document, IngestionRequest, SourceKind, StorageSink, VectorizeReceipt};
use crate::workflow::sources::LocalFile;

/// Lightweight HTTP client for the knowledge base endpoints.
///
/// Timeout policy lives here: the workflow only sees success or a normalized [`ApiError`].
#[derive(Clone)]
pub struct ApiClient {
    pub(crate) client: Client,
    pub(crate) base_url: String,
}

impl ApiClient {
    /// Construct a client for `base_url` with the given per-request timeout.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        let client = Client::builder()
            .user_agent(concat!("kbflow/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;
        let base_url = normalize_base_url(base_url).map_err(ApiError::message)?;
        tracing::debug!(url = %base_url, timeout_secs = timeout.as_secs(), "Initialized backend HTTP client");
        Ok(Self { client, base_url })
    }

    /// Construct a client from loaded configuration.
    pub fn from_config(config: &Config) -> Result<Self, ApiError> {
        Self::new(&config.api_url, config.http_timeout())
    }

    /// List documents available on the connected remote drive.
    pub async fn list_drive_files(&self) -> Result<Vec<Document>, ApiError> {
        let body: Value = self.get_json("drive/files").await?;
        let documents = listing_entries(body)?
            .into_iter()
            .filter_map(|entry| {
                let document = document_from_entry(entry, SourceKind::RemoteDrive);
                if document.is_none() {
                    tracing::warn!("Skipping drive entry without an identifier");
                }
                document
            })
            .collect::<Vec<_>>();
        tracing::debug!(count = documents.len(), "Listed drive files");
        Ok(documents)
    }

    /// Report whether the backend holds valid drive credentials.
    pub async fn drive_status(&self) -> Result<DriveStatus, ApiError> {
        self.get_json("drive/status").await
    }

    /// Start the drive authorization flow.
    pub async fn connect_drive(&self) -> Result<DriveAuthorization, ApiError> {
        self.get_json("drive/connect").await
    }

    /// Upload a local file to the backend as multipart form data.
    pub async fn upload_file(&self, file: &LocalFile) -> Result<Document, ApiError> {
        let part = multipart::Part::bytes(file.content.clone()).file_name(file.name.clone());
        let form = multipart::Form::new().part("file", part);
        let response = self
            .request(Method::POST, "upload")
            .multipart(form)
            .send()
            .await?;
        let body: Value = self.decode(response).await?;
        let document = document_from_entry(body.clone(), SourceKind::LocalUpload).ok_or_else(|| {
            ApiError {
                message: "Upload response did not contain a document id".into(),
                status: None,
                data: Some(body),
            }
        })?;
        tracing::info!(id = %document.id, name = %document.name, "Uploaded local file");
        Ok(document)
    }

    /// List structured-storage tables that can receive vectorized output.
    pub async fn list_tables(&self) -> Result<Vec<StorageSink>, ApiError> {
        let body: Value = self.get_json("supabase/tables").await?;
        let sinks = listing_entries(body)?
            .into_iter()
            .filter_map(sink_from_entry)
            .collect::<Vec<_>>();
        tracing::debug!(count = sinks.len(), "Listed storage tables");
        Ok(sinks)
    }

    /// Submit a validated ingestion request.
    pub async fn vectorize(&self, request: &IngestionRequest) -> Result<VectorizeReceipt, ApiError> {
        let body = VectorizeBody {
            files: request.documents().as_slice(),
            table: &request.sink().name,
        };
        let response = self
            .request(Method::POST, "vectorize")
            .json(&body)
            .send()
            .await?;
        self.decode(response).await
    }

    /// Run a similarity search over vectors previously written to `table`.
    pub async fn search(
        &self,
        table: &str,
        query: &str,
        top_k: usize,
    ) -> Result<SearchResponse, ApiError> {
        if query.trim().is_empty() {
            return Err(ApiError::message("Search query must not be empty"));
        }
        if table.trim().is_empty() {
            return Err(ApiError::message("Search table must not be empty"));
        }
        let body = SearchBody {
            query,
            top_k: top_k.max(1),
            supabase_table: table,
        };
        let response = self
            .request(Method::POST, "search")
            .json(&body)
            .send()
            .await?;
        let found: SearchResponse = self.decode(response).await?;
        tracing::debug!(table, hits = found.results.len(), "Searched knowledge base");
        Ok(found)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let response = self.request(Method::GET, path).send().await?;
        self.decode(response).await
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        self.client.request(method, format_endpoint(&self.base_url, path))
    }

    async fn decode<T: DeserializeOwned>(&self, response: reqwest::Response) -> Result<T, ApiError> {
        let status = response.status();
        if status.is_success() {
            return response.json().await.map_err(|err| ApiError {
                message: format!("Invalid response body: {err}"),
                status: Some(status.as_u16()),
                data: None,
            });
        }

        let url = response.url().clone();
        let text = response.text().await.unwrap_or_default();
        let data = serde_json::from_str::<Value>(&text)
            .ok()
            .or_else(|| (!text.is_empty()).then(|| Value::String(text)));
        let error = ApiError {
            message: error_message(status.as_u16(), data.as_ref()),
            status: Some(status.as_u16()),
            data,
        };
        tracing::error!(%url, status = status.as_u16(), error = %error, "Backend request failed");
        Err(error)
    }
}

fn normalize_base_url(url: &str) -> Result<String, String> {
    let mut parsed = reqwest::Url::parse(url).map_err(|err| format!("Invalid backend URL: {err}"))?;
    let path = parsed.path().trim_end_matches('/').to_string();
    parsed.set_path(&path);
    Ok(parsed.to_string())
}

fn format_endpoint(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    format!("{base}/{path}")
}
