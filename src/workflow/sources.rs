//! Document source adapters: the remote drive lister, the local upload acceptor, and the
//! uploader that hands local files to the backend.

use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use serde_json::json;
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::backend::{ApiClient, ApiError};
use crate::workflow::selection::SelectionSet;
use crate::workflow::types::{Document, SourceKind};

/// Errors raised by document sources.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The listing could not be produced.
    #[error("Document source unavailable: {0}")]
    SourceUnavailable(#[from] ApiError),
}

/// Capability shared by every provider of candidate documents.
#[async_trait]
pub trait DocumentSource: Send + Sync {
    /// List candidate documents in display order.
    async fn list(&self) -> Result<Vec<Document>, SourceError>;
}

/// Lists documents from the connected remote drive through the backend.
pub struct RemoteDriveSource {
    client: ApiClient,
}

impl RemoteDriveSource {
    /// Wrap a backend client.
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl DocumentSource for RemoteDriveSource {
    async fn list(&self) -> Result<Vec<Document>, SourceError> {
        self.client.list_drive_files().await.map_err(|err| {
            tracing::warn!(error = %err, status = ?err.status, "Remote drive listing failed");
            SourceError::SourceUnavailable(err)
        })
    }
}

/// File supplied from the local machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalFile {
    /// File name without directories.
    pub name: String,
    /// Raw file content.
    pub content: Vec<u8>,
}

impl LocalFile {
    /// Build a local file from a name and its content.
    pub fn new(name: impl Into<String>, content: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            content,
        }
    }

    /// Read a file from disk, naming it after the final path component.
    pub fn from_path(path: &Path) -> std::io::Result<Self> {
        let content = std::fs::read(path)?;
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self { name, content })
    }

    /// Content length in bytes.
    pub fn size(&self) -> usize {
        self.content.len()
    }

    /// Deterministic identifier derived from the name, size, and content.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.name.as_bytes());
        hasher.update([0u8]);
        hasher.update((self.content.len() as u64).to_le_bytes());
        hasher.update(&self.content);
        format!("upload-{}", hex::encode(hasher.finalize()))
    }
}

/// Accepts local files and exposes them as documents.
///
/// Identical files map to the same id, so repeated uploads collapse into one entry.
#[derive(Clone, Default)]
pub struct LocalUploadSource {
    accepted: Arc<Mutex<SelectionSet>>,
}

impl LocalUploadSource {
    /// Create an empty upload source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap `file` into a document and remember it for [`DocumentSource::list`].
    pub fn accept(&self, file: &LocalFile) -> Document {
        let document = Document {
            id: file.fingerprint(),
            name: file.name.clone(),
            source: SourceKind::LocalUpload,
            raw: json!({ "size": file.size() }),
        };
        let inserted = self
            .accepted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(document.clone());
        tracing::debug!(id = %document.id, name = %document.name, inserted, "Accepted local file");
        document
    }
}

#[async_trait]
impl DocumentSource for LocalUploadSource {
    async fn list(&self) -> Result<Vec<Document>, SourceError> {
        let accepted = self.accepted.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(accepted.as_slice().to_vec())
    }
}

/// Sends local file content to the backend so it can be vectorized later.
#[async_trait]
pub trait UploadBackend: Send + Sync {
    /// Upload `file`, returning the backend's record of it.
    async fn upload(&self, file: &LocalFile) -> Result<Document, ApiError>;
}

#[async_trait]
impl UploadBackend for ApiClient {
    async fn upload(&self, file: &LocalFile) -> Result<Document, ApiError> {
        self.upload_file(file).await
    }
}
