//! Storage sink listing.

use async_trait::async_trait;
use thiserror::Error;

use crate::backend::{ApiClient, ApiError};
use crate::workflow::types::StorageSink;

/// Errors raised while listing storage sinks.
#[derive(Debug, Error)]
pub enum SinkError {
    /// The catalog could not be listed.
    #[error("Storage catalog unavailable: {0}")]
    SourceUnavailable(#[from] ApiError),
}

/// Provider of structured-storage targets.
#[async_trait]
pub trait SinkCatalog: Send + Sync {
    /// List available sinks in display order.
    async fn list(&self) -> Result<Vec<StorageSink>, SinkError>;
}

/// Lists tables exposed by the backend's structured storage.
pub struct RemoteSinkCatalog {
    client: ApiClient,
}

impl RemoteSinkCatalog {
    /// Wrap a backend client.
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SinkCatalog for RemoteSinkCatalog {
    async fn list(&self) -> Result<Vec<StorageSink>, SinkError> {
        self.client.list_tables().await.map_err(|err| {
            tracing::warn!(error = %err, status = ?err.status, "Storage table listing failed");
            SinkError::SourceUnavailable(err)
        })
    }
}
