//! Vectorization coordination: request validation and the single-flight guard.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use thiserror::Error;

use crate::backend::{ApiClient, ApiError};
use crate::workflow::selection::SelectionSet;
use crate::workflow::types::{Document, ErrorKind, StorageSink, VectorizeReceipt};

/// Errors returned by [`VectorizationCoordinator`].
#[derive(Debug, Error)]
pub enum VectorizeError {
    /// Preconditions failed; nothing was sent.
    #[error("Invalid vectorization request: {0}")]
    InvalidRequest(&'static str),
    /// Another submission from the same coordinator has not finished yet.
    #[error("A vectorization is already in progress")]
    AlreadyInProgress,
    /// The backend rejected the request or the transport failed after sending.
    #[error("Vectorization failed: {0}")]
    RemoteFailure(#[from] ApiError),
}

impl VectorizeError {
    /// Category recorded in the workflow state.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidRequest(_) => ErrorKind::InvalidRequest,
            Self::AlreadyInProgress => ErrorKind::AlreadyInProgress,
            Self::RemoteFailure(_) => ErrorKind::RemoteFailure,
        }
    }
}

/// Validated request: a non-empty selection bound to a sink.
#[derive(Debug, Clone, PartialEq)]
pub struct IngestionRequest {
    documents: SelectionSet,
    sink: StorageSink,
}

impl IngestionRequest {
    /// Validate the inputs and build a request.
    pub fn new(
        documents: impl IntoIterator<Item = Document>,
        sink: Option<StorageSink>,
    ) -> Result<Self, VectorizeError> {
        let documents: SelectionSet = documents.into_iter().collect();
        if documents.is_empty() {
            return Err(VectorizeError::InvalidRequest("no documents selected"));
        }
        let sink = sink.ok_or(VectorizeError::InvalidRequest("no storage table selected"))?;
        Ok(Self { documents, sink })
    }

    /// Documents to vectorize.
    pub fn documents(&self) -> &SelectionSet {
        &self.documents
    }

    /// Destination sink.
    pub fn sink(&self) -> &StorageSink {
        &self.sink
    }
}

/// Remote operation that turns documents into stored embeddings.
#[async_trait]
pub trait VectorizeBackend: Send + Sync {
    /// Send the request and wait for the backend's verdict.
    async fn vectorize(&self, request: &IngestionRequest) -> Result<VectorizeReceipt, ApiError>;
}

#[async_trait]
impl VectorizeBackend for ApiClient {
    async fn vectorize(&self, request: &IngestionRequest) -> Result<VectorizeReceipt, ApiError> {
        ApiClient::vectorize(self, request).await
    }
}

/// Issues ingestion requests, allowing at most one in flight at a time.
pub struct VectorizationCoordinator {
    backend: Arc<dyn VectorizeBackend>,
    in_flight: AtomicBool,
}

impl VectorizationCoordinator {
    /// Create a coordinator around `backend`.
    pub fn new(backend: Arc<dyn VectorizeBackend>) -> Self {
        Self {
            backend,
            in_flight: AtomicBool::new(false),
        }
    }

    /// Whether a submission currently holds the guard.
    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Validate the inputs and claim the single-flight guard.
    ///
    /// The guard is held by the returned [`Submission`] until it is sent or dropped.
    pub fn begin(
        &self,
        documents: impl IntoIterator<Item = Document>,
        sink: Option<StorageSink>,
    ) -> Result<Submission<'_>, VectorizeError> {
        let request = IngestionRequest::new(documents, sink)?;
        self.in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| VectorizeError::AlreadyInProgress)?;
        Ok(Submission {
            backend: self.backend.as_ref(),
            request,
            _guard: InFlight(&self.in_flight),
        })
    }

    /// Validate, claim the guard, and send in one step.
    pub async fn submit(
        &self,
        documents: impl IntoIterator<Item = Document>,
        sink: Option<StorageSink>,
    ) -> Result<VectorizeReceipt, VectorizeError> {
        self.begin(documents, sink)?.send().await
    }
}

/// A validated request holding the coordinator's guard.
pub struct Submission<'a> {
    backend: &'a dyn VectorizeBackend,
    request: IngestionRequest,
    _guard: InFlight<'a>,
}

impl Submission<'_> {
    /// The request that will be sent.
    pub fn request(&self) -> &IngestionRequest {
        &self.request
    }

    /// Send the request. The guard is released once the attempt settles.
    pub async fn send(self) -> Result<VectorizeReceipt, VectorizeError> {
        tracing::info!(
            documents = self.request.documents.len(),
            table = %self.request.sink.name,
            "Submitting vectorization"
        );
        let receipt = self.backend.vectorize(&self.request).await?;
        tracing::info!(status = %receipt.status, vector_count = ?receipt.vector_count, "Vectorization completed");
        Ok(receipt)
    }
}

struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}
