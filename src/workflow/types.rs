//! Core data types shared by the workflow components.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use crate::workflow::selection::SelectionSet;

/// Origin of a candidate document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Listed from the connected remote drive.
    RemoteDrive,
    /// Supplied by the operator from the local machine.
    LocalUpload,
}

/// Candidate input to ingestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Identifier, unique within a selection.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Where the document came from.
    pub source: SourceKind,
    /// Source-defined payload (remote reference, file metadata, ...).
    #[serde(default)]
    pub raw: Value,
}

impl Document {
    /// Build a document without any source-specific payload.
    pub fn new(id: impl Into<String>, name: impl Into<String>, source: SourceKind) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            source,
            raw: Value::Null,
        }
    }
}

/// Named structured-storage target for vectorized output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageSink {
    /// Unique sink name (table or collection).
    pub name: String,
    /// Source-defined metadata, opaque to the workflow.
    #[serde(default, flatten)]
    pub metadata: Map<String, Value>,
}

impl StorageSink {
    /// Build a sink carrying only its name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            metadata: Map::new(),
        }
    }
}

/// Coarse workflow phase rendered by the UI.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    /// Nothing in flight.
    #[default]
    Idle,
    /// A listing request is in flight.
    Loading,
    /// A vectorization request is in flight.
    Vectorizing,
    /// The last vectorization completed successfully.
    Succeeded,
    /// The last action failed; see [`WorkflowState::error`].
    Failed,
}

/// Action family used for request tokens and error attribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    /// `load_files`.
    LoadFiles,
    /// `load_tables`.
    LoadTables,
    /// `vectorize_documents`.
    Vectorize,
    /// `upload_file`.
    Upload,
}

/// Error taxonomy surfaced in the workflow state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// A document or sink listing failed.
    SourceUnavailable,
    /// Vectorization preconditions were not met; nothing was sent.
    InvalidRequest,
    /// A vectorization is already in flight for this store.
    AlreadyInProgress,
    /// The backend rejected a request after it was sent.
    RemoteFailure,
}

/// Error recorded in the workflow state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowError {
    /// Error category.
    pub kind: ErrorKind,
    /// Action that produced the error.
    pub action: ActionKind,
    /// Human-readable message for the error banner.
    pub message: String,
}

impl fmt::Display for WorkflowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Backend acknowledgement of a vectorization request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorizeReceipt {
    /// Status string reported by the backend.
    pub status: String,
    /// Number of vectors written, when reported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vector_count: Option<u64>,
    /// Remaining response fields.
    #[serde(default, flatten)]
    pub extra: Map<String, Value>,
}

/// Aggregate state owned by [`crate::workflow::KnowledgeBaseStore`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WorkflowState {
    /// Documents offered by the remote drive.
    pub available_documents: Vec<Document>,
    /// Documents staged for ingestion.
    pub selection: SelectionSet,
    /// Storage sinks offered by the backend.
    pub available_sinks: Vec<StorageSink>,
    /// Sink the vectorized output will be written to.
    pub selected_sink: Option<StorageSink>,
    /// Current phase.
    pub phase: Phase,
    /// Last error, retained until the same action kind succeeds.
    pub error: Option<WorkflowError>,
    /// Receipt of the last successful vectorization.
    pub last_receipt: Option<VectorizeReceipt>,
}
