//! Knowledge base ingestion workflow: selection, sink binding, and vectorization.

pub mod selection;
pub mod sinks;
pub mod sources;
mod store;
pub mod types;
pub mod vectorize;

pub use selection::SelectionSet;
pub use sinks::{RemoteSinkCatalog, SinkCatalog, SinkError};
pub use sources::{
    DocumentSource, LocalFile, LocalUploadSource, RemoteDriveSource, SourceError, UploadBackend,
};
pub use store::KnowledgeBaseStore;
pub use types::{
    ActionKind, Document, ErrorKind, Phase, SourceKind, StorageSink, VectorizeReceipt,
    WorkflowError, WorkflowState,
};
pub use vectorize::{
    IngestionRequest, Submission, VectorizationCoordinator, VectorizeBackend, VectorizeError,
};
