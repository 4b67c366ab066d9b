//! State container for the knowledge base ingestion workflow.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::{Value, json};

use uuid::Uuid;

use crate::backend::ApiClient;
use crate::metrics::{MetricsSnapshot, WorkflowMetrics};
use crate::workflow::sinks::{RemoteSinkCatalog, SinkCatalog};
use crate::workflow::sources::{
    DocumentSource, LocalFile, LocalUploadSource, RemoteDriveSource, UploadBackend,
};
use crate::workflow::types::{
    ActionKind, Document, ErrorKind, Phase, StorageSink, WorkflowError, WorkflowState,
};
use crate::workflow::vectorize::{VectorizationCoordinator, VectorizeBackend, VectorizeError};

/// Issues request tokens for one action kind and remembers which one is current.
#[derive(Debug, Default)]
struct RequestTracker {
    issued: u64,
    pending: Option<u64>,
}

impl RequestTracker {
    fn begin(&mut self) -> u64 {
        self.issued += 1;
        self.pending = Some(self.issued);
        self.issued
    }

    /// Settle `token`, returning whether its result should be applied.
    fn settle(&mut self, token: u64) -> bool {
        if self.pending == Some(token) {
            self.pending = None;
            true
        } else {
            false
        }
    }

    fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    fn abandon(&mut self) {
        self.pending = None;
    }
}

#[derive(Debug, Default)]
struct Inner {
    state: WorkflowState,
    files: RequestTracker,
    tables: RequestTracker,
    vectorize: RequestTracker,
    /// Uploads are tracked per document id, so different files never supersede each other.
    uploads: HashMap<String, RequestTracker>,
}

impl Inner {
    fn loads_pending(&self) -> bool {
        self.files.is_pending()
            || self.tables.is_pending()
            || self.uploads.values().any(RequestTracker::is_pending)
    }

    fn begin_load(&mut self) {
        if self.state.phase != Phase::Vectorizing {
            self.state.phase = Phase::Loading;
        }
    }

    /// Phase after a load settles; an in-flight vectorization keeps priority.
    ///
    /// A failure is shown at once. A success keeps LOADING while sibling loads are pending and
    /// keeps FAILED while an earlier load failure is still recorded.
    fn settle_load_phase(&mut self, failed: bool) {
        if self.state.phase == Phase::Vectorizing {
            return;
        }
        let load_failure_shown = self.state.error.as_ref().is_some_and(|error| {
            matches!(
                error.action,
                ActionKind::LoadFiles | ActionKind::LoadTables | ActionKind::Upload
            )
        });
        self.state.phase = if failed {
            Phase::Failed
        } else if self.loads_pending() {
            Phase::Loading
        } else if load_failure_shown {
            Phase::Failed
        } else {
            Phase::Idle
        };
    }

    fn clear_error_for(&mut self, action: ActionKind) {
        if self
            .state
            .error
            .as_ref()
            .is_some_and(|error| error.action == action)
        {
            self.state.error = None;
        }
    }

    fn record_error(&mut self, kind: ErrorKind, action: ActionKind, message: String) {
        self.state.error = Some(WorkflowError {
            kind,
            action,
            message,
        });
    }
}

/// Owns the [`WorkflowState`] and exposes the actions that mutate it.
///
/// Every action applies its effect under a single lock, so snapshots never observe a partial
/// update. Network-backed actions never return errors: failures are recorded in
/// [`WorkflowState::error`] together with a terminal phase.
///
/// Listing actions follow a last-call-wins rule per action kind. Each call takes a fresh
/// token; a result that arrives after a newer call of the same kind started is discarded.
pub struct KnowledgeBaseStore {
    id: Uuid,
    documents: Arc<dyn DocumentSource>,
    uploads: LocalUploadSource,
    uploader: Arc<dyn UploadBackend>,
    sinks: Arc<dyn SinkCatalog>,
    coordinator: VectorizationCoordinator,
    inner: Mutex<Inner>,
    metrics: WorkflowMetrics,
}

impl KnowledgeBaseStore {
    /// Build a store around explicit collaborators.
    pub fn new(
        documents: Arc<dyn DocumentSource>,
        uploader: Arc<dyn UploadBackend>,
        sinks: Arc<dyn SinkCatalog>,
        backend: Arc<dyn VectorizeBackend>,
    ) -> Self {
        let id = Uuid::new_v4();
        tracing::debug!(store = %id, "Created knowledge base store");
        Self {
            id,
            documents,
            uploads: LocalUploadSource::new(),
            uploader,
            sinks,
            coordinator: VectorizationCoordinator::new(backend),
            inner: Mutex::new(Inner::default()),
            metrics: WorkflowMetrics::new(),
        }
    }

    /// Build a store whose collaborators all talk to the given backend client.
    pub fn from_client(client: ApiClient) -> Self {
        Self::new(
            Arc::new(RemoteDriveSource::new(client.clone())),
            Arc::new(client.clone()),
            Arc::new(RemoteSinkCatalog::new(client.clone())),
            Arc::new(client),
        )
    }

    /// Read-only copy of the current state.
    pub fn snapshot(&self) -> WorkflowState {
        self.lock().state.clone()
    }

    /// Current metric counters.
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Refresh the remote document listing.
    pub async fn load_files(&self) -> WorkflowState {
        let token = {
            let mut inner = self.lock();
            let token = inner.files.begin();
            inner.begin_load();
            token
        };
        tracing::debug!(store = %self.id, token, "Loading files");

        let result = self.documents.list().await;

        let mut inner = self.lock();
        if !inner.files.settle(token) {
            self.metrics.record_stale_discarded();
            tracing::debug!(store = %self.id, token, "Discarding superseded file listing");
            return inner.state.clone();
        }
        match result {
            Ok(documents) => {
                tracing::info!(store = %self.id, count = documents.len(), "Files loaded");
                inner.state.available_documents = documents;
                inner.clear_error_for(ActionKind::LoadFiles);
                inner.settle_load_phase(false);
                self.metrics.record_load_applied();
            }
            Err(err) => {
                tracing::warn!(store = %self.id, error = %err, "Failed to load files");
                inner.record_error(ErrorKind::SourceUnavailable, ActionKind::LoadFiles, err.to_string());
                inner.settle_load_phase(true);
            }
        }
        inner.state.clone()
    }

    /// Refresh the storage sink listing.
    pub async fn load_tables(&self) -> WorkflowState {
        let token = {
            let mut inner = self.lock();
            let token = inner.tables.begin();
            inner.begin_load();
            token
        };
        tracing::debug!(store = %self.id, token, "Loading tables");

        let result = self.sinks.list().await;

        let mut inner = self.lock();
        if !inner.tables.settle(token) {
            self.metrics.record_stale_discarded();
            tracing::debug!(store = %self.id, token, "Discarding superseded table listing");
            return inner.state.clone();
        }
        match result {
            Ok(sinks) => {
                tracing::info!(store = %self.id, count = sinks.len(), "Tables loaded");
                inner.state.available_sinks = sinks;
                inner.clear_error_for(ActionKind::LoadTables);
                inner.settle_load_phase(false);
                self.metrics.record_load_applied();
            }
            Err(err) => {
                tracing::warn!(store = %self.id, error = %err, "Failed to load tables");
                inner.record_error(ErrorKind::SourceUnavailable, ActionKind::LoadTables, err.to_string());
                inner.settle_load_phase(true);
            }
        }
        inner.state.clone()
    }

    /// Stage `document` for ingestion. Returns `false` when its id was already staged.
    pub fn select_file(&self, document: Document) -> bool {
        let id = document.id.clone();
        let inserted = self.lock().state.selection.insert(document);
        tracing::debug!(store = %self.id, %id, inserted, "Select file");
        inserted
    }

    /// Unstage the document with `id`. Returns `false` when it was not staged.
    pub fn remove_file(&self, id: &str) -> bool {
        let removed = self.lock().state.selection.remove(id);
        tracing::debug!(store = %self.id, id, removed, "Remove file");
        removed
    }

    /// Send a local file to the backend and stage it once the backend has it.
    ///
    /// The staged document keeps its content-derived id; the backend's record is bound under
    /// `raw.upload` so vectorization can resolve it. A file that is already staged is not sent
    /// again. Repeating an upload that is still in flight supersedes the earlier call.
    pub async fn upload_file(&self, file: &LocalFile) -> WorkflowState {
        let local = self.uploads.accept(file);
        let token = {
            let mut inner = self.lock();
            if inner.state.selection.contains(&local.id) {
                tracing::debug!(store = %self.id, id = %local.id, "Upload already staged");
                return inner.state.clone();
            }
            let token = inner.uploads.entry(local.id.clone()).or_default().begin();
            inner.begin_load();
            token
        };
        tracing::debug!(store = %self.id, id = %local.id, token, "Uploading local file");

        let result = self.uploader.upload(file).await;

        let mut inner = self.lock();
        let current = inner
            .uploads
            .get_mut(&local.id)
            .is_some_and(|tracker| tracker.settle(token));
        if !current {
            self.metrics.record_stale_discarded();
            tracing::debug!(store = %self.id, id = %local.id, token, "Discarding superseded upload");
            return inner.state.clone();
        }
        inner.uploads.remove(&local.id);
        match result {
            Ok(remote) => {
                tracing::info!(store = %self.id, id = %local.id, remote = %remote.id, "Local file uploaded");
                let document = bind_upload(local, remote);
                inner.state.selection.insert(document);
                inner.clear_error_for(ActionKind::Upload);
                inner.settle_load_phase(false);
            }
            Err(err) => {
                tracing::warn!(store = %self.id, name = %file.name, error = %err, "Failed to upload file");
                inner.record_error(
                    ErrorKind::RemoteFailure,
                    ActionKind::Upload,
                    format!("Upload of {} failed: {err}", file.name),
                );
                inner.settle_load_phase(true);
            }
        }
        inner.state.clone()
    }

    /// Bind the workflow to `sink`, replacing any previous choice.
    pub fn select_table(&self, sink: StorageSink) {
        tracing::debug!(store = %self.id, table = %sink.name, "Select table");
        self.lock().state.selected_sink = Some(sink);
    }

    /// Vectorize `documents` into `sink`.
    ///
    /// Invalid inputs and concurrent submissions are refused without a network call. Invalid
    /// inputs move an idle workflow to FAILED; an AlreadyInProgress refusal never changes the
    /// phase.
    pub async fn vectorize_documents(
        &self,
        documents: Vec<Document>,
        sink: Option<StorageSink>,
    ) -> WorkflowState {
        let submission = match self.coordinator.begin(documents, sink) {
            Ok(submission) => submission,
            Err(err) => {
                self.metrics.record_rejected();
                tracing::warn!(store = %self.id, error = %err, "Vectorization refused");
                let refused_invalid = err.kind() == ErrorKind::InvalidRequest;
                let mut inner = self.lock();
                inner.state.error = Some(err.into());
                if refused_invalid && inner.state.phase != Phase::Vectorizing {
                    inner.state.phase = Phase::Failed;
                }
                return inner.state.clone();
            }
        };

        let token = {
            let mut inner = self.lock();
            inner.state.phase = Phase::Vectorizing;
            inner.vectorize.begin()
        };
        self.metrics.record_submitted();

        let result = submission.send().await;
        self.metrics.record_outcome(result.is_ok());

        let mut inner = self.lock();
        if !inner.vectorize.settle(token) {
            tracing::debug!(store = %self.id, "Discarding vectorization result after reset");
            return inner.state.clone();
        }
        match result {
            Ok(receipt) => {
                inner.state.phase = Phase::Succeeded;
                inner.state.last_receipt = Some(receipt);
                inner.clear_error_for(ActionKind::Vectorize);
            }
            Err(err) => {
                tracing::error!(store = %self.id, error = %err, "Vectorization failed");
                inner.state.phase = Phase::Failed;
                inner.state.error = Some(err.into());
            }
        }
        inner.state.clone()
    }

    /// Vectorize the current selection into the currently selected sink.
    pub async fn vectorize_selection(&self) -> WorkflowState {
        let (documents, sink) = {
            let inner = self.lock();
            (
                inner.state.selection.as_slice().to_vec(),
                inner.state.selected_sink.clone(),
            )
        };
        self.vectorize_documents(documents, sink).await
    }

    /// Return to the initial empty state. Results of calls started earlier are discarded.
    pub fn reset(&self) {
        let mut inner = self.lock();
        inner.files.abandon();
        inner.tables.abandon();
        inner.vectorize.abandon();
        inner.uploads.clear();
        inner.state = WorkflowState::default();
        tracing::info!(store = %self.id, "Workflow reset");
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Merge the backend's record of an upload into the locally accepted document.
fn bind_upload(mut local: Document, remote: Document) -> Document {
    let reference = match remote.raw {
        Value::Null => json!({ "id": remote.id, "name": remote.name }),
        raw => raw,
    };
    match &mut local.raw {
        Value::Object(raw) => {
            raw.insert("upload".into(), reference);
        }
        other => *other = json!({ "upload": reference }),
    }
    local
}

impl From<VectorizeError> for WorkflowError {
    fn from(err: VectorizeError) -> Self {
        Self {
            kind: err.kind(),
            action: ActionKind::Vectorize,
            message: err.to_string(),
        }
    }
}
