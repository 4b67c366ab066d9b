//! HTTP control surface for the knowledge base workflow.
//!
//! The UI never mutates workflow state directly; it calls these endpoints and re-renders the
//! snapshot each one returns:
//!
//! - `GET /state` – Current workflow snapshot.
//! - `POST /files/load` – Refresh the remote drive listing.
//! - `POST /tables/load` – Refresh the storage table listing.
//! - `POST /selection` – Stage a document (idempotent by id).
//! - `DELETE /selection/:id` – Unstage a document.
//! - `POST /uploads?name=<file>` – Send a raw local file body to the backend and stage it.
//! - `PUT /sink` – Select the destination table.
//! - `POST /vectorize` – Vectorize the current selection into the selected table.
//! - `POST /reset` – Return to the initial state.
//! - `GET /metrics` – Workflow counters.
//! - `GET /commands` – Machine-readable catalog of the endpoints above.

use crate::metrics::MetricsSnapshot;
use crate::workflow::{Document, KnowledgeBaseStore, LocalFile, StorageSink, WorkflowState};
use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, Query, State},
    routing::{delete, get, post, put},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

/// Build the HTTP router exposing the workflow actions.
pub fn create_router(store: Arc<KnowledgeBaseStore>) -> Router {
    Router::new()
        .route("/state", get(get_state))
        .route("/files/load", post(load_files))
        .route("/tables/load", post(load_tables))
        .route("/selection", post(select_file))
        .route("/selection/:id", delete(remove_file))
        .route("/uploads", post(upload_file))
        .route("/sink", put(select_table))
        .route("/vectorize", post(vectorize))
        .route("/reset", post(reset))
        .route("/metrics", get(get_metrics))
        .route("/commands", get(get_commands))
        .with_state(store)
}

type StoreState = State<Arc<KnowledgeBaseStore>>;

async fn get_state(State(store): StoreState) -> Json<WorkflowState> {
    Json(store.snapshot())
}

async fn load_files(State(store): StoreState) -> Json<WorkflowState> {
    Json(store.load_files().await)
}

async fn load_tables(State(store): StoreState) -> Json<WorkflowState> {
    Json(store.load_tables().await)
}

async fn select_file(State(store): StoreState, Json(document): Json<Document>) -> Json<WorkflowState> {
    store.select_file(document);
    Json(store.snapshot())
}

async fn remove_file(State(store): StoreState, Path(id): Path<String>) -> Json<WorkflowState> {
    store.remove_file(&id);
    Json(store.snapshot())
}

/// Query parameters for `POST /uploads`.
#[derive(Deserialize)]
struct UploadParams {
    /// File name reported by the browser.
    name: String,
}

async fn upload_file(
    State(store): StoreState,
    Query(params): Query<UploadParams>,
    body: Bytes,
) -> Json<WorkflowState> {
    Json(store.upload_file(&LocalFile::new(params.name, body.to_vec())).await)
}

async fn select_table(State(store): StoreState, Json(sink): Json<StorageSink>) -> Json<WorkflowState> {
    store.select_table(sink);
    Json(store.snapshot())
}

async fn vectorize(State(store): StoreState) -> Json<WorkflowState> {
    Json(store.vectorize_selection().await)
}

async fn reset(State(store): StoreState) -> Json<WorkflowState> {
    store.reset();
    Json(store.snapshot())
}

async fn get_metrics(State(store): StoreState) -> Json<MetricsSnapshot> {
    Json(store.metrics())
}

/// Descriptor for a single command in the discovery catalog.
#[derive(Serialize)]
struct CommandDescriptor {
    name: &'static str,
    method: &'static str,
    path: &'static str,
    description: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    request_example: Option<serde_json::Value>,
}

/// Response body for `GET /commands`.
#[derive(Serialize)]
struct CommandsResponse {
    commands: Vec<CommandDescriptor>,
}

async fn get_commands() -> Json<CommandsResponse> {
    let command = |name: &'static str,
                   method: &'static str,
                   path: &'static str,
                   description: &'static str| CommandDescriptor {
        name,
        method,
        path,
        description,
        request_example: None,
    };
    Json(CommandsResponse {
        commands: vec![
            command("state", "GET", "/state", "Return the current workflow snapshot."),
            command("load_files", "POST", "/files/load", "Refresh documents listed by the remote drive."),
            command("load_tables", "POST", "/tables/load", "Refresh storage tables available as sinks."),
            CommandDescriptor {
                request_example: Some(json!({
                    "id": "1a2b3c",
                    "name": "Company Handbook.pdf",
                    "source": "remote_drive",
                    "raw": { "mimeType": "application/pdf" }
                })),
                ..command("select_file", "POST", "/selection", "Stage a document for ingestion; duplicates by id are ignored.")
            },
            command("remove_file", "DELETE", "/selection/:id", "Unstage a document by id."),
            command("upload_file", "POST", "/uploads?name=<file>", "Upload a local file sent as the raw request body and stage it."),
            CommandDescriptor {
                request_example: Some(json!({ "name": "kb_vectors" })),
                ..command("select_table", "PUT", "/sink", "Select the storage table that receives vectors.")
            },
            command("vectorize", "POST", "/vectorize", "Vectorize the staged documents into the selected table."),
            command("reset", "POST", "/reset", "Clear the workflow back to its initial state."),
            command("metrics", "GET", "/metrics", "Return workflow counters."),
        ],
    })
}

#[cfg(test)]
mod tests {
    use super::{create_router, get_commands};
    use crate::backend::ApiError;
    use crate::workflow::{
        Document, DocumentSource, IngestionRequest, KnowledgeBaseStore, LocalFile, SinkCatalog,
        SinkError, SourceError, SourceKind, StorageSink, UploadBackend, VectorizeBackend,
        VectorizeReceipt,
    };
    use async_trait::async_trait;
    use axum::{
        body::{Body, to_bytes},
        http::{Method, Request, StatusCode},
    };
    use serde_json::{Map, Value, json};
    use std::sync::Arc;
    use tower::ServiceExt;

    struct StubBackend;

    #[async_trait]
    impl DocumentSource for StubBackend {
        async fn list(&self) -> Result<Vec<Document>, SourceError> {
            Ok(vec![Document::new("f1", "handbook.pdf", SourceKind::RemoteDrive)])
        }
    }

    #[async_trait]
    impl UploadBackend for StubBackend {
        async fn upload(&self, file: &LocalFile) -> Result<Document, ApiError> {
            Ok(Document {
                id: "srv-1".into(),
                name: file.name.clone(),
                source: SourceKind::LocalUpload,
                raw: json!({ "id": "srv-1", "filename": file.name }),
            })
        }
    }

    #[async_trait]
    impl SinkCatalog for StubBackend {
        async fn list(&self) -> Result<Vec<StorageSink>, SinkError> {
            Ok(vec![StorageSink::named("kb_vectors")])
        }
    }

    #[async_trait]
    impl VectorizeBackend for StubBackend {
        async fn vectorize(&self, request: &IngestionRequest) -> Result<VectorizeReceipt, ApiError> {
            Ok(VectorizeReceipt {
                status: "vectorization_complete".into(),
                vector_count: Some(request.documents().len() as u64),
                extra: Map::new(),
            })
        }
    }

    fn app() -> axum::Router {
        let stub = Arc::new(StubBackend);
        create_router(Arc::new(KnowledgeBaseStore::new(
            stub.clone(),
            stub.clone(),
            stub.clone(),
            stub,
        )))
    }

    async fn call(app: &axum::Router, method: Method, uri: &str, body: Option<Value>) -> Value {
        let mut builder = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(value) => {
                builder = builder.header("content-type", "application/json");
                Body::from(value.to_string())
            }
            None => Body::empty(),
        };
        let response = app
            .clone()
            .oneshot(builder.body(body).expect("request"))
            .await
            .expect("router response");
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body bytes");
        serde_json::from_slice(&bytes).expect("json body")
    }

    #[tokio::test]
    async fn commands_catalog_exposes_vectorize_endpoint() {
        let commands = get_commands().await.0.commands;
        let vectorize = commands
            .iter()
            .find(|cmd| cmd.name == "vectorize")
            .expect("vectorize command present");
        assert_eq!(vectorize.method, "POST");
        assert_eq!(vectorize.path, "/vectorize");
        assert!(commands.len() >= 8);
    }

    #[tokio::test]
    async fn full_workflow_over_http() {
        let app = app();

        let state = call(&app, Method::POST, "/files/load", None).await;
        assert_eq!(state["available_documents"][0]["id"], "f1");
        let state = call(&app, Method::POST, "/tables/load", None).await;
        assert_eq!(state["available_sinks"][0]["name"], "kb_vectors");
        assert_eq!(state["phase"], "IDLE");

        let document = json!({ "id": "f1", "name": "handbook.pdf", "source": "remote_drive" });
        call(&app, Method::POST, "/selection", Some(document.clone())).await;
        let state = call(&app, Method::POST, "/selection", Some(document)).await;
        assert_eq!(state["selection"].as_array().map(Vec::len), Some(1));

        let state = call(&app, Method::PUT, "/sink", Some(json!({ "name": "kb_vectors" }))).await;
        assert_eq!(state["selected_sink"]["name"], "kb_vectors");

        let state = call(&app, Method::POST, "/vectorize", None).await;
        assert_eq!(state["phase"], "SUCCEEDED");
        assert_eq!(state["last_receipt"]["vector_count"], 1);
        assert!(state["error"].is_null());

        let metrics = call(&app, Method::GET, "/metrics", None).await;
        assert_eq!(metrics["vectorizations_succeeded"], 1);
    }

    #[tokio::test]
    async fn vectorize_without_selection_reports_invalid_request() {
        let app = app();
        call(&app, Method::PUT, "/sink", Some(json!({ "name": "kb_vectors" }))).await;

        let state = call(&app, Method::POST, "/vectorize", None).await;
        assert_eq!(state["phase"], "FAILED");
        assert_eq!(state["error"]["kind"], "invalid_request");
        assert_eq!(state["error"]["action"], "vectorize");
    }

    #[tokio::test]
    async fn uploads_and_removal_round_through_selection() {
        let app = app();
        let request = Request::builder()
            .method(Method::POST)
            .uri("/uploads?name=faq.md")
            .body(Body::from("opening hours"))
            .expect("request");
        let response = app.clone().oneshot(request).await.expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("bytes");
        let state: Value = serde_json::from_slice(&bytes).expect("json");
        let id = state["selection"][0]["id"].as_str().expect("id").to_string();
        assert_eq!(state["selection"][0]["source"], "local_upload");
        assert_eq!(state["selection"][0]["raw"]["upload"]["id"], "srv-1");
        assert!(state["error"].is_null());

        let state = call(&app, Method::DELETE, &format!("/selection/{id}"), None).await;
        assert_eq!(state["selection"].as_array().map(Vec::len), Some(0));

        let state = call(&app, Method::POST, "/reset", None).await;
        assert_eq!(state["phase"], "IDLE");
    }
}
