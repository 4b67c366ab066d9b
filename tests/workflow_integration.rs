use std::time::Duration;

use httpmock::{Method::GET, Method::POST, MockServer};
use kbflow::{
    backend::ApiClient,
    workflow::{
        ActionKind, Document, ErrorKind, KnowledgeBaseStore, LocalFile, Phase, SourceKind,
        StorageSink,
    },
};
use serde_json::json;

fn store_for(server: &MockServer) -> KnowledgeBaseStore {
    let client = ApiClient::new(&server.base_url(), Duration::from_secs(5)).expect("client");
    KnowledgeBaseStore::from_client(client)
}

#[tokio::test]
async fn drive_selection_is_vectorized_into_selected_table() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/drive/files");
            then.status(200).json_body(json!([
                { "id": "1", "name": "a" },
                { "id": "2", "name": "b" }
            ]));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/supabase/tables");
            then.status(200).json_body(json!(["t1", "t2"]));
        })
        .await;
    let vectorize = server
        .mock_async(|when, then| {
            when.method(POST).path("/vectorize").json_body(json!({
                "files": [{ "id": "1", "name": "a", "source": "remote_drive", "raw": { "id": "1", "name": "a" } }],
                "table": "t1"
            }));
            then.status(200)
                .json_body(json!({ "status": "vectorization_complete", "vector_count": 100 }));
        })
        .await;

    let store = store_for(&server);
    let state = store.load_files().await;
    assert_eq!(state.available_documents.len(), 2);
    let state = store.load_tables().await;
    assert_eq!(state.available_sinks[0].name, "t1");

    store.select_file(state.available_documents[0].clone());
    store.select_file(state.available_documents[0].clone());
    store.select_table(state.available_sinks[1].clone());
    store.select_table(state.available_sinks[0].clone());

    let state = store.vectorize_selection().await;

    vectorize.assert_async().await;
    assert_eq!(state.phase, Phase::Succeeded);
    assert!(state.error.is_none());
    assert_eq!(
        state.last_receipt.map(|receipt| receipt.status),
        Some("vectorization_complete".to_string())
    );
    assert_eq!(store.metrics().vectorizations_succeeded, 1);
}

#[tokio::test]
async fn local_file_is_uploaded_before_it_is_vectorized() {
    let server = MockServer::start_async().await;
    let upload = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/upload")
                .body_contains("filename=\"faq.txt\"")
                .body_contains("We open at nine.");
            then.status(200).json_body(json!({ "id": "srv-42", "filename": "faq.txt" }));
        })
        .await;
    let vectorize = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/vectorize")
                .body_contains("\"srv-42\"")
                .json_body_partial(r#"{ "table": "kb_vectors" }"#);
            then.status(200)
                .json_body(json!({ "status": "vectorization_complete", "vector_count": 12 }));
        })
        .await;

    let store = store_for(&server);
    let file = LocalFile::new("faq.txt", b"We open at nine.".to_vec());
    let state = store.upload_file(&file).await;

    assert_eq!(upload.hits_async().await, 1);
    assert_eq!(vectorize.hits_async().await, 0);
    assert_eq!(state.phase, Phase::Idle);
    let staged = &state.selection.as_slice()[0];
    assert_eq!(staged.id, file.fingerprint());
    assert_eq!(staged.source, SourceKind::LocalUpload);
    assert_eq!(staged.raw["upload"]["id"], "srv-42");

    store.upload_file(&file).await;
    assert_eq!(upload.hits_async().await, 1);

    store.select_table(StorageSink::named("kb_vectors"));
    let state = store.vectorize_selection().await;

    vectorize.assert_async().await;
    assert_eq!(state.phase, Phase::Succeeded);
    assert_eq!(state.last_receipt.and_then(|receipt| receipt.vector_count), Some(12));
}

#[tokio::test]
async fn rejected_upload_is_attributed_to_the_upload_action() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/upload");
            then.status(413).json_body(json!({ "detail": "File exceeds 10MB" }));
        })
        .await;

    let store = store_for(&server);
    let state = store.upload_file(&LocalFile::new("huge.pdf", vec![0u8; 64])).await;

    assert_eq!(state.phase, Phase::Failed);
    assert!(state.selection.is_empty());
    let error = state.error.expect("error recorded");
    assert_eq!(error.kind, ErrorKind::RemoteFailure);
    assert_eq!(error.action, ActionKind::Upload);
    assert!(error.message.contains("File exceeds 10MB"));
}

#[tokio::test]
async fn backend_rejection_is_recorded_as_remote_failure() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/upload");
            then.status(200).json_body(json!({ "id": "srv-1", "filename": "faq.txt" }));
        })
        .await;
    let vectorize = server
        .mock_async(|when, then| {
            when.method(POST).path("/vectorize");
            then.status(500)
                .json_body(json!({ "detail": "Failed to generate embedding using OpenAI service." }));
        })
        .await;

    let store = store_for(&server);
    let state = store
        .upload_file(&LocalFile::new("faq.txt", b"We open at nine.".to_vec()))
        .await;
    assert_eq!(state.selection.len(), 1);
    store.select_table(StorageSink::named("kb_vectors"));

    let state = store.vectorize_selection().await;

    vectorize.assert_async().await;
    assert_eq!(state.phase, Phase::Failed);
    let error = state.error.expect("error recorded");
    assert_eq!(error.kind, ErrorKind::RemoteFailure);
    assert!(error.message.contains("Failed to generate embedding"));
    assert_eq!(state.selection.len(), 1);
}

#[tokio::test]
async fn listing_outage_keeps_previous_documents() {
    let server = MockServer::start_async().await;
    let mut ok = server
        .mock_async(|when, then| {
            when.method(GET).path("/drive/files");
            then.status(200).json_body(json!({ "files": [{ "id": "1", "name": "a" }] }));
        })
        .await;

    let store = store_for(&server);
    assert_eq!(store.load_files().await.available_documents.len(), 1);

    ok.delete_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/drive/files");
            then.status(502).body("bad gateway");
        })
        .await;

    let state = store.load_files().await;
    assert_eq!(state.phase, Phase::Failed);
    assert_eq!(state.available_documents.len(), 1);
    let error = state.error.expect("error recorded");
    assert_eq!(error.kind, ErrorKind::SourceUnavailable);
    assert!(error.message.contains("502"));
}

#[tokio::test]
async fn vectorize_without_table_never_reaches_backend() {
    let server = MockServer::start_async().await;
    let vectorize = server
        .mock_async(|when, then| {
            when.method(POST).path("/vectorize");
            then.status(200).json_body(json!({ "status": "ok" }));
        })
        .await;

    let store = store_for(&server);
    store.select_file(Document::new("notes", "notes.md", SourceKind::RemoteDrive));
    let state = store.vectorize_selection().await;

    assert_eq!(vectorize.hits_async().await, 0);
    assert_eq!(state.phase, Phase::Failed);
    assert_eq!(state.error.map(|error| error.kind), Some(ErrorKind::InvalidRequest));
}
