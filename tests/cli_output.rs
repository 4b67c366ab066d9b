use std::process::Command;

use httpmock::{Method::POST, MockServer};
use serde_json::{Value, json};

#[test]
fn search_prints_only_json_on_stdout() {
    let server = MockServer::start();
    let search = server.mock(|when, then| {
        when.method(POST).path("/search").json_body(json!({
            "query": "refund policy",
            "top_k": 2,
            "supabase_table": "kb_vectors"
        }));
        then.status(200).json_body(json!({
            "query": "refund policy",
            "results": [
                { "text": "Refunds within 30 days.", "similarity_score": 0.91, "document_id": "doc_7" }
            ]
        }));
    });
    let log_file = std::env::temp_dir().join(format!("kbflow-cli-{}.log", uuid::Uuid::new_v4()));

    let output = Command::new(env!("CARGO_BIN_EXE_kbflow"))
        .args(["search", "--table", "kb_vectors", "--query", "refund policy", "--top-k", "2"])
        .env("KBFLOW_API_URL", server.base_url())
        .env("KBFLOW_LOG_FILE", &log_file)
        .env("RUST_LOG", "debug")
        .output()
        .expect("run kbflow");

    search.assert();
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let printed: Value = serde_json::from_slice(&output.stdout).expect("stdout is pure JSON");
    assert_eq!(printed["results"][0]["document_id"], "doc_7");
    assert!(String::from_utf8_lossy(&output.stderr).contains("Initialized backend HTTP client"));

    std::fs::remove_file(&log_file).ok();
}
