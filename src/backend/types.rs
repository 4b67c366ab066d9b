//! Shared types used by the backend client.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::workflow::{Document, SourceKind, StorageSink};

/// Normalized failure shape for every backend call.
///
/// Transport errors, non-2xx responses, and undecodable bodies all collapse into this single
/// structure before reaching the workflow.
#[derive(Debug, Clone, PartialEq, Error, Serialize)]
#[error("{message}")]
pub struct ApiError {
    /// Human-readable description.
    pub message: String,
    /// HTTP status, when a response was received.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    /// Response body, when one was received and parsed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ApiError {
    /// Build an error that never reached the backend or carried no response.
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status: None,
            data: None,
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        Self {
            message: err.to_string(),
            status: err.status().map(|status| status.as_u16()),
            data: None,
        }
    }
}

/// Connection status of the remote drive integration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriveStatus {
    /// Whether the backend holds valid drive credentials.
    #[serde(default)]
    pub connected: bool,
    /// Remaining response fields.
    #[serde(default, flatten)]
    pub extra: Map<String, Value>,
}

/// Authorization hand-off returned when connecting the remote drive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriveAuthorization {
    /// URL the operator must visit to grant access.
    #[serde(alias = "url", alias = "auth_url")]
    pub authorization_url: String,
}

/// Number of hits requested when the caller does not choose one.
pub const DEFAULT_TOP_K: usize = 5;

/// Request body for `POST /search`.
#[derive(Serialize)]
pub(crate) struct SearchBody<'a> {
    pub(crate) query: &'a str,
    pub(crate) top_k: usize,
    pub(crate) supabase_table: &'a str,
}

/// One similarity hit returned by `POST /search`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    /// Matched text fragment.
    pub text: String,
    /// Similarity between the query and the fragment, higher is closer.
    pub similarity_score: f64,
    /// Document the fragment was vectorized from.
    pub document_id: String,
}

/// Response body for `POST /search`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    /// Query echoed by the backend.
    pub query: String,
    /// Hits ordered by decreasing similarity.
    #[serde(default)]
    pub results: Vec<SearchHit>,
}

/// Request body for `POST /vectorize`.
#[derive(Serialize)]
pub(crate) struct VectorizeBody<'a> {
    pub(crate) files: &'a [Document],
    pub(crate) table: &'a str,
}

const LISTING_KEYS: [&str; 5] = ["files", "documents", "tables", "items", "data"];

/// Extract the list of entries from a listing response.
///
/// Accepts a bare array or an object wrapping the array under a conventional key.
pub(crate) fn listing_entries(body: Value) -> Result<Vec<Value>, ApiError> {
    match body {
        Value::Array(entries) => Ok(entries),
        Value::Object(mut map) => LISTING_KEYS
            .iter()
            .find_map(|key| match map.remove(*key) {
                Some(Value::Array(entries)) => Some(entries),
                _ => None,
            })
            .ok_or_else(|| ApiError {
                message: "Listing response did not contain an array".into(),
                status: None,
                data: Some(Value::Object(map)),
            }),
        other => Err(ApiError {
            message: "Listing response did not contain an array".into(),
            status: None,
            data: Some(other),
        }),
    }
}

/// Map a drive listing entry to a document, skipping entries without an identifier.
pub(crate) fn document_from_entry(entry: Value, source: SourceKind) -> Option<Document> {
    let object = entry.as_object()?;
    let id = ["id", "document_id", "file_id"]
        .iter()
        .find_map(|key| object.get(*key).and_then(stringify_id))?;
    let name = ["name", "title", "filename"]
        .iter()
        .find_map(|key| object.get(*key).and_then(Value::as_str))
        .map(str::to_string)
        .unwrap_or_else(|| id.clone());

    Some(Document {
        id,
        name,
        source,
        raw: entry,
    })
}

/// Map a sink listing entry (bare name or object) to a storage sink.
pub(crate) fn sink_from_entry(entry: Value) -> Option<StorageSink> {
    match entry {
        Value::String(name) if !name.trim().is_empty() => Some(StorageSink::named(name)),
        Value::Object(mut map) => {
            let name = ["name", "table_name", "table"]
                .iter()
                .find_map(|key| match map.remove(*key) {
                    Some(Value::String(name)) if !name.trim().is_empty() => Some(name),
                    _ => None,
                })?;
            Some(StorageSink {
                name,
                metadata: map,
            })
        }
        _ => None,
    }
}

/// Derive a human-readable message from an error response body.
pub(crate) fn error_message(status: u16, data: Option<&Value>) -> String {
    data.and_then(|value| {
        ["detail", "message", "error"]
            .iter()
            .find_map(|key| value.get(*key).and_then(Value::as_str))
    })
    .map(str::to_string)
    .unwrap_or_else(|| format!("Request failed with status code {status}"))
}

fn stringify_id(value: &Value) -> Option<String> {
    match value {
        Value::String(text) if !text.is_empty() => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn listing_accepts_bare_and_wrapped_arrays() {
        assert_eq!(listing_entries(json!([1, 2])).expect("bare").len(), 2);
        assert_eq!(
            listing_entries(json!({ "documents": [{ "document_id": "doc_123" }] }))
                .expect("wrapped")
                .len(),
            1
        );
        let err = listing_entries(json!({ "status": "ok" })).expect_err("no array");
        assert_eq!(err.data, Some(json!({ "status": "ok" })));
    }

    #[test]
    fn document_entries_fall_back_to_alternate_keys() {
        let document = document_from_entry(
            json!({ "document_id": "doc_123", "title": "Company Handbook", "size": 1024 }),
            SourceKind::RemoteDrive,
        )
        .expect("document");
        assert_eq!(document.id, "doc_123");
        assert_eq!(document.name, "Company Handbook");
        assert_eq!(document.raw["size"], 1024);

        let numeric = document_from_entry(json!({ "id": 7 }), SourceKind::RemoteDrive)
            .expect("numeric id");
        assert_eq!(numeric.id, "7");
        assert_eq!(numeric.name, "7");

        assert!(document_from_entry(json!({ "name": "orphan" }), SourceKind::RemoteDrive).is_none());
    }

    #[test]
    fn sink_entries_accept_names_and_objects() {
        assert_eq!(
            sink_from_entry(json!("documents")),
            Some(StorageSink::named("documents"))
        );
        let sink = sink_from_entry(json!({ "table_name": "faq", "rows": 12 })).expect("sink");
        assert_eq!(sink.name, "faq");
        assert_eq!(sink.metadata["rows"], 12);
        assert!(sink_from_entry(json!(42)).is_none());
    }

    #[test]
    fn error_message_prefers_body_detail() {
        assert_eq!(
            error_message(422, Some(&json!({ "detail": "table missing" }))),
            "table missing"
        );
        assert_eq!(
            error_message(502, None),
            "Request failed with status code 502"
        );
    }
}
