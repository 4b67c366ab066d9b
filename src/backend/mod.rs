//! Dashboard backend integration.

pub mod client;
pub mod types;

pub use client::ApiClient;
pub use types::{
    ApiError, DEFAULT_TOP_K, DriveAuthorization, DriveStatus, SearchHit, SearchResponse,
};
