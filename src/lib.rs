#![deny(missing_docs)]

//! Core library for the knowledge base ingestion workflow.

/// HTTP control surface exposing the workflow store.
pub mod api;
/// Dashboard backend HTTP client.
pub mod backend;
/// Environment-driven configuration management.
pub mod config;
/// Structured logging and tracing setup.
pub mod logging;
/// Workflow activity counters.
pub mod metrics;
/// Ingestion workflow state and collaborators.
pub mod workflow;
