//! # Model Indexer Repository
//!
//! This crate provides the trait the sync pipeline writes through and its
//! implementations. It includes definitions for errors, the `SearchBackend`
//! interface, a concrete implementation for OpenSearch, and an in-memory
//! backend for tests.

pub mod config;
pub mod errors;
pub mod interfaces;
pub mod memory;
pub mod opensearch;
pub mod types;

pub use config::BackendConfig;
pub use errors::SearchError;
pub use interfaces::SearchBackend;
pub use memory::InMemoryBackend;
pub use opensearch::OpenSearchBackend;
pub use types::{BulkSummary, IndexCreation};
