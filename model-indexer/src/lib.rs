//! # Model Indexer
//!
//! Mirrors changes to application records into search index documents.
//!
//! This crate wires the pipeline to an OpenSearch backend from environment
//! settings and sets up tracing. Host applications build [`Dependencies`] at
//! startup, register their record types on the contained
//! [`ModelIndexer`](model_indexer_pipeline::ModelIndexer) and call its hooks
//! around their own save and delete events.

pub mod config;
pub mod telemetry;

pub use config::{Dependencies, IndexerSettings, LogFormat};

use thiserror::Error;

/// Errors that can occur while setting up or running the indexer.
#[derive(Error, Debug)]
pub enum IndexerError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Pipeline error.
    #[error("Pipeline error: {0}")]
    PipelineError(#[from] model_indexer_pipeline::PipelineError),

    /// Search error.
    #[error("Search error: {0}")]
    SearchError(#[from] model_indexer_repository::SearchError),
}

impl IndexerError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }
}
