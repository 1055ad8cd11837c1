//! Error types for the model indexer repository.

mod search_error;

pub use search_error::SearchError;
