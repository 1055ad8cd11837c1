//! OpenSearch implementation of the search backend.
//!
//! This module provides a concrete implementation of `SearchBackend`
//! using OpenSearch, plus the index body and mapping helpers it shares with
//! other backends.

mod client;
mod index_config;

pub use client::OpenSearchBackend;
pub use index_config::{build_index_body, mapping_conflicts, mapping_properties};
