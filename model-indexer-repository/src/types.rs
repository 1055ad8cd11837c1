//! Response types for search backend operations.

/// Outcome of an index creation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexCreation {
    /// The index did not exist and was created.
    Created,
    /// The index already existed with a compatible mapping.
    AlreadyExists,
}

/// Summary of a bulk request that the backend accepted in full.
///
/// A request with any rejected document is reported as
/// `SearchError::BulkOperationError` instead.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BulkSummary {
    /// Total number of operations submitted.
    pub total: usize,
    /// Number of index operations applied.
    pub indexed: usize,
    /// Number of delete operations applied, including deletes of absent documents.
    pub deleted: usize,
}
