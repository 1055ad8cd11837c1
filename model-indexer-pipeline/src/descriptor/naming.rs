//! Index naming policies.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};

/// Prefix of the index a descriptor writes to when it does not set one.
/// Each record type gets its own index, `<prefix>-<document type>`.
pub const DEFAULT_INDEX_PREFIX: &str = "model_index";

/// Decides which index a record type should currently be written to.
///
/// Dynamic policies let the name change between calls; the registry then
/// creates the new index and keeps the old names in its history.
#[derive(Clone)]
pub enum IndexNamePolicy {
    /// Always the same index.
    Fixed(String),
    /// One index per UTC day, named `<prefix>-YYYY.MM.DD`.
    Daily { prefix: String },
    /// Any other rule.
    Custom(Arc<dyn Fn() -> String + Send + Sync>),
}

impl IndexNamePolicy {
    pub fn fixed(name: impl Into<String>) -> Self {
        Self::Fixed(name.into())
    }

    pub fn daily(prefix: impl Into<String>) -> Self {
        Self::Daily {
            prefix: prefix.into(),
        }
    }

    pub fn custom<F>(f: F) -> Self
    where
        F: Fn() -> String + Send + Sync + 'static,
    {
        Self::Custom(Arc::new(f))
    }

    /// The default policy of a record type with the given document type.
    pub fn for_document_type(document_type: &str) -> Self {
        Self::Fixed(format!(
            "{}-{}",
            DEFAULT_INDEX_PREFIX,
            document_type.to_lowercase()
        ))
    }

    /// The desired index name right now.
    pub fn resolve(&self) -> String {
        self.resolve_at(Utc::now())
    }

    /// The desired index name at `now`.
    pub fn resolve_at(&self, now: DateTime<Utc>) -> String {
        match self {
            Self::Fixed(name) => name.clone(),
            Self::Daily { prefix } => format!("{}-{}", prefix, now.format("%Y.%m.%d")),
            Self::Custom(f) => f(),
        }
    }
}

impl fmt::Debug for IndexNamePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fixed(name) => f.debug_tuple("Fixed").field(name).finish(),
            Self::Daily { prefix } => f.debug_struct("Daily").field("prefix", prefix).finish(),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_daily_policy_formats_date() {
        let now = Utc.with_ymd_and_hms(2026, 3, 7, 23, 59, 0).unwrap();
        assert_eq!(
            IndexNamePolicy::daily("events").resolve_at(now),
            "events-2026.03.07"
        );
    }

    #[test]
    fn test_fixed_and_default() {
        assert_eq!(IndexNamePolicy::fixed("books").resolve(), "books");
        assert_eq!(
            IndexNamePolicy::for_document_type("Book").resolve(),
            "model_index-book"
        );
    }

    #[test]
    fn test_custom_policy() {
        let policy = IndexNamePolicy::custom(|| "books-v2".to_string());
        assert_eq!(policy.resolve(), "books-v2");
    }
}
