//! Change interceptor policies.
//!
//! The host application calls the interceptor around its own save and delete
//! events. The active [`SignalProcessor`] decides which saves reach the change
//! buffer; deletes always go straight to the engine.

use std::collections::HashSet;
use std::fmt;

use tracing::debug;

use crate::descriptor::IndexDescriptor;
use crate::errors::PipelineError;
use crate::record::{Record, RecordStore, RecordType};
use model_indexer_shared::DocumentId;

/// Tracked field used by the change-detecting policies when none is set.
pub const DEFAULT_TRACKED_FIELD: &str = "name";

/// Which saves are indexed.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SignalProcessor {
    /// Every create and update.
    #[default]
    Base,
    /// Creates, and updates whose record reports `field` as changed.
    HasChanged { field: String },
    /// Creates, and updates where `field` differs from the stored row
    /// fetched just before the save.
    PreSaved { field: String },
}

impl SignalProcessor {
    /// Parse a policy name (`base`, `has_changed`, `pre_saved`).
    pub fn from_name(name: &str, tracked_field: &str) -> Result<Self, PipelineError> {
        match name {
            "base" => Ok(Self::Base),
            "has_changed" => Ok(Self::HasChanged {
                field: tracked_field.to_string(),
            }),
            "pre_saved" => Ok(Self::PreSaved {
                field: tracked_field.to_string(),
            }),
            other => Err(PipelineError::configuration(format!(
                "Unknown signal processor {}",
                other
            ))),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Base => "base",
            Self::HasChanged { .. } => "has_changed",
            Self::PreSaved { .. } => "pre_saved",
        }
    }
}

impl fmt::Display for SignalProcessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Applies the active policy to save events of connected record types.
#[derive(Debug, Default)]
pub struct ChangeInterceptor {
    processor: SignalProcessor,
    connected: HashSet<String>,
    /// Records flagged for update by the pre-save comparison.
    flagged: HashSet<(String, DocumentId)>,
}

impl ChangeInterceptor {
    pub fn new(processor: SignalProcessor) -> Self {
        Self {
            processor,
            connected: HashSet::new(),
            flagged: HashSet::new(),
        }
    }

    pub fn processor(&self) -> &SignalProcessor {
        &self.processor
    }

    /// Start handling events of `record_type`.
    pub fn connect(&mut self, record_type: &RecordType) {
        self.connected.insert(record_type.name().to_string());
    }

    /// Stop handling events of `record_type`. Returns whether it was connected.
    pub fn disconnect(&mut self, record_type: &RecordType) -> bool {
        self.flagged.retain(|(name, _)| name != record_type.name());
        self.connected.remove(record_type.name())
    }

    pub fn is_connected(&self, record_type: &RecordType) -> bool {
        self.connected.contains(record_type.name())
    }

    /// Compare `record` with its stored row before it is saved.
    ///
    /// Only the `pre_saved` policy does any work here. New records, and
    /// records without an id, are left alone.
    pub async fn pre_save(
        &mut self,
        store: &dyn RecordStore,
        descriptor: &IndexDescriptor,
        record: &dyn Record,
    ) -> Result<(), PipelineError> {
        let SignalProcessor::PreSaved { field } = &self.processor else {
            return Ok(());
        };
        let Some(id) = descriptor.record_id(record) else {
            return Ok(());
        };

        let stored = store
            .fetch(descriptor.record_type(), &id, std::slice::from_ref(field))
            .await?;
        let changed =
            stored.is_some_and(|stored| stored.attribute(field) != record.attribute(field));

        // Each pre-save replaces the previous verdict, so a flag left by a
        // save that never completed does not leak into the next one.
        let key = (descriptor.record_type().name().to_string(), id);
        if changed {
            debug!(field = %field, id = %key.1, "Tracked field changed, flagging for update");
            self.flagged.insert(key);
        } else {
            self.flagged.remove(&key);
        }
        Ok(())
    }

    /// Whether a saved record should be buffered for indexing.
    pub fn should_index(
        &mut self,
        descriptor: &IndexDescriptor,
        record: &dyn Record,
        created: bool,
    ) -> bool {
        match &self.processor {
            SignalProcessor::Base => true,
            SignalProcessor::HasChanged { field } => {
                if created {
                    return true;
                }
                match record.changed_fields() {
                    Some(changed) => changed.iter().any(|f| f == field),
                    None => {
                        debug!(
                            record_type = %descriptor.record_type(),
                            "Record does not track changes, indexing update"
                        );
                        true
                    }
                }
            }
            SignalProcessor::PreSaved { .. } => {
                let flagged = descriptor
                    .record_id(record)
                    .map(|id| {
                        self.flagged
                            .remove(&(descriptor.record_type().name().to_string(), id))
                    })
                    .unwrap_or(false);
                created || flagged
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::FieldSpec;
    use crate::record::InMemoryRecordStore;
    use model_indexer_shared::SearchFieldType;
    use serde_json::{json, Map, Value};

    fn row(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    fn books() -> RecordType {
        RecordType::new("Book")
    }

    fn descriptor() -> IndexDescriptor {
        IndexDescriptor::builder()
            .field(FieldSpec::attribute("name", SearchFieldType::Text))
            .build(&books())
            .unwrap()
    }

    struct TrackedRecord {
        values: Map<String, Value>,
        changed: Vec<String>,
    }

    impl Record for TrackedRecord {
        fn attribute(&self, name: &str) -> Option<Value> {
            self.values.get(name).cloned()
        }

        fn changed_fields(&self) -> Option<Vec<String>> {
            Some(self.changed.clone())
        }
    }

    #[test]
    fn test_from_name() {
        assert_eq!(
            SignalProcessor::from_name("base", "name").unwrap(),
            SignalProcessor::Base
        );
        assert_eq!(
            SignalProcessor::from_name("pre_saved", "title").unwrap(),
            SignalProcessor::PreSaved {
                field: "title".to_string()
            }
        );
        assert!(SignalProcessor::from_name("celery", "name").is_err());
        assert_eq!(SignalProcessor::default().name(), "base");
    }

    #[test]
    fn test_base_indexes_every_save() {
        let mut interceptor = ChangeInterceptor::default();
        let record = row(json!({"pk": 1}));

        assert!(interceptor.should_index(&descriptor(), &record, false));
        assert!(interceptor.should_index(&descriptor(), &record, true));
    }

    #[test]
    fn test_has_changed_policy() {
        let mut interceptor = ChangeInterceptor::new(SignalProcessor::HasChanged {
            field: "name".to_string(),
        });
        let descriptor = descriptor();
        let unchanged = TrackedRecord {
            values: row(json!({"pk": 1, "name": "A"})),
            changed: vec!["pages".to_string()],
        };
        let renamed = TrackedRecord {
            values: row(json!({"pk": 1, "name": "B"})),
            changed: vec!["name".to_string()],
        };

        assert!(!interceptor.should_index(&descriptor, &unchanged, false));
        assert!(interceptor.should_index(&descriptor, &unchanged, true));
        assert!(interceptor.should_index(&descriptor, &renamed, false));
        // Plain records cannot report changes and are always indexed.
        assert!(interceptor.should_index(&descriptor, &row(json!({"pk": 1})), false));
    }

    #[tokio::test]
    async fn test_pre_saved_policy() {
        let store = InMemoryRecordStore::new();
        store
            .insert(&books(), 1i64, row(json!({"pk": 1, "name": "A"})))
            .await;
        let mut interceptor = ChangeInterceptor::new(SignalProcessor::PreSaved {
            field: "name".to_string(),
        });
        let descriptor = descriptor();

        let same = row(json!({"pk": 1, "name": "A", "pages": 2}));
        interceptor.pre_save(&store, &descriptor, &same).await.unwrap();
        assert!(!interceptor.should_index(&descriptor, &same, false));

        let renamed = row(json!({"pk": 1, "name": "B"}));
        interceptor.pre_save(&store, &descriptor, &renamed).await.unwrap();
        assert!(interceptor.should_index(&descriptor, &renamed, false));
        // The flag is consumed by the save it belongs to.
        assert!(!interceptor.should_index(&descriptor, &renamed, false));

        let new = row(json!({"pk": 2, "name": "C"}));
        interceptor.pre_save(&store, &descriptor, &new).await.unwrap();
        assert!(interceptor.should_index(&descriptor, &new, true));
    }

    #[tokio::test]
    async fn test_unchanged_pre_save_clears_abandoned_flag() {
        let store = InMemoryRecordStore::new();
        store
            .insert(&books(), 1i64, row(json!({"pk": 1, "name": "A"})))
            .await;
        let mut interceptor = ChangeInterceptor::new(SignalProcessor::PreSaved {
            field: "name".to_string(),
        });
        let descriptor = descriptor();

        // The host's save of this rename failed, so no post-save follows.
        let renamed = row(json!({"pk": 1, "name": "B"}));
        interceptor.pre_save(&store, &descriptor, &renamed).await.unwrap();

        let unchanged = row(json!({"pk": 1, "name": "A", "pages": 5}));
        interceptor.pre_save(&store, &descriptor, &unchanged).await.unwrap();

        assert!(!interceptor.should_index(&descriptor, &unchanged, false));
        assert!(interceptor.flagged.is_empty());
    }

    #[test]
    fn test_connect_disconnect() {
        let mut interceptor = ChangeInterceptor::default();

        interceptor.connect(&books());
        assert!(interceptor.is_connected(&books()));

        assert!(interceptor.disconnect(&books()));
        assert!(!interceptor.is_connected(&books()));
        assert!(!interceptor.disconnect(&books()));
    }
}
