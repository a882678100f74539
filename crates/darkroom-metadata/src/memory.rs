//! In-memory metadata repository
//!
//! Backs tests and single-process development runs. State lives in a
//! `HashMap` behind a `parking_lot` lock; the change stream is a tokio
//! broadcast channel fed after each successful mutation.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::sync::broadcast;
use tracing::debug;

use darkroom_core::types::{AttributeName, ChangeKind, MetadataRecord, RecordChange};
use darkroom_core::{Error, Result};

use crate::traits::{MetadataRepository, CHANGE_STREAM_CAPACITY};

/// In-memory implementation of [`MetadataRepository`]
pub struct MemoryRepository {
    records: RwLock<HashMap<String, MetadataRecord>>,
    changes: broadcast::Sender<RecordChange>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_STREAM_CAPACITY);
        Self {
            records: RwLock::new(HashMap::new()),
            changes,
        }
    }

    /// Number of stored records
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    fn publish(&self, kind: ChangeKind, record: MetadataRecord) {
        // No receivers is fine; the stream is best-effort.
        let _ = self.changes.send(RecordChange { kind, record });
    }
}

impl Default for MemoryRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MetadataRepository for MemoryRepository {
    async fn put(&self, file_name: &str, bucket: &str) -> Result<()> {
        let record = MetadataRecord::new(file_name, bucket);
        let existed = {
            let mut records = self.records.write();
            records.insert(file_name.to_string(), record.clone()).is_some()
        };

        let kind = if existed {
            ChangeKind::Modified
        } else {
            ChangeKind::Inserted
        };
        debug!("put record {} ({})", file_name, kind.as_str());
        self.publish(kind, record);
        Ok(())
    }

    async fn update(&self, file_name: &str, attribute: AttributeName, value: &str) -> Result<()> {
        let record = {
            let mut records = self.records.write();
            let record = records
                .get_mut(file_name)
                .ok_or_else(|| Error::RecordNotFound(file_name.to_string()))?;
            record.attributes.insert(attribute, value.to_string());
            record.clone()
        };

        debug!("set {}={} on {}", attribute, value, file_name);
        self.publish(ChangeKind::Modified, record);
        Ok(())
    }

    async fn delete(&self, file_name: &str) -> Result<()> {
        let removed = self.records.write().remove(file_name);

        if let Some(record) = removed {
            debug!("deleted record {}", file_name);
            self.publish(ChangeKind::Removed, record);
        }
        Ok(())
    }

    async fn get(&self, file_name: &str) -> Result<Option<MetadataRecord>> {
        Ok(self.records.read().get(file_name).cloned())
    }

    fn changes(&self) -> broadcast::Receiver<RecordChange> {
        self.changes.subscribe()
    }
}
