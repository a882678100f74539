//! Attribute-update subscriber
//!
//! Applies single-attribute changes to existing records via direct topic
//! delivery. A missing base record is a legitimate outcome: the record may
//! still be in flight on the ingest path, since same-key ordering between
//! the two branches is not guaranteed. Policy: retry a bounded number of
//! times with a growing delay, then drop the update with a warning.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use darkroom_broker::Subscriber;
use darkroom_core::types::PipelineEvent;
use darkroom_core::{Error, Result};
use darkroom_metadata::MetadataRepository;

/// Direct subscriber applying conditional attribute updates
pub struct AttributeUpdateSubscriber {
    repository: Arc<dyn MetadataRepository>,
    retry_attempts: u32,
    retry_delay: Duration,
}

impl AttributeUpdateSubscriber {
    pub fn new(
        repository: Arc<dyn MetadataRepository>,
        retry_attempts: u32,
        retry_delay: Duration,
    ) -> Self {
        Self {
            repository,
            retry_attempts,
            retry_delay,
        }
    }
}

#[async_trait]
impl Subscriber for AttributeUpdateSubscriber {
    fn name(&self) -> &str {
        "attribute-update"
    }

    async fn deliver(&self, event: &PipelineEvent) -> Result<()> {
        let update = match event {
            PipelineEvent::Attribute(update) => update,
            PipelineEvent::Object(_) => return Ok(()),
        };

        let mut attempts = 0;
        loop {
            attempts += 1;
            match self
                .repository
                .update(&update.file_name, update.attribute, &update.value)
                .await
            {
                Ok(()) => {
                    debug!("applied {}={} to {}", update.attribute, update.value, update.file_name);
                    return Ok(());
                }
                Err(Error::RecordNotFound(_)) if attempts < self.retry_attempts => {
                    debug!(
                        "no record yet for {} (attempt {}); retrying",
                        update.file_name, attempts
                    );
                    tokio::time::sleep(self.retry_delay * attempts).await;
                }
                Err(Error::RecordNotFound(_)) => {
                    warn!(
                        "dropping {} update for {}: no record after {} attempts",
                        update.attribute, update.file_name, attempts
                    );
                    return Ok(());
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use darkroom_core::types::{AttributeName, AttributeUpdate};
    use darkroom_metadata::MemoryRepository;

    fn caption_update(file: &str) -> PipelineEvent {
        PipelineEvent::Attribute(AttributeUpdate {
            file_name: file.to_string(),
            attribute: AttributeName::Caption,
            value: "Sunset".to_string(),
        })
    }

    #[tokio::test]
    async fn test_update_applies_to_existing_record() {
        let repository = Arc::new(MemoryRepository::new());
        repository.put("photo.png", "b").await.unwrap();

        let subscriber = AttributeUpdateSubscriber::new(repository.clone(), 3, Duration::from_millis(10));
        subscriber.deliver(&caption_update("photo.png")).await.unwrap();

        let record = repository.get("photo.png").await.unwrap().unwrap();
        assert_eq!(
            record.attributes.get(&AttributeName::Caption).map(String::as_str),
            Some("Sunset")
        );
    }

    #[tokio::test]
    async fn test_update_waits_for_in_flight_record() {
        let repository = Arc::new(MemoryRepository::new());
        let subscriber = AttributeUpdateSubscriber::new(repository.clone(), 5, Duration::from_millis(20));

        // The base record lands while the subscriber is retrying.
        let writer = {
            let repository = repository.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                repository.put("photo.png", "b").await.unwrap();
            })
        };

        subscriber.deliver(&caption_update("photo.png")).await.unwrap();
        writer.await.unwrap();

        let record = repository.get("photo.png").await.unwrap().unwrap();
        assert!(record.attributes.contains_key(&AttributeName::Caption));
    }

    #[tokio::test]
    async fn test_update_for_absent_record_is_dropped() {
        let repository = Arc::new(MemoryRepository::new());
        let subscriber = AttributeUpdateSubscriber::new(repository.clone(), 2, Duration::from_millis(5));

        subscriber.deliver(&caption_update("nowhere.png")).await.unwrap();
        assert!(repository.get("nowhere.png").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_object_events_are_ignored() {
        use darkroom_core::types::{EventKind, ObjectEvent};

        let repository = Arc::new(MemoryRepository::new());
        let subscriber = AttributeUpdateSubscriber::new(repository, 2, Duration::from_millis(5));

        let event = PipelineEvent::Object(ObjectEvent::new(EventKind::Created, "b", "photo.png"));
        subscriber.deliver(&event).await.unwrap();
    }
}
