//! Ingest consumer
//!
//! Handles object events delivered through the ingest queue: accepted
//! uploads become metadata records, removals delete them. Validation
//! rejections are terminal and surface to the caller, which moves the
//! message to the dead-letter path; store failures are transient and
//! re-enter the redelivery path.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use darkroom_broker::MessageHandler;
use darkroom_core::types::{EventKind, PipelineEvent};
use darkroom_core::Result;
use darkroom_metadata::MetadataRepository;

use crate::validator::FormatPolicy;

/// Queue consumer recording accepted uploads and removals
pub struct IngestHandler {
    repository: Arc<dyn MetadataRepository>,
    policy: FormatPolicy,
}

impl IngestHandler {
    pub fn new(repository: Arc<dyn MetadataRepository>, policy: FormatPolicy) -> Self {
        Self { repository, policy }
    }
}

#[async_trait]
impl MessageHandler<PipelineEvent> for IngestHandler {
    fn name(&self) -> &str {
        "ingest"
    }

    async fn handle(&self, event: &PipelineEvent) -> Result<()> {
        match event {
            PipelineEvent::Object(object_event) => match object_event.kind {
                EventKind::Created => {
                    self.policy.validate(&object_event.key)?;
                    self.repository
                        .put(&object_event.key, &object_event.bucket)
                        .await?;
                    info!("recorded upload {}", object_event.store_uri());
                    Ok(())
                }
                EventKind::Removed => {
                    self.repository.delete(&object_event.key).await?;
                    info!("removed record for {}", object_event.key);
                    Ok(())
                }
            },
            PipelineEvent::Attribute(update) => {
                // The subscription filter keeps attribute updates off this
                // queue; tolerate strays rather than redelivering them.
                warn!("ingest received attribute update for {}; ignoring", update.file_name);
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use darkroom_core::types::ObjectEvent;
    use darkroom_core::Error;
    use darkroom_metadata::MemoryRepository;

    fn handler(repository: Arc<MemoryRepository>) -> IngestHandler {
        IngestHandler::new(repository, FormatPolicy::default())
    }

    #[tokio::test]
    async fn test_accepted_upload_is_recorded() {
        let repository = Arc::new(MemoryRepository::new());
        let handler = handler(repository.clone());

        let event = PipelineEvent::Object(ObjectEvent::new(EventKind::Created, "b", "photo.png"));
        handler.handle(&event).await.unwrap();

        let record = repository.get("photo.png").await.unwrap().unwrap();
        assert_eq!(record.bucket, "b");
    }

    #[tokio::test]
    async fn test_unsupported_format_is_terminal() {
        let repository = Arc::new(MemoryRepository::new());
        let handler = handler(repository.clone());

        let event = PipelineEvent::Object(ObjectEvent::new(EventKind::Created, "b", "doc.pdf"));
        let err = handler.handle(&event).await.unwrap_err();

        assert!(matches!(err, Error::UnsupportedFormat(_)));
        assert!(!err.is_retryable());
        assert!(repository.get("doc.pdf").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_removal_deletes_record() {
        let repository = Arc::new(MemoryRepository::new());
        let handler = handler(repository.clone());

        repository.put("old.png", "b").await.unwrap();
        let event = PipelineEvent::Object(ObjectEvent::new(EventKind::Removed, "b", "old.png"));
        handler.handle(&event).await.unwrap();

        assert!(repository.get("old.png").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_removal_of_absent_record_succeeds() {
        let repository = Arc::new(MemoryRepository::new());
        let handler = handler(repository);

        let event = PipelineEvent::Object(ObjectEvent::new(EventKind::Removed, "b", "never.png"));
        handler.handle(&event).await.unwrap();
    }
}
