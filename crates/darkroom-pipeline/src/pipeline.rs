//! Pipeline wiring
//!
//! Builds the topic, queues, subscriptions, and consumer tasks:
//!
//! ```text
//! raw payload → normalizer → topic ──(eventName filter)──→ ingest queue → validator → store
//!                                 └──(attributeName filter)→ attribute updater (direct)
//! ingest queue ── bounded redelivery ──→ dead-letter queue → rejection mailer
//! store change stream ──(inserts only)──→ confirmation mailer
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use metrics::counter;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use darkroom_broker::{
    spawn_consumer, ConsumerConfig, ConsumerHandle, MessageHandler, Queue, QueueConfig,
    QueueStats, SubscriberId, Topic,
};
use darkroom_core::types::{AttributeName, ChangeKind, EventKind, PipelineEvent, Predicate};
use darkroom_core::{DarkroomConfig, Result};
use darkroom_metadata::MetadataRepository;

use crate::attribute::AttributeUpdateSubscriber;
use crate::ingest::IngestHandler;
use crate::mailer::{MailTransport, Notifier};
use crate::metrics::names;
use crate::normalizer;
use crate::validator::FormatPolicy;

/// The assembled ingestion pipeline
pub struct Pipeline {
    topic: Arc<Topic>,
    ingest_queue: Arc<Queue<PipelineEvent>>,
    dead_letter_queue: Arc<Queue<PipelineEvent>>,
    consumers: Vec<ConsumerHandle>,
    confirm_task: JoinHandle<()>,
}

impl Pipeline {
    /// Wire up and start the pipeline against the given collaborators
    pub fn start(
        config: &DarkroomConfig,
        repository: Arc<dyn MetadataRepository>,
        transport: Arc<dyn MailTransport>,
    ) -> Self {
        let accepted = config.pipeline.accepted_extensions.clone();
        let topic = Arc::new(Topic::new("object-events"));

        let queue_config = QueueConfig {
            max_receive_count: config.queue.max_receive_count,
            visibility_delay: config.queue.visibility_delay(),
            ..QueueConfig::default()
        };
        let dead_letter_queue = Queue::new("ingest-dlq", queue_config.clone());
        let ingest_queue =
            Queue::with_dead_letter("ingest", queue_config, Arc::clone(&dead_letter_queue));

        // Subscription filters: object events feed the ingest queue,
        // attribute changes feed the direct updater. Both are declarative
        // predicates, so further consumers can subscribe without touching
        // the producers.
        topic.subscribe_queue(
            Arc::clone(&ingest_queue),
            Some(Predicate::field_in(
                "eventName",
                [EventKind::Created.as_str(), EventKind::Removed.as_str()],
            )),
        );
        topic.subscribe(
            Arc::new(AttributeUpdateSubscriber::new(
                Arc::clone(&repository),
                config.pipeline.update_retry_attempts,
                config.pipeline.update_retry_delay(),
            )),
            Some(Predicate::field_in(
                "attributeName",
                AttributeName::ALL.iter().map(|name| name.as_str()),
            )),
        );

        let notifier = Arc::new(Notifier::new(
            transport,
            config.mail.from.clone(),
            config.mail.to.clone(),
            accepted.clone(),
        ));

        let consumer_config = ConsumerConfig {
            batch_size: config.queue.batch_size,
            max_batch_window: config.queue.max_batch_window(),
            processing_timeout: config.queue.processing_timeout(),
        };

        let consumers = vec![
            spawn_consumer(
                Arc::clone(&ingest_queue),
                Arc::new(IngestHandler::new(
                    Arc::clone(&repository),
                    FormatPolicy::new(accepted.clone()),
                )),
                consumer_config.clone(),
            ),
            spawn_consumer(
                Arc::clone(&dead_letter_queue),
                Arc::new(RejectionHandler {
                    notifier: Arc::clone(&notifier),
                    policy: FormatPolicy::new(accepted),
                }),
                consumer_config,
            ),
        ];

        let confirm_task = spawn_confirmation_task(repository.changes(), notifier);

        info!("pipeline started");
        Self {
            topic,
            ingest_queue,
            dead_letter_queue,
            consumers,
            confirm_task,
        }
    }

    /// Normalize a raw notification payload and publish every event.
    ///
    /// Returns the number of published events. Normalization failures are
    /// terminal: the caller logs and drops the payload, since retrying can
    /// never make it well-formed.
    pub async fn ingest_raw(&self, payload: &str) -> Result<usize> {
        counter!(names::EVENTS_RECEIVED_TOTAL).increment(1);

        let events = match normalizer::normalize(payload) {
            Ok(events) => events,
            Err(e) => {
                counter!(names::NORMALIZATION_FAILURES_TOTAL).increment(1);
                return Err(e);
            }
        };

        let count = events.len();
        for event in events {
            counter!(names::EVENTS_PUBLISHED_TOTAL).increment(1);
            self.topic.publish(PipelineEvent::Object(event)).await;
        }
        Ok(count)
    }

    /// Publish an already-normalized event
    pub async fn publish(&self, event: PipelineEvent) -> Vec<SubscriberId> {
        counter!(names::EVENTS_PUBLISHED_TOTAL).increment(1);
        self.topic.publish(event).await
    }

    pub fn ingest_queue_stats(&self) -> QueueStats {
        self.ingest_queue.stats()
    }

    pub fn dead_letter_queue_stats(&self) -> QueueStats {
        self.dead_letter_queue.stats()
    }

    /// Stop consumer loops and the confirmation task
    pub fn shutdown(&self) {
        for consumer in &self.consumers {
            consumer.stop();
        }
        self.confirm_task.abort();
        info!("pipeline stopped");
    }
}

/// Dead-letter consumer: the notifier in rejection mode.
///
/// Always succeeds from the queue's point of view. A failed rejection mail
/// is logged and dropped; it must never re-enqueue into dead-letter.
struct RejectionHandler {
    notifier: Arc<Notifier>,
    policy: FormatPolicy,
}

#[async_trait]
impl MessageHandler<PipelineEvent> for RejectionHandler {
    fn name(&self) -> &str {
        "rejection-notifier"
    }

    async fn handle(&self, event: &PipelineEvent) -> Result<()> {
        match event {
            PipelineEvent::Object(object_event) => {
                // Re-derive the reason deterministically from the key.
                let reason = match self.policy.validate(&object_event.key) {
                    Err(_) => "it is not an accepted image format",
                    Ok(()) => "processing failed repeatedly",
                };
                if let Err(e) = self.notifier.reject(object_event, reason).await {
                    warn!("rejection mail for {} failed: {}", object_event.key, e);
                }
            }
            PipelineEvent::Attribute(update) => {
                warn!("dead-lettered attribute update for {}; dropping", update.file_name);
            }
        }
        Ok(())
    }
}

fn spawn_confirmation_task(
    mut changes: broadcast::Receiver<darkroom_core::types::RecordChange>,
    notifier: Arc<Notifier>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match changes.recv().await {
                Ok(change) if change.kind == ChangeKind::Inserted => {
                    if let Err(e) = notifier.confirm(&change.record).await {
                        warn!(
                            "confirmation mail for {} failed: {}",
                            change.record.file_name, e
                        );
                    }
                }
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("confirmation stream lagged; skipped {} changes", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}
