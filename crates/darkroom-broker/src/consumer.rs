//! Batch consumer runner
//!
//! Pulls batches from a queue and settles every message independently:
//! success acks, transient failure nacks into the redelivery path,
//! terminal failure dead-letters immediately, and a handler exceeding the
//! processing budget counts as a transient failure. One failing message
//! never decides the fate of its batch siblings.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use parking_lot::RwLock;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::queue::{Delivery, Queue};

/// Per-message processing logic attached to a queue
#[async_trait]
pub trait MessageHandler<T>: Send + Sync {
    /// Handler name used in logs
    fn name(&self) -> &str;

    /// Process one message. A retryable error re-enters the redelivery
    /// path; a terminal error moves the message to the dead-letter queue.
    async fn handle(&self, body: &T) -> darkroom_core::Result<()>;
}

/// Consumer configuration
#[derive(Debug, Clone)]
pub struct ConsumerConfig {
    /// Maximum messages per batch
    pub batch_size: usize,
    /// Longest a partial batch is held before delivery
    pub max_batch_window: Duration,
    /// Per-message processing budget
    pub processing_timeout: Duration,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            batch_size: darkroom_core::DEFAULT_BATCH_SIZE,
            max_batch_window: Duration::from_secs(5),
            processing_timeout: Duration::from_secs(15),
        }
    }
}

/// Handle to a running consumer task
pub struct ConsumerHandle {
    shutdown: Arc<RwLock<bool>>,
    task: JoinHandle<()>,
}

impl ConsumerHandle {
    /// Signal the consumer to stop after its current batch
    pub fn stop(&self) {
        *self.shutdown.write() = true;
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

/// Spawn a consumer loop over `queue` driven by `handler`
pub fn spawn_consumer<T: Send + 'static>(
    queue: Arc<Queue<T>>,
    handler: Arc<dyn MessageHandler<T>>,
    config: ConsumerConfig,
) -> ConsumerHandle {
    let shutdown = Arc::new(RwLock::new(false));
    let shutdown_flag = Arc::clone(&shutdown);

    let task = tokio::spawn(async move {
        info!("consumer {} started on queue {}", handler.name(), queue.name());

        loop {
            if *shutdown_flag.read() {
                break;
            }

            let batch = queue.receive(config.batch_size, config.max_batch_window).await;
            if batch.is_empty() {
                continue;
            }

            join_all(batch.into_iter().map(|delivery| {
                process_one(&queue, &handler, delivery, config.processing_timeout)
            }))
            .await;
        }

        info!("consumer {} stopped", handler.name());
    });

    ConsumerHandle { shutdown, task }
}

async fn process_one<T: Send + 'static>(
    queue: &Arc<Queue<T>>,
    handler: &Arc<dyn MessageHandler<T>>,
    delivery: Delivery<T>,
    processing_timeout: Duration,
) {
    match tokio::time::timeout(processing_timeout, handler.handle(&delivery.body)).await {
        Ok(Ok(())) => queue.ack(delivery),
        Ok(Err(err)) if err.is_retryable() => {
            warn!(
                "consumer {} failed message {} (attempt {}): {}",
                handler.name(),
                delivery.message_id,
                delivery.receive_count,
                err
            );
            queue.nack(delivery);
        }
        Ok(Err(err)) => {
            warn!(
                "consumer {} rejected message {} terminally: {}",
                handler.name(),
                delivery.message_id,
                err
            );
            queue.dead_letter(delivery);
        }
        Err(_) => {
            warn!(
                "consumer {} exceeded {:?} on message {} (attempt {})",
                handler.name(),
                processing_timeout,
                delivery.message_id,
                delivery.receive_count
            );
            queue.nack(delivery);
        }
    }
}
