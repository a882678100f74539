//! At-least-once queue with dead-letter escalation
//!
//! Per-message state machine:
//!
//! ```text
//! Pending → Delivered(attempt n) → Acked                   (terminal)
//!                                → RedeliverPending(n+1) → Pending
//!                                → DeadLettered            (terminal)
//! ```
//!
//! A nacked message becomes visible again after the configured visibility
//! delay. Once its receive count reaches the configured bound, the next
//! failure moves it exactly once to the dead-letter queue instead. The
//! receive count is transport-layer bookkeeping; it is never persisted
//! with the message body.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use parking_lot::{Mutex, RwLock};
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::error::{BrokerError, BrokerResult};

/// Metric names
pub mod names {
    pub const QUEUE_SENT_TOTAL: &str = "darkroom_queue_messages_sent_total";
    pub const QUEUE_DELIVERED_TOTAL: &str = "darkroom_queue_messages_delivered_total";
    pub const QUEUE_ACKED_TOTAL: &str = "darkroom_queue_messages_acked_total";
    pub const QUEUE_REDELIVERED_TOTAL: &str = "darkroom_queue_messages_redelivered_total";
    pub const QUEUE_DEAD_LETTERED_TOTAL: &str = "darkroom_queue_messages_dead_lettered_total";
}

/// Queue configuration
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Receives before a failing message is dead-lettered
    pub max_receive_count: u32,
    /// Delay before a nacked message becomes visible again
    pub visibility_delay: Duration,
    /// Pending messages accepted before `send` fails
    pub capacity: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_receive_count: darkroom_core::DEFAULT_MAX_RECEIVE_COUNT,
            visibility_delay: Duration::from_millis(500),
            capacity: 10_000,
        }
    }
}

/// Queue statistics
#[derive(Debug, Clone, Default)]
pub struct QueueStats {
    /// Messages accepted by `send`
    pub sent: u64,
    /// Messages handed to consumers (redeliveries included)
    pub delivered: u64,
    /// Messages acknowledged
    pub acked: u64,
    /// Messages scheduled for redelivery
    pub redelivered: u64,
    /// Messages moved to the dead-letter queue
    pub dead_lettered: u64,
}

/// A message handed to a consumer.
///
/// Owning a delivery is the permission to settle it exactly once: `ack`,
/// `nack`, and `dead_letter` all consume it.
#[derive(Debug)]
pub struct Delivery<T> {
    pub message_id: Uuid,
    pub body: T,
    /// Times this message has been delivered, this delivery included
    pub receive_count: u32,
}

struct QueueMessage<T> {
    id: Uuid,
    body: T,
    receive_count: u32,
}

/// An in-process at-least-once delivery channel
pub struct Queue<T> {
    name: String,
    config: QueueConfig,
    pending: Mutex<VecDeque<QueueMessage<T>>>,
    notify: Notify,
    dead_letter: Option<Arc<Queue<T>>>,
    stats: RwLock<QueueStats>,
}

impl<T: Send + 'static> Queue<T> {
    /// Create a queue with no dead-letter target. Escalated messages are
    /// dropped with an error log.
    pub fn new(name: impl Into<String>, config: QueueConfig) -> Arc<Self> {
        Self::build(name, config, None)
    }

    /// Create a queue that escalates to `dead_letter`
    pub fn with_dead_letter(
        name: impl Into<String>,
        config: QueueConfig,
        dead_letter: Arc<Queue<T>>,
    ) -> Arc<Self> {
        Self::build(name, config, Some(dead_letter))
    }

    fn build(
        name: impl Into<String>,
        config: QueueConfig,
        dead_letter: Option<Arc<Queue<T>>>,
    ) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            config,
            pending: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
            dead_letter,
            stats: RwLock::new(QueueStats::default()),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current statistics snapshot
    pub fn stats(&self) -> QueueStats {
        self.stats.read().clone()
    }

    /// Number of messages currently visible
    pub fn pending_len(&self) -> usize {
        self.pending.lock().len()
    }

    /// Enqueue a message
    pub fn send(&self, body: T) -> BrokerResult<()> {
        {
            let mut pending = self.pending.lock();
            if pending.len() >= self.config.capacity {
                return Err(BrokerError::QueueFull(self.name.clone()));
            }
            pending.push_back(QueueMessage {
                id: Uuid::new_v4(),
                body,
                receive_count: 0,
            });
        }

        self.stats.write().sent += 1;
        counter!(names::QUEUE_SENT_TOTAL, "queue" => self.name.clone()).increment(1);
        self.notify.notify_one();
        Ok(())
    }

    /// Receive up to `max` messages, waiting up to `window` for the batch
    /// to fill.
    ///
    /// Returns as soon as `max` messages are collected; otherwise returns
    /// whatever arrived when the window closes (possibly nothing). Every
    /// returned message has its receive count already incremented.
    pub async fn receive(&self, max: usize, window: Duration) -> Vec<Delivery<T>> {
        let deadline = Instant::now() + window;
        let mut batch = Vec::new();

        loop {
            {
                let mut pending = self.pending.lock();
                while batch.len() < max {
                    match pending.pop_front() {
                        Some(mut message) => {
                            message.receive_count += 1;
                            batch.push(Delivery {
                                message_id: message.id,
                                receive_count: message.receive_count,
                                body: message.body,
                            });
                        }
                        None => break,
                    }
                }
            }

            if batch.len() >= max {
                break;
            }
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            let _ = tokio::time::timeout(deadline - now, self.notify.notified()).await;
        }

        if !batch.is_empty() {
            self.stats.write().delivered += batch.len() as u64;
            counter!(names::QUEUE_DELIVERED_TOTAL, "queue" => self.name.clone())
                .increment(batch.len() as u64);
        }
        batch
    }

    /// Acknowledge a delivery (terminal)
    pub fn ack(&self, delivery: Delivery<T>) {
        debug!("queue {} acked message {}", self.name, delivery.message_id);
        self.stats.write().acked += 1;
        counter!(names::QUEUE_ACKED_TOTAL, "queue" => self.name.clone()).increment(1);
    }

    /// Report a processing failure.
    ///
    /// Schedules redelivery after the visibility delay, or moves the
    /// message to the dead-letter queue once the receive bound is reached.
    pub fn nack(self: &Arc<Self>, delivery: Delivery<T>) {
        if delivery.receive_count >= self.config.max_receive_count {
            warn!(
                "queue {} message {} failed {} deliveries; escalating",
                self.name, delivery.message_id, delivery.receive_count
            );
            self.dead_letter(delivery);
            return;
        }

        debug!(
            "queue {} message {} redelivery scheduled (attempt {})",
            self.name, delivery.message_id, delivery.receive_count
        );
        self.stats.write().redelivered += 1;
        counter!(names::QUEUE_REDELIVERED_TOTAL, "queue" => self.name.clone()).increment(1);

        let queue = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(queue.config.visibility_delay).await;
            queue.requeue(delivery);
        });
    }

    /// Move a delivery to the dead-letter queue immediately (terminal).
    ///
    /// Used by `nack` once the receive bound is reached, and directly by
    /// consumers for failures that retrying can never fix.
    pub fn dead_letter(&self, delivery: Delivery<T>) {
        self.stats.write().dead_lettered += 1;
        counter!(names::QUEUE_DEAD_LETTERED_TOTAL, "queue" => self.name.clone()).increment(1);

        match &self.dead_letter {
            Some(dlq) => {
                if let Err(e) = dlq.send(delivery.body) {
                    error!(
                        "queue {} failed to dead-letter message {}: {}",
                        self.name, delivery.message_id, e
                    );
                }
            }
            None => {
                error!(
                    "queue {} has no dead-letter target; dropping message {}",
                    self.name, delivery.message_id
                );
            }
        }
    }

    fn requeue(&self, delivery: Delivery<T>) {
        self.pending.lock().push_back(QueueMessage {
            id: delivery.message_id,
            body: delivery.body,
            receive_count: delivery.receive_count,
        });
        self.notify.notify_one();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> QueueConfig {
        QueueConfig {
            max_receive_count: 3,
            visibility_delay: Duration::from_millis(20),
            capacity: 100,
        }
    }

    #[tokio::test]
    async fn test_send_receive_ack() {
        let queue: Arc<Queue<String>> = Queue::new("q", test_config());
        queue.send("hello".to_string()).unwrap();

        let mut batch = queue.receive(5, Duration::from_millis(10)).await;
        assert_eq!(batch.len(), 1);
        let delivery = batch.pop().unwrap();
        assert_eq!(delivery.body, "hello");
        assert_eq!(delivery.receive_count, 1);

        queue.ack(delivery);
        let stats = queue.stats();
        assert_eq!(stats.sent, 1);
        assert_eq!(stats.delivered, 1);
        assert_eq!(stats.acked, 1);
    }

    #[tokio::test]
    async fn test_receive_empty_when_window_closes() {
        let queue: Arc<Queue<String>> = Queue::new("q", test_config());
        let batch = queue.receive(5, Duration::from_millis(10)).await;
        assert!(batch.is_empty());
    }

    #[tokio::test]
    async fn test_receive_returns_early_when_batch_fills() {
        let queue: Arc<Queue<u32>> = Queue::new("q", test_config());
        for i in 0..3 {
            queue.send(i).unwrap();
        }

        let batch = queue.receive(3, Duration::from_secs(60)).await;
        assert_eq!(batch.len(), 3);
    }

    #[tokio::test]
    async fn test_nack_redelivers_after_visibility_delay() {
        let queue: Arc<Queue<String>> = Queue::new("q", test_config());
        queue.send("flaky".to_string()).unwrap();

        let delivery = queue.receive(1, Duration::from_millis(10)).await.pop().unwrap();
        queue.nack(delivery);

        // Not visible until the delay elapses.
        assert!(queue.receive(1, Duration::from_millis(1)).await.is_empty());

        let redelivered = queue.receive(1, Duration::from_millis(200)).await.pop().unwrap();
        assert_eq!(redelivered.body, "flaky");
        assert_eq!(redelivered.receive_count, 2);
    }

    #[tokio::test]
    async fn test_dead_letter_after_max_receives() {
        let dlq: Arc<Queue<String>> = Queue::new("dlq", test_config());
        let queue = Queue::with_dead_letter("q", test_config(), Arc::clone(&dlq));
        queue.send("poison".to_string()).unwrap();

        // Fail through all allowed receives.
        for attempt in 1..=3 {
            let delivery = queue.receive(1, Duration::from_millis(200)).await.pop().unwrap();
            assert_eq!(delivery.receive_count, attempt);
            queue.nack(delivery);
        }

        // Dead-lettered exactly once, never redelivered.
        let escalated = dlq.receive(1, Duration::from_millis(100)).await;
        assert_eq!(escalated.len(), 1);
        assert_eq!(escalated[0].body, "poison");
        assert!(queue.receive(1, Duration::from_millis(100)).await.is_empty());
        assert_eq!(queue.stats().dead_lettered, 1);
        assert_eq!(dlq.stats().sent, 1);
    }

    #[tokio::test]
    async fn test_direct_dead_letter_skips_redelivery() {
        let dlq: Arc<Queue<String>> = Queue::new("dlq", test_config());
        let queue = Queue::with_dead_letter("q", test_config(), Arc::clone(&dlq));
        queue.send("bad-format".to_string()).unwrap();

        let delivery = queue.receive(1, Duration::from_millis(10)).await.pop().unwrap();
        assert_eq!(delivery.receive_count, 1);
        queue.dead_letter(delivery);

        assert_eq!(dlq.pending_len(), 1);
        assert!(queue.receive(1, Duration::from_millis(50)).await.is_empty());
    }

    #[tokio::test]
    async fn test_capacity_bound() {
        let config = QueueConfig {
            capacity: 2,
            ..test_config()
        };
        let queue: Arc<Queue<u32>> = Queue::new("q", config);
        queue.send(1).unwrap();
        queue.send(2).unwrap();
        assert!(matches!(queue.send(3), Err(BrokerError::QueueFull(_))));
    }
}
