//! Fan-out topic with declarative subscription predicates
//!
//! Every subscription carries an optional [`Predicate`] evaluated against
//! the event envelope. Delivery is fan-out, not routing: an event reaches
//! every matching subscriber, and zero matches is a normal outcome.
//!
//! Two target flavors exist. Queue-backed subscribers get the event
//! enqueued for asynchronous, batched consumption with delivery
//! guarantees. Direct subscribers are invoked inline; their failures are
//! logged and never affect the publish call or other subscribers.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::{debug, error, warn};
use uuid::Uuid;

use darkroom_core::types::{PipelineEvent, Predicate};

use crate::queue::Queue;

/// Identifier returned by `subscribe`
pub type SubscriberId = Uuid;

/// A synchronously-invoked topic subscriber
#[async_trait]
pub trait Subscriber: Send + Sync {
    /// Subscriber name used in logs
    fn name(&self) -> &str;

    async fn deliver(&self, event: &PipelineEvent) -> darkroom_core::Result<()>;
}

enum Target {
    Direct(Arc<dyn Subscriber>),
    Queue(Arc<Queue<PipelineEvent>>),
}

struct Subscription {
    id: SubscriberId,
    predicate: Option<Predicate>,
    target: Target,
}

impl Subscription {
    fn matches(&self, event: &PipelineEvent) -> bool {
        self.predicate
            .as_ref()
            .map_or(true, |predicate| predicate.matches(event))
    }
}

/// A named fan-out broker
pub struct Topic {
    name: String,
    subscriptions: RwLock<Vec<Subscription>>,
}

impl Topic {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            subscriptions: RwLock::new(Vec::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Attach a direct subscriber. `None` matches every event.
    pub fn subscribe(
        &self,
        subscriber: Arc<dyn Subscriber>,
        predicate: Option<Predicate>,
    ) -> SubscriberId {
        let id = Uuid::new_v4();
        debug!("topic {} subscribed {} ({})", self.name, subscriber.name(), id);
        self.subscriptions.write().push(Subscription {
            id,
            predicate,
            target: Target::Direct(subscriber),
        });
        id
    }

    /// Attach a queue-backed subscriber. `None` matches every event.
    pub fn subscribe_queue(
        &self,
        queue: Arc<Queue<PipelineEvent>>,
        predicate: Option<Predicate>,
    ) -> SubscriberId {
        let id = Uuid::new_v4();
        debug!("topic {} subscribed queue {} ({})", self.name, queue.name(), id);
        self.subscriptions.write().push(Subscription {
            id,
            predicate,
            target: Target::Queue(queue),
        });
        id
    }

    /// Remove a subscription. Returns whether it existed.
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        let mut subscriptions = self.subscriptions.write();
        let before = subscriptions.len();
        subscriptions.retain(|s| s.id != id);
        subscriptions.len() < before
    }

    /// Deliver `event` to every matching subscriber.
    ///
    /// Returns the IDs that matched. Direct-subscriber and enqueue
    /// failures are logged; they never fail the publish.
    pub async fn publish(&self, event: PipelineEvent) -> Vec<SubscriberId> {
        let targets: Vec<(SubscriberId, MatchedTarget)> = {
            let subscriptions = self.subscriptions.read();
            subscriptions
                .iter()
                .filter(|s| s.matches(&event))
                .map(|s| {
                    let target = match &s.target {
                        Target::Direct(subscriber) => MatchedTarget::Direct(Arc::clone(subscriber)),
                        Target::Queue(queue) => MatchedTarget::Queue(Arc::clone(queue)),
                    };
                    (s.id, target)
                })
                .collect()
        };

        if targets.is_empty() {
            debug!("topic {} had no subscribers for {}", self.name, event);
            return Vec::new();
        }

        let mut matched = Vec::with_capacity(targets.len());
        for (id, target) in targets {
            matched.push(id);
            match target {
                MatchedTarget::Queue(queue) => {
                    if let Err(e) = queue.send(event.clone()) {
                        error!("topic {} failed to enqueue onto {}: {}", self.name, queue.name(), e);
                    }
                }
                MatchedTarget::Direct(subscriber) => {
                    if let Err(e) = subscriber.deliver(&event).await {
                        warn!(
                            "topic {} direct delivery to {} failed: {}",
                            self.name,
                            subscriber.name(),
                            e
                        );
                    }
                }
            }
        }
        matched
    }
}

enum MatchedTarget {
    Direct(Arc<dyn Subscriber>),
    Queue(Arc<Queue<PipelineEvent>>),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::QueueConfig;
    use darkroom_core::types::{AttributeName, AttributeUpdate, EventKind, ObjectEvent};
    use darkroom_core::Error;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct CountingSubscriber {
        delivered: AtomicUsize,
        fail: bool,
    }

    impl CountingSubscriber {
        fn new(fail: bool) -> Arc<Self> {
            Arc::new(Self {
                delivered: AtomicUsize::new(0),
                fail,
            })
        }
    }

    #[async_trait]
    impl Subscriber for CountingSubscriber {
        fn name(&self) -> &str {
            "counting"
        }

        async fn deliver(&self, _event: &PipelineEvent) -> darkroom_core::Result<()> {
            self.delivered.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(Error::Internal("boom".to_string()));
            }
            Ok(())
        }
    }

    fn created(key: &str) -> PipelineEvent {
        PipelineEvent::Object(ObjectEvent::new(EventKind::Created, "photos", key))
    }

    fn caption_update(file: &str) -> PipelineEvent {
        PipelineEvent::Attribute(AttributeUpdate {
            file_name: file.to_string(),
            attribute: AttributeName::Caption,
            value: "Sunset".to_string(),
        })
    }

    #[test]
    fn test_unsubscribe() {
        let topic = Topic::new("events");
        let id = topic.subscribe(CountingSubscriber::new(false), None);
        assert!(topic.unsubscribe(id));
        assert!(!topic.unsubscribe(id));
    }

    #[tokio::test]
    async fn test_fan_out_to_matching_subscribers() {
        let topic = Topic::new("events");
        let object_sub = CountingSubscriber::new(false);
        let attribute_sub = CountingSubscriber::new(false);
        let all_sub = CountingSubscriber::new(false);

        topic.subscribe(
            object_sub.clone(),
            Some(Predicate::field_in(
                "eventName",
                ["ObjectCreated:Put", "ObjectRemoved:Delete"],
            )),
        );
        topic.subscribe(
            attribute_sub.clone(),
            Some(Predicate::field_in(
                "attributeName",
                ["Caption", "Date", "Photographer"],
            )),
        );
        topic.subscribe(all_sub.clone(), None);

        let matched = topic.publish(created("a.png")).await;
        assert_eq!(matched.len(), 2);
        assert_eq!(object_sub.delivered.load(Ordering::SeqCst), 1);
        assert_eq!(attribute_sub.delivered.load(Ordering::SeqCst), 0);
        assert_eq!(all_sub.delivered.load(Ordering::SeqCst), 1);

        let matched = topic.publish(caption_update("a.png")).await;
        assert_eq!(matched.len(), 2);
        assert_eq!(attribute_sub.delivered.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_zero_matches_is_normal() {
        let topic = Topic::new("events");
        topic.subscribe(
            CountingSubscriber::new(false),
            Some(Predicate::field_equals("eventName", "ObjectRemoved:Delete")),
        );

        let matched = topic.publish(created("a.png")).await;
        assert!(matched.is_empty());
    }

    #[tokio::test]
    async fn test_direct_failure_does_not_affect_publish() {
        let topic = Topic::new("events");
        let failing = CountingSubscriber::new(true);
        let healthy = CountingSubscriber::new(false);
        topic.subscribe(failing.clone(), None);
        topic.subscribe(healthy.clone(), None);

        let matched = topic.publish(created("a.png")).await;
        assert_eq!(matched.len(), 2);
        assert_eq!(healthy.delivered.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_queue_subscription_enqueues() {
        let topic = Topic::new("events");
        let queue = Queue::new("ingest", QueueConfig::default());
        topic.subscribe_queue(
            Arc::clone(&queue),
            Some(Predicate::field_in("eventName", ["ObjectCreated:Put"])),
        );

        topic.publish(created("a.png")).await;
        topic.publish(caption_update("a.png")).await;

        let batch = queue.receive(10, Duration::from_millis(10)).await;
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].body.attribute("key").as_deref(), Some("a.png"));
    }
}
