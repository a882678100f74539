//! Darkroom Broker - Event routing and delivery guarantees
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Darkroom Broker                          │
//! ├─────────────────────────────────────────────────────────────┤
//! │                                                             │
//! │  ┌───────────────┐  ┌───────────────┐  ┌───────────────┐   │
//! │  │     Topic     │  │     Queue     │  │   Consumer    │   │
//! │  │               │  │               │  │               │   │
//! │  │ - Predicates  │  │ - At-least-   │  │ - Batches     │   │
//! │  │ - Fan-out     │  │   once        │  │ - Per-message │   │
//! │  │ - Direct +    │  │ - Redelivery  │  │   outcomes    │   │
//! │  │   queue subs  │  │ - Dead-letter │  │ - Timeouts    │   │
//! │  └───────┬───────┘  └───────┬───────┘  └───────┬───────┘   │
//! │          │                  │                  │           │
//! │          └──────────────────┴──────────────────┘           │
//! │                                                             │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Features
//!
//! - **Declarative routing**: subscribers attach serializable predicates;
//!   the topic evaluates them generically and fans out to every match
//! - **At-least-once delivery**: failed messages reappear after a
//!   visibility delay with an incremented receive count
//! - **Bounded escalation**: messages exceeding the receive bound move
//!   exactly once to a dead-letter queue
//! - **Partial-batch isolation**: one failed message never swallows its
//!   batch siblings

mod consumer;
mod error;
mod queue;
mod topic;

pub use consumer::{spawn_consumer, ConsumerConfig, ConsumerHandle, MessageHandler};
pub use error::{BrokerError, BrokerResult};
pub use queue::{Delivery, Queue, QueueConfig, QueueStats};
pub use topic::{Subscriber, SubscriberId, Topic};
