//! Broker error types

use thiserror::Error;

/// Result type for broker operations
pub type BrokerResult<T> = Result<T, BrokerError>;

/// Broker-related errors
#[derive(Error, Debug)]
pub enum BrokerError {
    #[error("Queue is full: {0}")]
    QueueFull(String),

    #[error("Internal error: {0}")]
    Internal(String),
}
