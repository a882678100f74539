//! Error types for Darkroom

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    // Normalization Errors
    #[error("Notification payload has no Records list at any nesting level")]
    MalformedPayload,

    #[error("Notification record is missing required field: {0}")]
    MissingField(&'static str),

    #[error("Unrecognized event name: {0}")]
    UnknownEventName(String),

    #[error("Object key is empty after decoding")]
    EmptyObjectKey,

    #[error("Object key does not decode to valid UTF-8: {0}")]
    KeyDecode(String),

    #[error("Unknown metadata attribute: {0}")]
    UnknownAttribute(String),

    // Validation Outcomes
    #[error("Unsupported object format: {0}")]
    UnsupportedFormat(String),

    // Store Errors
    #[error("No metadata record for file: {0}")]
    RecordNotFound(String),

    #[error("Metadata store error: {0}")]
    Store(String),

    // Notification Errors
    #[error("Mail transport error: {0}")]
    Transport(String),

    // Configuration Errors
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // Internal Errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// Whether redelivery could ever succeed for this error.
    ///
    /// Normalization and validation failures are terminal per message: the
    /// payload can never become well-formed, and a key never grows a new
    /// suffix. Store and transport failures are transient and follow the
    /// bounded-redelivery path. Unclassified errors are treated as
    /// transient so an at-least-once consumer never silently drops them.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::MalformedPayload
            | Error::MissingField(_)
            | Error::UnknownEventName(_)
            | Error::EmptyObjectKey
            | Error::KeyDecode(_)
            | Error::UnknownAttribute(_)
            | Error::UnsupportedFormat(_)
            | Error::RecordNotFound(_)
            | Error::InvalidConfig(_)
            | Error::Json(_) => false,

            Error::Store(_)
            | Error::Transport(_)
            | Error::Internal(_)
            | Error::Io(_)
            | Error::Other(_) => true,
        }
    }

    /// Short reason string used in rejection notifications and logs.
    pub fn reason(&self) -> &'static str {
        match self {
            Error::MalformedPayload
            | Error::MissingField(_)
            | Error::UnknownEventName(_)
            | Error::EmptyObjectKey
            | Error::KeyDecode(_) => "MalformedPayload",
            Error::UnknownAttribute(_) => "UnknownAttribute",
            Error::UnsupportedFormat(_) => "UnsupportedFormat",
            Error::RecordNotFound(_) => "NotFound",
            Error::Store(_) => "StoreError",
            Error::Transport(_) => "TransportError",
            Error::InvalidConfig(_) => "InvalidConfig",
            Error::Json(_) => "MalformedPayload",
            Error::Internal(_) | Error::Io(_) | Error::Other(_) => "InternalError",
        }
    }
}
