//! Object event types
//!
//! Canonical events produced by the normalizer from raw blob-store
//! notifications, plus the envelope union routed through the topic.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

use super::AttributeUpdate;

/// Kind of object notification emitted by the blob store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    #[serde(rename = "ObjectCreated:Put")]
    Created,
    #[serde(rename = "ObjectRemoved:Delete")]
    Removed,
}

impl EventKind {
    /// Get the wire-format event name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "ObjectCreated:Put",
            Self::Removed => "ObjectRemoved:Delete",
        }
    }

    /// Parse a wire-format event name. Some emitters prefix the name with
    /// `s3:`; the prefix is accepted and stripped.
    pub fn parse(name: &str) -> Result<Self> {
        match name.strip_prefix("s3:").unwrap_or(name) {
            "ObjectCreated:Put" => Ok(Self::Created),
            "ObjectRemoved:Delete" => Ok(Self::Removed),
            other => Err(Error::UnknownEventName(other.to_string())),
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A normalized upload or removal event.
///
/// `key` is stored percent-decoded (`+` normalized to a space before
/// decoding) and is guaranteed non-empty by the normalizer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectEvent {
    pub kind: EventKind,
    pub bucket: String,
    pub key: String,
    pub event_time: DateTime<Utc>,
}

impl ObjectEvent {
    pub fn new(kind: EventKind, bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            kind,
            bucket: bucket.into(),
            key: key.into(),
            event_time: Utc::now(),
        }
    }

    /// Store path of the object ("s3://bucket/key")
    pub fn store_uri(&self) -> String {
        crate::utils::store_uri(&self.bucket, &self.key)
    }
}

/// Any event routed through the pipeline topic.
///
/// The envelope exposes named attributes (`eventName`, `bucket`, `key`,
/// `fileName`, `attributeName`) so subscription predicates can be evaluated
/// generically, without the router knowing the payload shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PipelineEvent {
    Object(ObjectEvent),
    Attribute(AttributeUpdate),
}

impl PipelineEvent {
    /// Look up a named envelope attribute for predicate evaluation
    pub fn attribute(&self, field: &str) -> Option<String> {
        match self {
            Self::Object(event) => match field {
                "eventName" => Some(event.kind.as_str().to_string()),
                "bucket" => Some(event.bucket.clone()),
                "key" => Some(event.key.clone()),
                _ => None,
            },
            Self::Attribute(update) => match field {
                "fileName" => Some(update.file_name.clone()),
                "attributeName" => Some(update.attribute.as_str().to_string()),
                _ => None,
            },
        }
    }
}

impl std::fmt::Display for PipelineEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Object(event) => {
                write!(f, "{} {}", event.kind, event.store_uri())
            }
            Self::Attribute(update) => {
                write!(f, "AttributeUpdate {}={} on {}", update.attribute, update.value, update.file_name)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AttributeName;

    #[test]
    fn test_event_kind_parse() {
        assert_eq!(EventKind::parse("ObjectCreated:Put").unwrap(), EventKind::Created);
        assert_eq!(EventKind::parse("s3:ObjectRemoved:Delete").unwrap(), EventKind::Removed);
        assert!(EventKind::parse("ObjectCreated:Copy").is_err());
    }

    #[test]
    fn test_event_kind_roundtrip() {
        let json = serde_json::to_string(&EventKind::Created).unwrap();
        assert_eq!(json, "\"ObjectCreated:Put\"");
        let back: EventKind = serde_json::from_str(&json).unwrap();
        assert_eq!(back, EventKind::Created);
    }

    #[test]
    fn test_object_event_attributes() {
        let event = PipelineEvent::Object(ObjectEvent::new(EventKind::Created, "photos", "sunset.png"));
        assert_eq!(event.attribute("eventName").as_deref(), Some("ObjectCreated:Put"));
        assert_eq!(event.attribute("bucket").as_deref(), Some("photos"));
        assert_eq!(event.attribute("key").as_deref(), Some("sunset.png"));
        assert_eq!(event.attribute("attributeName"), None);
    }

    #[test]
    fn test_attribute_event_attributes() {
        let event = PipelineEvent::Attribute(AttributeUpdate {
            file_name: "sunset.png".to_string(),
            attribute: AttributeName::Caption,
            value: "Sunset".to_string(),
        });
        assert_eq!(event.attribute("attributeName").as_deref(), Some("Caption"));
        assert_eq!(event.attribute("fileName").as_deref(), Some("sunset.png"));
        assert_eq!(event.attribute("eventName"), None);
    }
}
