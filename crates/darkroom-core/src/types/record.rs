//! Metadata record types

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Attribute names accepted on a metadata record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttributeName {
    Caption,
    Date,
    Photographer,
}

impl AttributeName {
    /// All accepted attribute names, in declaration order
    pub const ALL: [AttributeName; 3] = [Self::Caption, Self::Date, Self::Photographer];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Caption => "Caption",
            Self::Date => "Date",
            Self::Photographer => "Photographer",
        }
    }

    pub fn parse(name: &str) -> Result<Self> {
        match name {
            "Caption" => Ok(Self::Caption),
            "Date" => Ok(Self::Date),
            "Photographer" => Ok(Self::Photographer),
            other => Err(Error::UnknownAttribute(other.to_string())),
        }
    }
}

impl std::fmt::Display for AttributeName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A stored metadata record, keyed by decoded object key.
///
/// Created by the first accepted `Created` event, enriched by attribute
/// updates, removed when the object is removed. The origin bucket is kept
/// on the record so the confirmation notifier can render the store path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataRecord {
    pub file_name: String,
    pub bucket: String,
    pub attributes: HashMap<AttributeName, String>,
    pub created_at: DateTime<Utc>,
}

impl MetadataRecord {
    pub fn new(file_name: impl Into<String>, bucket: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            bucket: bucket.into(),
            attributes: HashMap::new(),
            created_at: Utc::now(),
        }
    }

    /// Store path of the recorded object ("s3://bucket/key")
    pub fn store_uri(&self) -> String {
        crate::utils::store_uri(&self.bucket, &self.file_name)
    }
}

/// A single-attribute change request against an existing record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeUpdate {
    pub file_name: String,
    #[serde(rename = "attributeName")]
    pub attribute: AttributeName,
    pub value: String,
}

/// Kind of change observed on the metadata store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeKind {
    /// A previously-absent key gained a record
    Inserted,
    /// An existing record was replaced or had an attribute set
    Modified,
    /// A record was deleted
    Removed,
}

impl ChangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Inserted => "INSERT",
            Self::Modified => "MODIFY",
            Self::Removed => "REMOVE",
        }
    }
}

/// An item on the metadata store change stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordChange {
    pub kind: ChangeKind,
    pub record: MetadataRecord,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attribute_name_parse() {
        assert_eq!(AttributeName::parse("Caption").unwrap(), AttributeName::Caption);
        assert_eq!(AttributeName::parse("Photographer").unwrap(), AttributeName::Photographer);
        assert!(AttributeName::parse("caption").is_err());
        assert!(AttributeName::parse("Location").is_err());
    }

    #[test]
    fn test_record_store_uri() {
        let record = MetadataRecord::new("summer holiday.png", "photos");
        assert_eq!(record.store_uri(), "s3://photos/summer holiday.png");
    }

    #[test]
    fn test_attribute_update_wire_shape() {
        let json = r#"{"fileName":"photo.png","attributeName":"Caption","value":"Sunset"}"#;
        let update: AttributeUpdate = serde_json::from_str(json).unwrap();
        assert_eq!(update.file_name, "photo.png");
        assert_eq!(update.attribute, AttributeName::Caption);
        assert_eq!(update.value, "Sunset");
    }
}
