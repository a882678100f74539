//! Subscription predicates
//!
//! Declarative, serializable filter rules evaluated by the topic against
//! event envelope attributes. New consumer types subscribe with a predicate
//! instead of producers growing ad hoc branches.

use serde::{Deserialize, Serialize};

use super::PipelineEvent;

/// A filter predicate over named envelope attributes.
///
/// Every clause is an allow-list test on one attribute; a clause on an
/// absent attribute never matches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Predicate {
    /// The attribute is present and equals the value
    FieldEquals { field: String, value: String },
    /// The attribute is present and is one of the values
    FieldIn { field: String, values: Vec<String> },
    /// All clauses match
    And { clauses: Vec<Predicate> },
}

impl Predicate {
    pub fn field_equals(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::FieldEquals {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn field_in<I, S>(field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::FieldIn {
            field: field.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn and(clauses: Vec<Predicate>) -> Self {
        Self::And { clauses }
    }

    /// Evaluate against an event envelope
    pub fn matches(&self, event: &PipelineEvent) -> bool {
        self.eval(&|field| event.attribute(field))
    }

    /// Evaluate against an arbitrary attribute lookup
    pub fn eval<F>(&self, lookup: &F) -> bool
    where
        F: Fn(&str) -> Option<String>,
    {
        match self {
            Self::FieldEquals { field, value } => {
                lookup(field).is_some_and(|actual| actual == *value)
            }
            Self::FieldIn { field, values } => {
                lookup(field).is_some_and(|actual| values.iter().any(|v| *v == actual))
            }
            Self::And { clauses } => clauses.iter().all(|clause| clause.eval(lookup)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EventKind, ObjectEvent};

    fn created_event(key: &str) -> PipelineEvent {
        PipelineEvent::Object(ObjectEvent::new(EventKind::Created, "photos", key))
    }

    #[test]
    fn test_field_equals() {
        let predicate = Predicate::field_equals("eventName", "ObjectCreated:Put");
        assert!(predicate.matches(&created_event("a.png")));

        let predicate = Predicate::field_equals("eventName", "ObjectRemoved:Delete");
        assert!(!predicate.matches(&created_event("a.png")));
    }

    #[test]
    fn test_field_in() {
        let predicate = Predicate::field_in(
            "eventName",
            ["ObjectCreated:Put", "ObjectRemoved:Delete"],
        );
        assert!(predicate.matches(&created_event("a.png")));

        let predicate = Predicate::field_in("eventName", ["ObjectRemoved:Delete"]);
        assert!(!predicate.matches(&created_event("a.png")));
    }

    #[test]
    fn test_absent_field_never_matches() {
        let predicate = Predicate::field_in("attributeName", ["Caption"]);
        assert!(!predicate.matches(&created_event("a.png")));
    }

    #[test]
    fn test_and_conjunction() {
        let predicate = Predicate::and(vec![
            Predicate::field_equals("eventName", "ObjectCreated:Put"),
            Predicate::field_equals("bucket", "photos"),
        ]);
        assert!(predicate.matches(&created_event("a.png")));

        let predicate = Predicate::and(vec![
            Predicate::field_equals("eventName", "ObjectCreated:Put"),
            Predicate::field_equals("bucket", "archive"),
        ]);
        assert!(!predicate.matches(&created_event("a.png")));
    }

    #[test]
    fn test_predicate_is_serializable() {
        let predicate = Predicate::field_in("attributeName", ["Caption", "Date"]);
        let json = serde_json::to_string(&predicate).unwrap();
        let back: Predicate = serde_json::from_str(&json).unwrap();
        assert_eq!(back, predicate);
    }
}
