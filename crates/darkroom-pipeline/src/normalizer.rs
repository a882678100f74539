//! Event normalizer
//!
//! Raw upload/removal notifications arrive wrapped in transport envelopes
//! of varying depth: sometimes the bare object-notification list, sometimes
//! a broker message whose `Message` field is JSON-encoded, sometimes a
//! queue batch whose record bodies each wrap such a message. Nesting depth
//! is inconsistent across sources, so the normalizer probes for a
//! `Records` list at every level instead of hardcoding one or two
//! unwraps.

use chrono::{DateTime, Utc};
use serde_json::Value;

use darkroom_core::types::{EventKind, ObjectEvent};
use darkroom_core::{utils, Error, Result};

/// Deepest envelope nesting the normalizer will unwrap
const MAX_UNWRAP_DEPTH: usize = 8;

/// Normalize a raw notification payload into canonical object events.
///
/// Pure transform: no I/O, deterministic for a given payload. Fails with
/// `MalformedPayload` when no `Records` list is found at any level, and
/// with `MissingField` when an inner record lacks its event name, bucket,
/// or key.
pub fn normalize(raw: &str) -> Result<Vec<ObjectEvent>> {
    let root: Value = serde_json::from_str(raw).map_err(|_| Error::MalformedPayload)?;

    let mut events = Vec::new();
    collect(&root, 0, &mut events)?;
    Ok(events)
}

fn collect(value: &Value, depth: usize, out: &mut Vec<ObjectEvent>) -> Result<()> {
    if depth > MAX_UNWRAP_DEPTH {
        return Err(Error::MalformedPayload);
    }

    let map = match value.as_object() {
        Some(map) => map,
        None => return Err(Error::MalformedPayload),
    };

    if let Some(records) = map.get("Records").and_then(Value::as_array) {
        for record in records {
            // An object record carries its own payload; anything else in a
            // Records list is a transport batch entry to descend into.
            if record.get("s3").is_some() || record.get("eventName").is_some() {
                out.push(object_event(record)?);
            } else {
                collect(record, depth + 1, out)?;
            }
        }
        return Ok(());
    }

    // No Records here: unwrap one envelope layer and keep probing.
    for field in ["Message", "body", "Body"] {
        match map.get(field) {
            Some(Value::String(embedded)) => {
                let inner: Value =
                    serde_json::from_str(embedded).map_err(|_| Error::MalformedPayload)?;
                return collect(&inner, depth + 1, out);
            }
            Some(inner @ Value::Object(_)) => return collect(inner, depth + 1, out),
            _ => {}
        }
    }
    if let Some(inner) = map.get("Sns") {
        return collect(inner, depth + 1, out);
    }

    Err(Error::MalformedPayload)
}

fn object_event(record: &Value) -> Result<ObjectEvent> {
    let event_name = record
        .get("eventName")
        .and_then(Value::as_str)
        .ok_or(Error::MissingField("eventName"))?;
    let kind = EventKind::parse(event_name)?;

    let s3 = record.get("s3").ok_or(Error::MissingField("s3"))?;
    let bucket = s3
        .get("bucket")
        .and_then(|bucket| bucket.get("name"))
        .and_then(Value::as_str)
        .ok_or(Error::MissingField("s3.bucket.name"))?;
    let raw_key = s3
        .get("object")
        .and_then(|object| object.get("key"))
        .and_then(Value::as_str)
        .ok_or(Error::MissingField("s3.object.key"))?;

    let key = utils::decode_object_key(raw_key)?;

    let event_time = record
        .get("eventTime")
        .and_then(Value::as_str)
        .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
        .map(|time| time.with_timezone(&Utc))
        .unwrap_or_else(Utc::now);

    Ok(ObjectEvent {
        kind,
        bucket: bucket.to_string(),
        key,
        event_time,
    })
}
