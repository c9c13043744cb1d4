//! # `Envelope` Wrapper
//!
//! Every payload published on the bus is wrapped in an [`Envelope`] and
//! serialized to JSON text. Subscribers deserialize the text back into the
//! type they expect, so shape mismatches surface as deserialization errors
//! instead of being hidden by pass-by-reference delivery.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Serialization wrapper around a published payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<T> {
    /// Unique per publish.
    pub message_id: Uuid,

    /// Creation time.
    pub timestamp: DateTime<Utc>,

    /// Logical type tag of the payload. Diagnostics only; dispatch is by
    /// channel and the subscriber's expected type.
    pub type_name: String,

    /// The typed message.
    pub payload: T,

    /// Open extension point, ordered by key. Empty by default.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

impl<T> Envelope<T> {
    /// Wrap `payload` with a fresh id and the current time.
    pub fn new(payload: T) -> Self {
        Self {
            message_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            type_name: short_type_name(std::any::type_name::<T>()),
            payload,
            headers: BTreeMap::new(),
        }
    }

    /// Add a header, replacing any previous value for `key`.
    #[must_use]
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Look up a header value.
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers.get(key).map(String::as_str)
    }

    /// Unwrap the payload.
    pub fn into_payload(self) -> T {
        self.payload
    }
}

impl<T: Serialize> Envelope<T> {
    /// Serialize to the transport-neutral text frame.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

impl<T: DeserializeOwned> Envelope<T> {
    /// Parse a text frame produced by [`Envelope::to_json`].
    pub fn from_json(frame: &str) -> serde_json::Result<Self> {
        serde_json::from_str(frame)
    }
}

/// Strip module paths from a `std::any::type_name` string.
///
/// `alloc::vec::Vec<shared_types::messages::TelemetryPacket>` becomes
/// `Vec<TelemetryPacket>`.
fn short_type_name(full: &str) -> String {
    let mut out = String::with_capacity(full.len());
    let mut segment = String::new();
    for c in full.chars() {
        if c.is_alphanumeric() || c == '_' || c == ':' {
            segment.push(c);
            continue;
        }
        out.push_str(last_path_segment(&segment));
        segment.clear();
        out.push(c);
    }
    out.push_str(last_path_segment(&segment));
    out
}

fn last_path_segment(path: &str) -> &str {
    path.rsplit("::").next().unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::GetIngestStats;
    use serde_json::json;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Reading {
        sensor: String,
        value: f64,
    }

    #[test]
    fn test_new_envelope_defaults() {
        let envelope = Envelope::new(Reading {
            sensor: "temp".into(),
            value: 21.5,
        });
        assert_eq!(envelope.type_name, "Reading");
        assert!(envelope.headers.is_empty());
    }

    #[test]
    fn test_unique_message_ids() {
        let a = Envelope::new(1u32);
        let b = Envelope::new(1u32);
        assert_ne!(a.message_id, b.message_id);
    }

    #[test]
    fn test_payload_survives_json_frame() {
        let envelope = Envelope::new(Reading {
            sensor: "temp".into(),
            value: 21.5,
        })
        .with_header("origin", "test");

        let frame = envelope.to_json().unwrap();
        let parsed: Envelope<Reading> = Envelope::from_json(&frame).unwrap();

        assert_eq!(parsed, envelope);
        assert_eq!(parsed.header("origin"), Some("test"));
    }

    #[test]
    fn test_frame_field_names() {
        let frame = Envelope::new(GetIngestStats {}).to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&frame).unwrap();
        for key in ["message_id", "timestamp", "type_name", "payload", "headers"] {
            assert!(value.get(key).is_some(), "missing {key}");
        }
        assert_eq!(value["type_name"], json!("GetIngestStats"));
    }

    #[test]
    fn test_shape_mismatch_is_an_error() {
        let frame = Envelope::new(json!({ "unexpected": true })).to_json().unwrap();
        let parsed: serde_json::Result<Envelope<Reading>> = Envelope::from_json(&frame);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_missing_headers_default_to_empty() {
        let frame = r#"{
            "message_id": "67e55044-10b1-426f-9247-bb680e5fe0c8",
            "timestamp": "2024-01-01T00:00:00Z",
            "type_name": "u32",
            "payload": 7
        }"#;
        let parsed: Envelope<u32> = Envelope::from_json(frame).unwrap();
        assert_eq!(parsed.payload, 7);
        assert!(parsed.headers.is_empty());
    }

    #[test]
    fn test_short_type_name() {
        assert_eq!(short_type_name("u32"), "u32");
        assert_eq!(
            short_type_name("alloc::vec::Vec<shared_types::messages::TelemetryPacket>"),
            "Vec<TelemetryPacket>"
        );
        assert_eq!(
            short_type_name("core::option::Option<(a::B, c::D)>"),
            "Option<(B, D)>"
        );
    }
}
