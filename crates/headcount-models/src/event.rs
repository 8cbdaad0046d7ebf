//! Webhook event schema.
//!
//! Events are built as a typed [`EventKind`] and only flattened to JSON at
//! the delivery boundary. The wire form is:
//!
//! ```json
//! {"cameraId": "cam-1", "ts": 1719830400000, "type": "people-stats", "data": {...}, "sig": "ab12..."}
//! ```
//!
//! The signature covers the canonical form of everything except `sig`.

use chrono::Utc;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ModelResult;
use crate::stats::StatsSnapshot;

/// What triggered an enter/exit event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum CrossingSource {
    Line,
    Zone,
}

/// Payload for `enter` / `exit` events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CrossingData {
    pub track_id: u64,
    pub source: CrossingSource,
    /// Zone index for zone transitions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zone: Option<usize>,
}

impl CrossingData {
    pub fn line(track_id: u64) -> Self {
        Self {
            track_id,
            source: CrossingSource::Line,
            zone: None,
        }
    }

    pub fn zone(track_id: u64, zone: usize) -> Self {
        Self {
            track_id,
            source: CrossingSource::Zone,
            zone: Some(zone),
        }
    }
}

/// Payload for `error` events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ErrorData {
    pub message: String,
}

/// Event type with its fixed payload.
#[derive(Debug, Clone, PartialEq)]
pub enum EventKind {
    PeopleStats(StatsSnapshot),
    Enter(CrossingData),
    Exit(CrossingData),
    Error(ErrorData),
}

impl EventKind {
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error(ErrorData {
            message: message.into(),
        })
    }

    /// Wire value of the `type` field.
    pub fn type_tag(&self) -> &'static str {
        match self {
            EventKind::PeopleStats(_) => "people-stats",
            EventKind::Enter(_) => "enter",
            EventKind::Exit(_) => "exit",
            EventKind::Error(_) => "error",
        }
    }

    /// Serialize the payload for the `data` field.
    pub fn data(&self) -> ModelResult<Value> {
        let value = match self {
            EventKind::PeopleStats(stats) => serde_json::to_value(stats)?,
            EventKind::Enter(data) | EventKind::Exit(data) => serde_json::to_value(data)?,
            EventKind::Error(data) => serde_json::to_value(data)?,
        };
        Ok(value)
    }
}

/// An event for one camera, stamped at creation.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub camera_id: String,
    /// Unix epoch milliseconds.
    pub ts: i64,
    pub kind: EventKind,
}

impl Event {
    pub fn new(camera_id: impl Into<String>, kind: EventKind) -> Self {
        Self {
            camera_id: camera_id.into(),
            ts: Utc::now().timestamp_millis(),
            kind,
        }
    }

    pub fn with_ts(camera_id: impl Into<String>, ts: i64, kind: EventKind) -> Self {
        Self {
            camera_id: camera_id.into(),
            ts,
            kind,
        }
    }

    /// Canonical unsigned payload: `{cameraId, data, ts, type}` with keys
    /// sorted at every level.
    pub fn unsigned_payload(&self) -> ModelResult<Value> {
        Ok(unsigned_payload(
            &self.camera_id,
            self.ts,
            self.kind.type_tag(),
            self.kind.data()?,
        ))
    }

    /// Attach a signature, producing the wire form.
    pub fn into_signed(self, sig: String) -> ModelResult<SignedEvent> {
        Ok(SignedEvent {
            data: self.kind.data()?,
            event_type: self.kind.type_tag().to_string(),
            camera_id: self.camera_id,
            ts: self.ts,
            sig,
        })
    }
}

/// Event as delivered to the webhook.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SignedEvent {
    #[serde(rename = "cameraId")]
    pub camera_id: String,
    pub ts: i64,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: Value,
    /// Lower-case hex HMAC-SHA256; empty when no secret is configured.
    pub sig: String,
}

impl SignedEvent {
    /// Rebuild the canonical unsigned payload a receiver verifies against.
    pub fn unsigned_payload(&self) -> Value {
        unsigned_payload(&self.camera_id, self.ts, &self.event_type, self.data.clone())
    }
}

fn unsigned_payload(camera_id: &str, ts: i64, event_type: &str, data: Value) -> Value {
    let mut map = Map::new();
    map.insert("cameraId".to_string(), Value::String(camera_id.to_string()));
    map.insert("data".to_string(), data);
    map.insert("ts".to_string(), Value::from(ts));
    map.insert("type".to_string(), Value::String(event_type.to_string()));
    canonicalize(Value::Object(map))
}

/// Rebuild objects with keys inserted in sorted order, recursively.
///
/// Serialization then emits sorted keys whether the map type is ordered by
/// key or by insertion.
pub fn canonicalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            let mut sorted = Map::new();
            for (key, value) in entries {
                sorted.insert(key, canonicalize(value));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(canonicalize).collect()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_tags() {
        assert_eq!(EventKind::PeopleStats(StatsSnapshot::default()).type_tag(), "people-stats");
        assert_eq!(EventKind::Enter(CrossingData::line(1)).type_tag(), "enter");
        assert_eq!(EventKind::Exit(CrossingData::zone(1, 0)).type_tag(), "exit");
        assert_eq!(EventKind::error("boom").type_tag(), "error");
    }

    #[test]
    fn test_unsigned_payload_is_sorted() {
        let event = Event::with_ts(
            "cam-1",
            42,
            EventKind::PeopleStats(StatsSnapshot {
                count_in: 3,
                ..Default::default()
            }),
        );
        let bytes = serde_json::to_string(&event.unsigned_payload().unwrap()).unwrap();
        assert!(bytes.starts_with(r#"{"cameraId":"cam-1","data":{"count_in":3,"count_out":0,"current_detected":0,"#));
        assert!(bytes.ends_with(r#""ts":42,"type":"people-stats"}"#));
    }

    #[test]
    fn test_signed_wire_shape() {
        let event = Event::with_ts("cam-1", 7, EventKind::Enter(CrossingData::zone(9, 1)));
        let signed = event.into_signed("abc".to_string()).unwrap();
        let value = serde_json::to_value(&signed).unwrap();

        assert_eq!(value["cameraId"], "cam-1");
        assert_eq!(value["type"], "enter");
        assert_eq!(value["data"]["trackId"], 9);
        assert_eq!(value["data"]["source"], "zone");
        assert_eq!(value["data"]["zone"], 1);
        assert_eq!(value["sig"], "abc");
    }

    #[test]
    fn test_signed_payload_matches_event_payload() {
        let event = Event::with_ts("cam-2", 99, EventKind::error("stream lost"));
        let expected = event.unsigned_payload().unwrap();
        let signed = event.into_signed(String::new()).unwrap();
        assert_eq!(signed.unsigned_payload(), expected);
    }
}
