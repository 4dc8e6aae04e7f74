//! Device status snapshots (`/api/v1/devicestatus`).

use crate::time::timestamp_string;
use chrono::{DateTime, Utc};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

/// Opaque structured payload describing device state at a point in time.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceStatusSnapshot {
    pub timestamp: DateTime<Utc>,
    pub payload: Map<String, Value>,
}

impl DeviceStatusSnapshot {
    pub fn new(timestamp: DateTime<Utc>, payload: Map<String, Value>) -> Self {
        Self { timestamp, payload }
    }

    /// Build a snapshot from a raw status object, taking the timestamp from
    /// its `created_at` field when present and parseable, else `fallback`.
    pub fn from_payload(payload: Map<String, Value>, fallback: DateTime<Utc>) -> Self {
        let timestamp = payload
            .get("created_at")
            .and_then(Value::as_str)
            .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
            .map(|date| date.with_timezone(&Utc))
            .unwrap_or(fallback);
        Self { timestamp, payload }
    }
}

impl Serialize for DeviceStatusSnapshot {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let has_created_at = self.payload.contains_key("created_at");
        let len = self.payload.len() + usize::from(!has_created_at);
        let mut map = serializer.serialize_map(Some(len))?;
        if !has_created_at {
            map.serialize_entry("created_at", &timestamp_string(&self.timestamp))?;
        }
        for (key, value) in &self.payload {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn adds_created_at_when_missing() {
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let snapshot = DeviceStatusSnapshot::new(at, object(json!({"device": "rileylink", "uploaderBattery": 80})));

        let value = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(value["created_at"], "2024-03-01T12:00:00.000Z");
        assert_eq!(value["uploaderBattery"], 80);
    }

    #[test]
    fn keeps_payload_created_at() {
        let payload = object(json!({"created_at": "2024-03-01T10:00:00.000Z"}));
        let fallback = Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap();
        let snapshot = DeviceStatusSnapshot::from_payload(payload, fallback);

        assert_eq!(snapshot.timestamp, Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap());
        let value = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(value["created_at"], "2024-03-01T10:00:00.000Z");
        assert_eq!(value.as_object().unwrap().len(), 1);
    }

    #[test]
    fn unparseable_created_at_falls_back() {
        let fallback = Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap();
        let snapshot =
            DeviceStatusSnapshot::from_payload(object(json!({"created_at": "yesterday"})), fallback);
        assert_eq!(snapshot.timestamp, fallback);
    }
}
