//! Newline-delimited device input accepted by `run`.

use chrono::{DateTime, Utc};
use nightscout_records::{DeviceStatusSnapshot, MeterMessage, SensorStatus, TimestampedPumpEvent};
use serde::Deserialize;
use serde_json::{Map, Value};

/// One line of input, tagged by `kind`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DeviceInput {
    /// `{"kind":"pump_events","source":"...","events":[...]}`
    PumpEvents {
        source: String,
        events: Vec<TimestampedPumpEvent>,
    },
    /// `{"kind":"device_status","status":{...}}`
    DeviceStatus { status: Map<String, Value> },
    /// `{"kind":"sensor_status","device":"...","glucose":{...},...}`
    SensorStatus {
        device: String,
        #[serde(flatten)]
        status: SensorStatus,
    },
    /// `{"kind":"meter","glucose":104,"ack_flag":false}`
    Meter {
        #[serde(flatten)]
        message: MeterMessage,
    },
}

impl DeviceInput {
    pub fn parse(line: &str) -> serde_json::Result<Self> {
        serde_json::from_str(line)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            DeviceInput::PumpEvents { .. } => "pump_events",
            DeviceInput::DeviceStatus { .. } => "device_status",
            DeviceInput::SensorStatus { .. } => "sensor_status",
            DeviceInput::Meter { .. } => "meter",
        }
    }
}

/// Snapshot for a raw device status object received at `now`.
pub fn device_status(status: Map<String, Value>, now: DateTime<Utc>) -> DeviceStatusSnapshot {
    DeviceStatusSnapshot::from_payload(status, now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use nightscout_records::{GlucoseTrend, PumpEvent, SensorGlucose};

    #[test]
    fn parses_pump_events() {
        let input = DeviceInput::parse(
            r#"{"kind":"pump_events","source":"pump-1","events":[
                {"date":"2024-03-01T10:00:00Z","event":{"type":"suspend"}},
                {"date":"2024-03-01T10:05:00Z","event":{"type":"something_new"}}
            ]}"#,
        )
        .unwrap();

        let DeviceInput::PumpEvents { source, events } = input else {
            panic!("wrong kind");
        };
        assert_eq!(source, "pump-1");
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event, PumpEvent::Suspend);
        assert_eq!(events[1].event, PumpEvent::Unknown);
    }

    #[test]
    fn parses_sensor_status() {
        let input = DeviceInput::parse(
            r#"{"kind":"sensor_status","device":"pump-1",
                "glucose":{"state":"active","value":120},
                "previous_glucose":{"state":"lost"},
                "trend":"flat"}"#,
        )
        .unwrap();

        let DeviceInput::SensorStatus { device, status } = input else {
            panic!("wrong kind");
        };
        assert_eq!(device, "pump-1");
        assert_eq!(status.glucose, SensorGlucose::Active(120));
        assert_eq!(status.previous_glucose, SensorGlucose::Lost);
        assert_eq!(status.trend, GlucoseTrend::Flat);
        assert_eq!(status.glucose_date, None);
    }

    #[test]
    fn parses_meter_and_status() {
        let meter = DeviceInput::parse(r#"{"kind":"meter","glucose":104}"#).unwrap();
        assert_eq!(
            meter,
            DeviceInput::Meter {
                message: MeterMessage {
                    glucose: 104,
                    ack_flag: false
                }
            }
        );

        let status =
            DeviceInput::parse(r#"{"kind":"device_status","status":{"pump":{"battery":80}}}"#)
                .unwrap();
        assert_eq!(status.kind(), "device_status");
    }

    #[test]
    fn rejects_unknown_kind() {
        assert!(DeviceInput::parse(r#"{"kind":"fax"}"#).is_err());
        assert!(DeviceInput::parse("not json").is_err());
    }

    #[test]
    fn device_status_uses_created_at_when_present() {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let mut payload = Map::new();
        payload.insert("created_at".into(), Value::String("2024-03-01T11:59:00Z".into()));

        let snapshot = device_status(payload, now);
        assert_eq!(snapshot.timestamp, Utc.with_ymd_and_hms(2024, 3, 1, 11, 59, 0).unwrap());
        assert_eq!(device_status(Map::new(), now).timestamp, now);
    }
}
