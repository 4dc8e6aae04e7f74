//! Glucose readings (`/api/v1/entries`).

use crate::time::{epoch_millis, timestamp_string};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};

/// Device label attached to readings relayed from a linked glucose meter.
pub const METER_DEVICE_NAME: &str = "Contour Next Link";

/// Where a reading came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadingKind {
    /// Continuous glucose sensor (`sgv`).
    Sensor,
    /// Fingerstick meter (`mbg`).
    Meter,
}

impl ReadingKind {
    /// Entry `type` value used by the remote API.
    pub fn entry_type(&self) -> &'static str {
        match self {
            ReadingKind::Sensor => "sgv",
            ReadingKind::Meter => "mbg",
        }
    }
}

/// Sensor glucose trend reported alongside a reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GlucoseTrend {
    Up,
    UpUp,
    Down,
    DownDown,
    Flat,
}

impl GlucoseTrend {
    /// Nightscout `direction` string.
    pub fn direction(&self) -> &'static str {
        match self {
            GlucoseTrend::Up => "SingleUp",
            GlucoseTrend::UpUp => "DoubleUp",
            GlucoseTrend::Down => "SingleDown",
            GlucoseTrend::DownDown => "DoubleDown",
            GlucoseTrend::Flat => "Flat",
        }
    }
}

/// The sensor's previous value, when the device reports one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreviousValue {
    Active(i32),
    NotActive,
}

/// A single glucose observation. Immutable once created.
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    pub kind: ReadingKind,
    /// Glucose value in mg/dL, or a sensor error sentinel code.
    pub value: i32,
    /// Observation time; sensor packets without a clock omit it.
    pub timestamp: Option<DateTime<Utc>>,
    pub device: String,
    pub direction: Option<GlucoseTrend>,
    pub previous: Option<PreviousValue>,
}

impl Reading {
    /// A meter reading observed at `at`.
    pub fn meter(value: i32, device: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            kind: ReadingKind::Meter,
            value,
            timestamp: Some(at),
            device: device.into(),
            direction: None,
            previous: None,
        }
    }

    /// A sensor reading with no trend or history attached.
    pub fn sensor(value: i32, device: impl Into<String>, at: Option<DateTime<Utc>>) -> Self {
        Self {
            kind: ReadingKind::Sensor,
            value,
            timestamp: at,
            device: device.into(),
            direction: None,
            previous: None,
        }
    }

    pub fn with_direction(mut self, trend: GlucoseTrend) -> Self {
        self.direction = Some(trend);
        self
    }

    pub fn with_previous(mut self, previous: PreviousValue) -> Self {
        self.previous = Some(previous);
        self
    }
}

/// Wire shape of a reading.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ReadingPayload<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    sgv: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    mbg: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    date: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    date_string: Option<String>,
    device: &'a str,
    #[serde(rename = "type")]
    entry_type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    direction: Option<&'static str>,
    #[serde(rename = "previousSGV", skip_serializing_if = "Option::is_none")]
    previous_sgv: Option<i32>,
    #[serde(rename = "previousSGVNotActive", skip_serializing_if = "Option::is_none")]
    previous_sgv_not_active: Option<bool>,
}

impl<'a> From<&'a Reading> for ReadingPayload<'a> {
    fn from(reading: &'a Reading) -> Self {
        let (sgv, mbg) = match reading.kind {
            ReadingKind::Sensor => (Some(reading.value), None),
            ReadingKind::Meter => (None, Some(reading.value)),
        };
        let (previous_sgv, previous_sgv_not_active) = match reading.previous {
            Some(PreviousValue::Active(value)) => (Some(value), None),
            Some(PreviousValue::NotActive) => (None, Some(true)),
            None => (None, None),
        };

        Self {
            sgv,
            mbg,
            date: reading.timestamp.as_ref().map(epoch_millis),
            date_string: reading.timestamp.as_ref().map(timestamp_string),
            device: &reading.device,
            entry_type: reading.kind.entry_type(),
            direction: reading.direction.map(|d| d.direction()),
            previous_sgv,
            previous_sgv_not_active,
        }
    }
}

impl Serialize for Reading {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        ReadingPayload::from(self).serialize(serializer)
    }
}
