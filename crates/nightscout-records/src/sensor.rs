//! Sensor status packets → sensor glucose readings.

use crate::reading::{GlucoseTrend, PreviousValue, Reading};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Value uploaded when the sensor reports a reading above its range.
pub const HIGH_BG_VALUE: i32 = 401;

/// Sentinel codes uploaded in place of a glucose value when the sensor is in
/// an error state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum SensorErrorCode {
    SensorNotActive = 1,
    SensorNotCalibrated = 5,
    BadRf = 12,
}

impl SensorErrorCode {
    pub fn code(self) -> i32 {
        self as i32
    }
}

/// Glucose state as reported by the sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "value", rename_all = "snake_case")]
pub enum SensorGlucose {
    Active(i32),
    HighBg,
    WeakSignal,
    MeterBgNow,
    CalError,
    Lost,
    Missing,
    Ended,
    Unknown,
    Off,
    Warmup,
}

impl SensorGlucose {
    /// Value to upload, or `None` when the state carries no observation.
    pub fn upload_value(&self) -> Option<i32> {
        match self {
            SensorGlucose::Active(glucose) => Some(*glucose),
            SensorGlucose::HighBg => Some(HIGH_BG_VALUE),
            SensorGlucose::WeakSignal => Some(SensorErrorCode::BadRf.code()),
            SensorGlucose::MeterBgNow | SensorGlucose::CalError => {
                Some(SensorErrorCode::SensorNotCalibrated.code())
            }
            SensorGlucose::Lost
            | SensorGlucose::Missing
            | SensorGlucose::Ended
            | SensorGlucose::Unknown
            | SensorGlucose::Off
            | SensorGlucose::Warmup => None,
        }
    }
}

/// A sensor status snapshot relayed by the pump.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorStatus {
    pub glucose: SensorGlucose,
    pub previous_glucose: SensorGlucose,
    pub trend: GlucoseTrend,
    /// Sensor clock time of the reading, when the packet carries one.
    #[serde(default)]
    pub glucose_date: Option<DateTime<Utc>>,
}

/// Build the sensor reading for `status`, if its state is worth recording.
pub fn reading_from_sensor_status(status: &SensorStatus, device: &str) -> Option<Reading> {
    let value = status.glucose.upload_value()?;
    let previous = match status.previous_glucose {
        SensorGlucose::Active(previous) => PreviousValue::Active(previous),
        _ => PreviousValue::NotActive,
    };

    Some(
        Reading::sensor(value, device, status.glucose_date)
            .with_previous(previous)
            .with_direction(status.trend),
    )
}
