//! Pump history events, already decoded from the device protocol upstream.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// How a temporary basal rate is expressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TempBasalType {
    /// Units per hour.
    Absolute,
    /// Percentage of the scheduled rate.
    Percent,
}

/// The closed set of pump history events this uploader knows about.
///
/// Anything else decodes to [`PumpEvent::Unknown`] and is dropped by the translator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PumpEvent {
    BolusNormal {
        /// Units delivered so far.
        amount: f64,
        /// Units programmed.
        programmed: f64,
        #[serde(default)]
        unabsorbed_insulin: f64,
        /// Zero for a normal bolus, positive for a square-wave bolus.
        #[serde(default)]
        duration_minutes: u32,
    },
    BolusWizard {
        carbs: f64,
        carb_ratio: f64,
    },
    TempBasal {
        rate: f64,
        rate_type: TempBasalType,
        duration_minutes: u32,
    },
    BgReceived {
        amount: i32,
        #[serde(default)]
        meter_id: String,
    },
    Alarm {
        alarm_type: String,
    },
    Suspend,
    Resume,
    Rewind,
    Prime {
        amount: f64,
    },
    #[serde(other)]
    Unknown,
}

impl PumpEvent {
    /// Declared delivery duration for boluses; `None` for every other kind.
    pub fn bolus_duration(&self) -> Option<Duration> {
        match self {
            PumpEvent::BolusNormal {
                duration_minutes, ..
            } => Some(Duration::minutes(i64::from(*duration_minutes))),
            _ => None,
        }
    }
}

/// A pump event with the time the pump recorded it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimestampedPumpEvent {
    pub date: DateTime<Utc>,
    pub event: PumpEvent,
}

impl TimestampedPumpEvent {
    pub fn new(date: DateTime<Utc>, event: PumpEvent) -> Self {
        Self { date, event }
    }
}
