//! Record types uploaded to a Nightscout site, plus the pure logic that
//! produces them from device data.
//!
//! This crate provides:
//! - [`Reading`], [`DeviceStatusSnapshot`], [`TreatmentRecord`]: canonical uploadable records
//! - [`Checkpoint`]: the resumption watermarks that survive restarts
//! - [`translate`]: pump history events → treatments (with open-bolus side output)
//! - [`MeterDeduplicator`]: suppresses repeated meter readings within a short window
//! - [`reading_from_sensor_status`]: sensor status packets → sensor readings

mod checkpoint;
mod dedup;
mod device_status;
mod pump_event;
mod reading;
mod sensor;
mod time;
mod translate;
mod treatment;

pub use checkpoint::{Checkpoint, DEFAULT_LOOKBACK_HOURS};
pub use dedup::{MeterDeduplicator, MeterMessage, METER_DEDUP_WINDOW_SECS};
pub use device_status::DeviceStatusSnapshot;
pub use pump_event::{PumpEvent, TempBasalType, TimestampedPumpEvent};
pub use reading::{GlucoseTrend, PreviousValue, Reading, ReadingKind, METER_DEVICE_NAME};
pub use sensor::{
    reading_from_sensor_status, SensorErrorCode, SensorGlucose, SensorStatus, HIGH_BG_VALUE,
};
pub use time::{epoch_millis, timestamp_string};
pub use translate::{
    newest_event_time, observation_watermark, oldest_open_bolus, translate, TreatmentTranslator,
};
pub use treatment::{TreatmentCategory, TreatmentRecord};
