//! Meter reading deduplication.
//!
//! Linked meters repeat the same reading several times over the radio. Only
//! the first one inside a short window is kept.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Minimum spacing between two accepted meter readings.
pub const METER_DEDUP_WINDOW_SECS: i64 = 180;

/// A decoded meter radio message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeterMessage {
    pub glucose: i32,
    /// Set on protocol acknowledgements, which carry no new observation.
    #[serde(default)]
    pub ack_flag: bool,
}

/// Suppresses meter readings arriving within [`METER_DEDUP_WINDOW_SECS`] of
/// the last accepted one.
#[derive(Debug, Default, Clone)]
pub struct MeterDeduplicator {
    last_accepted: Option<DateTime<Utc>>,
}

impl MeterDeduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decide whether `message`, received at `now`, should be uploaded.
    ///
    /// Acknowledgements are always rejected and never touch the window.
    pub fn accept(&mut self, message: &MeterMessage, now: DateTime<Utc>) -> bool {
        if message.ack_flag {
            return false;
        }

        let window = Duration::seconds(METER_DEDUP_WINDOW_SECS);
        match self.last_accepted {
            Some(last) if now - last < window => false,
            _ => {
                self.last_accepted = Some(now);
                true
            }
        }
    }

    pub fn last_accepted(&self) -> Option<DateTime<Utc>> {
        self.last_accepted
    }
}
