//! Resumption checkpoint.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// How far back to observe pump history when nothing has been confirmed yet.
pub const DEFAULT_LOOKBACK_HOURS: i64 = 24;

/// Watermarks that let a restarted uploader skip already-delivered history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Earliest event time whose treatments may still be revised.
    pub observing_since: DateTime<Utc>,
    /// Timestamp of the last treatment in the most recent successful flush.
    pub last_confirmed_treatment_timestamp: Option<DateTime<Utc>>,
}

impl Checkpoint {
    /// Resume from a persisted watermark, or look back
    /// [`DEFAULT_LOOKBACK_HOURS`] when there is none.
    pub fn resume(last_confirmed: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Self {
        Self {
            observing_since: last_confirmed.unwrap_or_else(|| default_observing_since(now)),
            last_confirmed_treatment_timestamp: last_confirmed,
        }
    }

    /// Move the confirmed watermark forward. Older or equal timestamps are ignored.
    ///
    /// Returns true if the watermark changed.
    pub fn advance(&mut self, timestamp: DateTime<Utc>) -> bool {
        match self.last_confirmed_treatment_timestamp {
            Some(current) if timestamp <= current => false,
            _ => {
                self.last_confirmed_treatment_timestamp = Some(timestamp);
                true
            }
        }
    }

    /// Forget all confirmed progress.
    pub fn reset(&mut self, now: DateTime<Utc>) {
        self.observing_since = default_observing_since(now);
        self.last_confirmed_treatment_timestamp = None;
    }
}

fn default_observing_since(now: DateTime<Utc>) -> DateTime<Utc> {
    now - Duration::hours(DEFAULT_LOOKBACK_HOURS)
}
