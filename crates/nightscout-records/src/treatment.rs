//! Treatment records (`/api/v1/treatments`).

use crate::time::timestamp_string;
use chrono::{DateTime, Utc};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};
use std::sync::OnceLock;

/// Field name the remote API uses for its record identifier.
pub(crate) const REMOTE_ID_FIELD: &str = "_id";

/// Clinical event categories understood by the remote API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TreatmentCategory {
    CorrectionBolus,
    MealBolus,
    TempBasal,
    BgCheck,
    Note,
    SuspendPump,
    ResumePump,
    SiteChange,
}

impl TreatmentCategory {
    /// Nightscout `eventType` string.
    pub fn event_type(&self) -> &'static str {
        match self {
            TreatmentCategory::CorrectionBolus => "Correction Bolus",
            TreatmentCategory::MealBolus => "Meal Bolus",
            TreatmentCategory::TempBasal => "Temp Basal",
            TreatmentCategory::BgCheck => "BG Check",
            TreatmentCategory::Note => "Note",
            TreatmentCategory::SuspendPump => "Suspend Pump",
            TreatmentCategory::ResumePump => "Resume Pump",
            TreatmentCategory::SiteChange => "Site Change",
        }
    }
}

/// A clinical event destined for the treatments collection.
///
/// Everything except the remote identifier is fixed at construction. The
/// identifier can be attached exactly once, after the remote API confirms the
/// create; it is required for modify and delete calls.
#[derive(Debug, Clone)]
pub struct TreatmentRecord {
    timestamp: DateTime<Utc>,
    category: TreatmentCategory,
    entered_by: String,
    payload: Map<String, Value>,
    remote_id: OnceLock<String>,
}

impl TreatmentRecord {
    pub fn new(
        timestamp: DateTime<Utc>,
        category: TreatmentCategory,
        entered_by: impl Into<String>,
        payload: Map<String, Value>,
    ) -> Self {
        Self {
            timestamp,
            category,
            entered_by: entered_by.into(),
            payload,
            remote_id: OnceLock::new(),
        }
    }

    /// Construct a record that is already known to the remote API.
    pub fn with_remote_id(self, id: impl Into<String>) -> Self {
        let _ = self.remote_id.set(id.into());
        self
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn category(&self) -> TreatmentCategory {
        self.category
    }

    pub fn entered_by(&self) -> &str {
        &self.entered_by
    }

    pub fn payload(&self) -> &Map<String, Value> {
        &self.payload
    }

    pub fn remote_id(&self) -> Option<&str> {
        self.remote_id.get().map(String::as_str)
    }

    /// Attach the identifier assigned by the remote API.
    ///
    /// Returns false if an identifier was already attached; the first one wins.
    pub fn attach_remote_id(&self, id: impl Into<String>) -> bool {
        self.remote_id.set(id.into()).is_ok()
    }
}

impl Serialize for TreatmentRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let date = timestamp_string(&self.timestamp);
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("created_at", &date)?;
        map.serialize_entry("timestamp", &date)?;
        map.serialize_entry("eventType", self.category.event_type())?;
        map.serialize_entry("enteredBy", &self.entered_by)?;
        for (key, value) in &self.payload {
            map.serialize_entry(key, value)?;
        }
        if let Some(id) = self.remote_id() {
            map.serialize_entry(REMOTE_ID_FIELD, id)?;
        }
        map.end()
    }
}
