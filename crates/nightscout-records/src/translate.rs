//! Pump history → treatment records.
//!
//! Translation is a pure function of its input: calling [`translate`] twice on
//! the same events yields the same records. Event kinds without a treatment
//! mapping are skipped.

use crate::pump_event::{PumpEvent, TempBasalType, TimestampedPumpEvent};
use crate::treatment::{TreatmentCategory, TreatmentRecord};
use chrono::{DateTime, Utc};
use serde_json::{json, Map, Value};
use std::slice;
use tracing::trace;

/// Lazily translate `events` into treatments attributed to `source`.
pub fn translate<'a>(events: &'a [TimestampedPumpEvent], source: &str) -> TreatmentTranslator<'a> {
    TreatmentTranslator {
        events: events.iter(),
        entered_by: format!("loop://{}", source),
        pending_wizard: None,
        open_bolus_since: oldest_open_bolus(events),
    }
}

/// Latest event time in the batch.
pub fn newest_event_time(events: &[TimestampedPumpEvent]) -> Option<DateTime<Utc>> {
    events.iter().map(|e| e.date).max()
}

/// Time of the earliest bolus whose delivery finishes after the newest event
/// in the batch. Such a bolus may still be revised by the pump.
pub fn oldest_open_bolus(events: &[TimestampedPumpEvent]) -> Option<DateTime<Utc>> {
    let newest = newest_event_time(events)?;
    events
        .iter()
        .filter(|e| {
            e.event
                .bolus_duration()
                .is_some_and(|duration| e.date + duration > newest)
        })
        .map(|e| e.date)
        .min()
}

/// Where observation should restart after processing `events`: the oldest
/// open bolus if any, else the newest event, else `None` (empty batch).
pub fn observation_watermark(events: &[TimestampedPumpEvent]) -> Option<DateTime<Utc>> {
    oldest_open_bolus(events).or_else(|| newest_event_time(events))
}

#[derive(Debug, Clone, Copy)]
struct WizardEstimate {
    date: DateTime<Utc>,
    carbs: f64,
    carb_ratio: f64,
}

/// Iterator returned by [`translate`].
#[derive(Debug, Clone)]
pub struct TreatmentTranslator<'a> {
    events: slice::Iter<'a, TimestampedPumpEvent>,
    entered_by: String,
    pending_wizard: Option<WizardEstimate>,
    open_bolus_since: Option<DateTime<Utc>>,
}

impl TreatmentTranslator<'_> {
    /// Side output: earliest bolus in the input that is still delivering.
    pub fn open_bolus_since(&self) -> Option<DateTime<Utc>> {
        self.open_bolus_since
    }

    fn record(
        &self,
        date: DateTime<Utc>,
        category: TreatmentCategory,
        payload: Map<String, Value>,
    ) -> TreatmentRecord {
        TreatmentRecord::new(date, category, self.entered_by.clone(), payload)
    }
}

impl Iterator for TreatmentTranslator<'_> {
    type Item = TreatmentRecord;

    fn next(&mut self) -> Option<TreatmentRecord> {
        while let Some(event) = self.events.next() {
            let date = event.date;
            let record = match &event.event {
                PumpEvent::BolusWizard { carbs, carb_ratio } => {
                    self.pending_wizard = Some(WizardEstimate {
                        date,
                        carbs: *carbs,
                        carb_ratio: *carb_ratio,
                    });
                    continue;
                }
                PumpEvent::BolusNormal {
                    amount,
                    programmed,
                    unabsorbed_insulin,
                    duration_minutes,
                } => {
                    let mut payload = object(json!({
                        "type": if *duration_minutes > 0 { "square" } else { "normal" },
                        "insulin": amount,
                        "programmed": programmed,
                        "unabsorbed": unabsorbed_insulin,
                        "duration": duration_minutes,
                    }));
                    let wizard = self.pending_wizard.take().filter(|w| w.date == date);
                    let category = match wizard {
                        Some(wizard) => {
                            payload.insert("carbs".to_string(), json!(wizard.carbs));
                            payload.insert("ratio".to_string(), json!(wizard.carb_ratio));
                            TreatmentCategory::MealBolus
                        }
                        None => TreatmentCategory::CorrectionBolus,
                    };
                    self.record(date, category, payload)
                }
                PumpEvent::TempBasal {
                    rate,
                    rate_type,
                    duration_minutes,
                } => {
                    let payload = match rate_type {
                        TempBasalType::Absolute => object(json!({
                            "temp": "absolute",
                            "rate": rate,
                            "absolute": rate,
                            "duration": duration_minutes,
                        })),
                        TempBasalType::Percent => object(json!({
                            "temp": "percentage",
                            "percent": rate,
                            "duration": duration_minutes,
                        })),
                    };
                    self.record(date, TreatmentCategory::TempBasal, payload)
                }
                PumpEvent::BgReceived { amount, .. } => self.record(
                    date,
                    TreatmentCategory::BgCheck,
                    object(json!({
                        "glucose": amount,
                        "glucoseType": "Meter",
                        "units": "mg/dl",
                    })),
                ),
                PumpEvent::Alarm { alarm_type } => self.record(
                    date,
                    TreatmentCategory::Note,
                    object(json!({ "notes": format!("Pump alarm: {}", alarm_type) })),
                ),
                PumpEvent::Suspend => self.record(date, TreatmentCategory::SuspendPump, Map::new()),
                PumpEvent::Resume => self.record(date, TreatmentCategory::ResumePump, Map::new()),
                PumpEvent::Prime { amount } => self.record(
                    date,
                    TreatmentCategory::SiteChange,
                    object(json!({ "notes": format!("Primed {} U", amount) })),
                ),
                PumpEvent::Rewind | PumpEvent::Unknown => {
                    trace!(date = %date, "Skipping pump event with no treatment mapping");
                    continue;
                }
            };
            return Some(record);
        }
        None
    }
}

fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t(minute: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap() + Duration::minutes(minute)
    }

    fn bolus(minute: i64, duration_minutes: u32) -> TimestampedPumpEvent {
        TimestampedPumpEvent::new(
            t(minute),
            PumpEvent::BolusNormal {
                amount: 2.0,
                programmed: 2.5,
                unabsorbed_insulin: 0.3,
                duration_minutes,
            },
        )
    }

    #[test]
    fn correction_bolus_mapping() {
        let events = vec![bolus(0, 0)];
        let records: Vec<_> = translate(&events, "pump-123").collect();

        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.category(), TreatmentCategory::CorrectionBolus);
        assert_eq!(record.entered_by(), "loop://pump-123");
        assert_eq!(record.timestamp(), t(0));
        assert_eq!(record.payload()["type"], "normal");
        assert_eq!(record.payload()["insulin"], 2.0);
        assert_eq!(record.payload()["programmed"], 2.5);
    }

    #[test]
    fn wizard_followed_by_bolus_is_meal_bolus() {
        let events = vec![
            TimestampedPumpEvent::new(
                t(5),
                PumpEvent::BolusWizard {
                    carbs: 45.0,
                    carb_ratio: 10.0,
                },
            ),
            bolus(5, 30),
        ];
        let records: Vec<_> = translate(&events, "pump").collect();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].category(), TreatmentCategory::MealBolus);
        assert_eq!(records[0].payload()["carbs"], 45.0);
        assert_eq!(records[0].payload()["type"], "square");
        assert_eq!(records[0].payload()["duration"], 30);
    }

    #[test]
    fn wizard_at_other_time_is_not_merged() {
        let events = vec![
            TimestampedPumpEvent::new(
                t(0),
                PumpEvent::BolusWizard {
                    carbs: 20.0,
                    carb_ratio: 12.0,
                },
            ),
            bolus(3, 0),
        ];
        let records: Vec<_> = translate(&events, "pump").collect();
        assert_eq!(records[0].category(), TreatmentCategory::CorrectionBolus);
        assert!(records[0].payload().get("carbs").is_none());
    }

    #[test]
    fn unknown_and_rewind_are_dropped() {
        let events = vec![
            TimestampedPumpEvent::new(t(0), PumpEvent::Unknown),
            TimestampedPumpEvent::new(t(1), PumpEvent::Rewind),
            TimestampedPumpEvent::new(t(2), PumpEvent::Suspend),
            TimestampedPumpEvent::new(
                t(3),
                PumpEvent::TempBasal {
                    rate: 0.8,
                    rate_type: TempBasalType::Absolute,
                    duration_minutes: 30,
                },
            ),
            TimestampedPumpEvent::new(
                t(4),
                PumpEvent::BgReceived {
                    amount: 140,
                    meter_id: "abc".to_string(),
                },
            ),
        ];
        let categories: Vec<_> = translate(&events, "pump").map(|r| r.category()).collect();
        assert_eq!(
            categories,
            vec![
                TreatmentCategory::SuspendPump,
                TreatmentCategory::TempBasal,
                TreatmentCategory::BgCheck
            ]
        );
    }

    #[test]
    fn translation_is_restartable() {
        let events = vec![bolus(0, 0), bolus(10, 0)];
        let first: Vec<_> = translate(&events, "pump").map(|r| r.timestamp()).collect();
        let second: Vec<_> = translate(&events, "pump").map(|r| r.timestamp()).collect();
        assert_eq!(first, second);
        assert_eq!(first, vec![t(0), t(10)]);
    }

    #[test]
    fn open_bolus_sets_watermark_to_bolus_start() {
        // 30 minute square bolus at T, nothing after T+30m in the batch.
        let events = vec![
            TimestampedPumpEvent::new(t(-20), PumpEvent::Resume),
            bolus(0, 30),
            TimestampedPumpEvent::new(t(10), PumpEvent::Suspend),
        ];

        assert_eq!(oldest_open_bolus(&events), Some(t(0)));
        assert_eq!(observation_watermark(&events), Some(t(0)));
        assert_eq!(translate(&events, "pump").open_bolus_since(), Some(t(0)));
    }

    #[test]
    fn earliest_open_bolus_wins() {
        let events = vec![bolus(0, 60), bolus(10, 60), bolus(20, 0)];
        assert_eq!(oldest_open_bolus(&events), Some(t(0)));
    }

    #[test]
    fn finished_bolus_uses_newest_event() {
        let events = vec![
            bolus(0, 30),
            TimestampedPumpEvent::new(t(45), PumpEvent::Resume),
        ];
        assert_eq!(oldest_open_bolus(&events), None);
        assert_eq!(observation_watermark(&events), Some(t(45)));
    }

    #[test]
    fn bolus_ending_exactly_at_newest_is_closed() {
        let events = vec![bolus(0, 30), TimestampedPumpEvent::new(t(30), PumpEvent::Resume)];
        assert_eq!(oldest_open_bolus(&events), None);
    }

    #[test]
    fn empty_batch_has_no_watermark() {
        assert_eq!(observation_watermark(&[]), None);
        assert_eq!(translate(&[], "pump").count(), 0);
    }
}
