mod common;

use common::{
    at, auto_flush_manager, manager, posted_values, transport_failure, wait_until_idle,
    FakeGateway,
};
use nightscout_gateway::{HttpMethod, UploadError, REMOTE_ID_SENTINEL};
use nightscout_records::{PumpEvent, Reading, TimestampedPumpEvent, TreatmentCategory, TreatmentRecord};
use serde_json::{json, Map};
use std::sync::Arc;
use upload_outbox::FlushOutcome;

fn meter(value: i32) -> Reading {
    Reading::meter(value, "meter-1", at(0))
}

fn treatment(minute: i64) -> Arc<TreatmentRecord> {
    Arc::new(TreatmentRecord::new(
        at(minute),
        TreatmentCategory::Note,
        "loop://pump",
        Map::new(),
    ))
}

#[tokio::test]
async fn failed_batch_keeps_order_ahead_of_newer_records() {
    let gateway = FakeGateway::scripted(vec![transport_failure()]);
    let manager = manager(gateway.clone());

    manager.enqueue_reading(meter(1)).await;
    manager.enqueue_reading(meter(2)).await;
    assert_eq!(
        manager.flush_readings().await,
        FlushOutcome::Requeued { count: 2 }
    );

    manager.enqueue_reading(meter(3)).await;
    let outcome = manager.flush_readings().await;
    assert!(outcome.is_success(), "second flush failed: {outcome:?}");

    let calls = gateway.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(posted_values(&calls[0]), vec![1, 2]);
    assert_eq!(posted_values(&calls[1]), vec![1, 2, 3]);
}

#[tokio::test]
async fn records_enqueued_during_failed_call_stay_behind_requeued_batch() {
    let gateway = FakeGateway::gated(vec![transport_failure()]);
    let manager = manager(gateway.clone());

    manager.enqueue_reading(meter(1)).await;
    manager.enqueue_reading(meter(2)).await;

    let flushing = tokio::spawn({
        let manager = manager.clone();
        async move { manager.flush_readings().await }
    });
    gateway.entered().await;
    manager.enqueue_reading(meter(3)).await;
    gateway.release();
    assert_eq!(flushing.await.unwrap(), FlushOutcome::Requeued { count: 2 });

    let pending: Vec<i32> = manager
        .queue()
        .pending::<Reading>()
        .await
        .iter()
        .map(|r| r.value)
        .collect();
    assert_eq!(pending, vec![1, 2, 3]);
}

#[tokio::test]
async fn second_trigger_while_in_flight_is_ignored() {
    let gateway = FakeGateway::gated(vec![]);
    let manager = manager(gateway.clone());

    manager.enqueue_reading(meter(1)).await;

    let first = tokio::spawn({
        let manager = manager.clone();
        async move { manager.flush_readings().await }
    });
    gateway.entered().await;

    manager.enqueue_reading(meter(2)).await;
    assert_eq!(manager.flush_readings().await, FlushOutcome::AlreadyFlushing);
    assert!(manager.status().await.readings.flushing);

    gateway.release();
    assert!(matches!(first.await.unwrap(), FlushOutcome::Delivered { ref ids } if ids.len() == 1));
    assert_eq!(gateway.call_count(), 1);

    let status = manager.status().await;
    assert!(!status.readings.flushing);
    assert_eq!(status.readings.pending, 1);
}

#[tokio::test]
async fn buffers_flush_independently() {
    let gateway = FakeGateway::gated(vec![]);
    let manager = manager(gateway.clone());

    manager.enqueue_reading(meter(1)).await;
    let readings = tokio::spawn({
        let manager = manager.clone();
        async move { manager.flush_readings().await }
    });
    gateway.entered().await;

    // Treatments are not blocked by the in-flight readings call.
    manager.enqueue_treatment(treatment(1)).await;
    let treatments = tokio::spawn({
        let manager = manager.clone();
        async move { manager.flush_treatments().await }
    });
    gateway.entered().await;
    assert_eq!(gateway.call_count(), 2);

    gateway.release();
    gateway.release();
    assert!(readings.await.unwrap().is_success());
    assert!(treatments.await.unwrap().is_success());
}

#[tokio::test]
async fn checkpoint_never_regresses_on_out_of_order_batches() {
    let gateway = FakeGateway::new();
    let manager = manager(gateway);

    for minute in [10, 20, 10] {
        manager.enqueue_treatment(treatment(minute)).await;
        assert!(manager.flush_treatments().await.is_success());
    }

    assert_eq!(
        manager.checkpoint().await.last_confirmed_treatment_timestamp,
        Some(at(20))
    );
}

#[tokio::test]
async fn failed_treatment_flush_does_not_advance_checkpoint() {
    let gateway = FakeGateway::scripted(vec![Err(UploadError::HttpStatus {
        status: 503,
        body: "maintenance".to_string(),
    })]);
    let manager = manager(gateway);

    manager.enqueue_treatment(treatment(5)).await;
    assert_eq!(
        manager.flush_treatments().await,
        FlushOutcome::Requeued { count: 1 }
    );
    assert_eq!(manager.checkpoint().await.last_confirmed_treatment_timestamp, None);
}

#[tokio::test]
async fn meter_dedup_window() {
    let manager = manager(FakeGateway::new());
    let reading = nightscout_records::MeterMessage {
        glucose: 140,
        ack_flag: false,
    };

    assert!(manager.handle_meter_message_at(&reading, at(0)).await);
    assert!(!manager.handle_meter_message_at(&reading, at(2)).await);
    assert!(manager.handle_meter_message_at(&reading, at(6)).await);
    assert_eq!(manager.status().await.readings.pending, 2);
}

#[tokio::test]
async fn open_bolus_holds_observation_watermark() {
    let manager = manager(FakeGateway::new());
    let events = vec![
        TimestampedPumpEvent::new(
            at(0),
            PumpEvent::BolusNormal {
                amount: 0.5,
                programmed: 2.0,
                unabsorbed_insulin: 0.0,
                duration_minutes: 30,
            },
        ),
        TimestampedPumpEvent::new(at(10), PumpEvent::Suspend),
        TimestampedPumpEvent::new(at(20), PumpEvent::Resume),
    ];

    manager.process_pump_events(&events, "pump").await;

    assert_eq!(manager.checkpoint().await.observing_since, at(0));
}

#[tokio::test]
async fn missing_remote_ids_fall_back_to_sentinel() {
    let gateway = FakeGateway::scripted(vec![Ok(json!([{}, {"name": "x"}]))]);
    let manager = manager(gateway);

    let first = treatment(1);
    manager.enqueue_treatment(first.clone()).await;
    manager.enqueue_treatment(treatment(2)).await;

    let outcome = manager.flush_treatments().await;
    assert_eq!(
        outcome,
        FlushOutcome::Delivered {
            ids: vec![REMOTE_ID_SENTINEL.to_string(); 2]
        }
    );
    assert!(outcome.is_success());
    assert_eq!(first.remote_id(), None);
    assert_eq!(
        manager.checkpoint().await.last_confirmed_treatment_timestamp,
        Some(at(2))
    );
}

#[tokio::test]
async fn auth_probe_classifies_statuses() {
    let gateway = FakeGateway::scripted(vec![
        Err(UploadError::HttpStatus {
            status: 401,
            body: "Unauthorized".to_string(),
        }),
        Err(UploadError::HttpStatus {
            status: 500,
            body: "Internal Server Error".to_string(),
        }),
    ]);
    let manager = manager(gateway.clone());

    assert!(matches!(
        manager.check_auth().await,
        Err(UploadError::Unauthorized)
    ));
    match manager.check_auth().await {
        Err(UploadError::HttpStatus { status, body }) => {
            assert_eq!(status, 500);
            assert_eq!(body, "Internal Server Error");
        }
        other => panic!("unexpected result: {other:?}"),
    }

    let calls = gateway.calls();
    assert!(calls.iter().all(|call| {
        call.method == HttpMethod::Get
            && call.payload.is_none()
            && call.endpoint == "/api/v1/experiments/test"
    }));
}

#[tokio::test]
async fn empty_flush_never_calls_gateway() {
    let gateway = FakeGateway::new();
    let manager = manager(gateway.clone());

    assert_eq!(manager.flush_readings().await, FlushOutcome::Empty);
    let report = manager.flush_all().await;
    assert!(report.is_success());
    assert_eq!(report.device_statuses, FlushOutcome::Empty);
    assert_eq!(report.treatments, FlushOutcome::Empty);
    assert_eq!(gateway.call_count(), 0);
}

#[tokio::test]
async fn enqueue_alone_delivers_records() {
    let gateway = FakeGateway::new();
    let manager = auto_flush_manager(gateway.clone());

    let note = treatment(4);
    manager.enqueue_reading(meter(7)).await;
    manager.enqueue_treatment(note.clone()).await;
    wait_until_idle(&manager).await;

    let entries: Vec<i64> = gateway
        .calls()
        .iter()
        .filter(|call| call.endpoint == manager.endpoints().entries)
        .flat_map(posted_values)
        .collect();
    assert_eq!(entries, vec![7]);
    assert_eq!(note.remote_id(), Some("remote-0"));
    assert_eq!(
        manager.checkpoint().await.last_confirmed_treatment_timestamp,
        Some(at(4))
    );
}

#[tokio::test]
async fn burst_of_enqueues_drains_in_order_and_goes_idle() {
    let gateway = FakeGateway::new();
    let manager = auto_flush_manager(gateway.clone());

    for value in 1..=6 {
        manager.enqueue_reading(meter(value)).await;
    }
    wait_until_idle(&manager).await;

    let calls = gateway.calls();
    assert!(!calls.is_empty() && calls.len() <= 6, "calls: {}", calls.len());
    let delivered: Vec<i64> = calls.iter().flat_map(posted_values).collect();
    assert_eq!(delivered, vec![1, 2, 3, 4, 5, 6]);

    let status = manager.status().await;
    assert_eq!(status.readings.pending, 0);
    assert!(!status.readings.flushing);
}
