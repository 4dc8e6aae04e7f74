//! Wiring and the long-running `run` loop.

use crate::input::{device_status, DeviceInput};
use anyhow::{Context, Result};
use chrono::Utc;
use nightscout_gateway::NightscoutClient;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};
use upload_outbox::{FlushReport, JsonFileCheckpointStore, ManagerConfig, UploadManager};
use uploader_config_and_utils::{Config, Paths};

/// Pause between final flush attempts while a spawned flush is still in flight.
const DRAIN_POLL: Duration = Duration::from_millis(100);

/// Build a manager for the configured site, persisting the checkpoint under `paths`.
pub fn build_manager(config: &Config, paths: &Paths, flush_on_enqueue: bool) -> Result<UploadManager> {
    config.validate().context("invalid configuration")?;

    let client = NightscoutClient::new(
        config.site_url()?,
        &config.api_secret,
        config.request_timeout(),
    )
    .context("failed to build HTTP client")?;
    let store = JsonFileCheckpointStore::new(paths.checkpoint_file());

    let manager = UploadManager::new(
        Arc::new(client),
        Arc::new(store),
        ManagerConfig {
            endpoints: config.endpoints(),
            flush_on_enqueue,
        },
    )
    .context("failed to load checkpoint")?;
    Ok(manager)
}

/// Flush until every buffer is empty and idle, or a flush fails.
///
/// Returns the last report.
pub async fn flush_until_idle(manager: &UploadManager) -> FlushReport {
    loop {
        let report = manager.flush_all().await;
        if !report.is_success() {
            return report;
        }

        let status = manager.status().await;
        let busy = [status.readings, status.device_statuses, status.treatments]
            .iter()
            .any(|buffer| buffer.pending > 0 || buffer.flushing);
        if !busy {
            return report;
        }
        tokio::time::sleep(DRAIN_POLL).await;
    }
}

/// Route one parsed input line to the matching manager operation.
pub async fn dispatch(manager: &UploadManager, input: DeviceInput) {
    debug!(kind = input.kind(), "Device input");
    match input {
        DeviceInput::PumpEvents { source, events } => {
            let queued = manager.process_pump_events(&events, &source).await;
            info!(source = %source, events = events.len(), treatments = queued.len(), "Queued pump events");
        }
        DeviceInput::DeviceStatus { status } => {
            manager.upload_device_status(device_status(status, Utc::now())).await;
        }
        DeviceInput::SensorStatus { device, status } => {
            manager.upload_sensor_status(&status, &device).await;
        }
        DeviceInput::Meter { message } => {
            manager.handle_meter_message(&message).await;
        }
    }
}

/// Read NDJSON device input from stdin until EOF or Ctrl-C, flushing on a timer.
pub async fn run(manager: UploadManager, flush_interval: Duration) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    let mut ticker = tokio::time::interval(flush_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately.
    ticker.tick().await;

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    info!(flush_interval_secs = flush_interval.as_secs(), "Uploader running");

    let mut line_no: u64 = 0;
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("failed to read stdin")? else {
                    info!("End of input");
                    break;
                };
                line_no += 1;
                if line.trim().is_empty() {
                    continue;
                }
                match DeviceInput::parse(&line) {
                    Ok(input) => dispatch(&manager, input).await,
                    Err(e) => warn!(line = line_no, error = %e, "Skipping unreadable input"),
                }
            }
            _ = ticker.tick() => {
                let report = manager.flush_all().await;
                debug!(?report, "Periodic flush");
            }
            result = &mut shutdown => {
                result.context("failed to listen for Ctrl-C")?;
                info!("Interrupted");
                break;
            }
        }
    }

    let report = flush_until_idle(&manager).await;
    let status = manager.status().await;
    if report.is_success() {
        info!("Final flush complete");
    } else {
        warn!(
            readings = status.readings.pending,
            device_statuses = status.device_statuses.pending,
            treatments = status.treatments.pending,
            "Exiting with undelivered records"
        );
    }
    Ok(())
}
