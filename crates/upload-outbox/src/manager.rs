//! Upload manager: record intake, flush engine and direct operations.

use crate::sender::post_records;
use crate::{
    BufferKind, BufferedRecord, CheckpointStore, Drain, ErrorObserver, LoggingObserver,
    OutboxError, OutboxResult, QueueStatus, UploadQueue,
};
use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use nightscout_gateway::{
    AuthProber, Endpoints, HttpMethod, NetworkGateway, UploadError, UploadResult,
    REMOTE_ID_SENTINEL,
};
use nightscout_records::{
    observation_watermark, reading_from_sensor_status, translate, Checkpoint,
    DeviceStatusSnapshot, MeterDeduplicator, MeterMessage, Reading, SensorStatus,
    TimestampedPumpEvent, TreatmentRecord, METER_DEVICE_NAME,
};
use parking_lot::{Mutex, RwLock};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Manager configuration.
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// Remote API paths.
    pub endpoints: Endpoints,
    /// Spawn a flush of all buffers after every enqueue.
    pub flush_on_enqueue: bool,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            endpoints: Endpoints::default(),
            flush_on_enqueue: true,
        }
    }
}

/// What a single buffer flush did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlushOutcome {
    /// Nothing was pending; the gateway was not called.
    Empty,
    /// A flush of this buffer was already in flight; this trigger was ignored.
    AlreadyFlushing,
    /// The batch was accepted; one identifier per record, in order.
    Delivered { ids: Vec<String> },
    /// The gateway failed and the batch went back to the front of the buffer.
    Requeued { count: usize },
    /// The batch was rejected in a way a retry would not fix and was discarded.
    Dropped { count: usize },
}

impl FlushOutcome {
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            FlushOutcome::Empty | FlushOutcome::AlreadyFlushing | FlushOutcome::Delivered { .. }
        )
    }
}

/// Outcome of [`UploadManager::flush_all`], per buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlushReport {
    pub device_statuses: FlushOutcome,
    pub readings: FlushOutcome,
    pub treatments: FlushOutcome,
}

impl FlushReport {
    pub fn is_success(&self) -> bool {
        self.device_statuses.is_success()
            && self.readings.is_success()
            && self.treatments.is_success()
    }
}

struct Inner {
    queue: UploadQueue,
    gateway: Arc<dyn NetworkGateway>,
    prober: AuthProber,
    config: ManagerConfig,
    observer: RwLock<Arc<dyn ErrorObserver>>,
    meter_dedup: Mutex<MeterDeduplicator>,
}

/// Store-and-forward uploader for one Nightscout site.
///
/// Cheap to clone; clones share the same queue and checkpoint.
#[derive(Clone)]
pub struct UploadManager {
    inner: Arc<Inner>,
}

impl fmt::Debug for UploadManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadManager")
            .field("endpoints", &self.inner.config.endpoints)
            .field("flush_on_enqueue", &self.inner.config.flush_on_enqueue)
            .finish_non_exhaustive()
    }
}

impl UploadManager {
    /// Create a manager, resuming the checkpoint from `store`.
    pub fn new(
        gateway: Arc<dyn NetworkGateway>,
        store: Arc<dyn CheckpointStore>,
        config: ManagerConfig,
    ) -> OutboxResult<Self> {
        let queue = UploadQueue::new(store)?;
        let prober = AuthProber::new(gateway.clone(), config.endpoints.auth_test.clone());

        Ok(Self {
            inner: Arc::new(Inner {
                queue,
                gateway,
                prober,
                config,
                observer: RwLock::new(Arc::new(LoggingObserver)),
                meter_dedup: Mutex::new(MeterDeduplicator::new()),
            }),
        })
    }

    /// Replace the sink for flush failures.
    pub fn set_error_observer(&self, observer: impl ErrorObserver + 'static) {
        *self.inner.observer.write() = Arc::new(observer);
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.inner.config.endpoints
    }

    // ========================================================================
    // Intake
    // ========================================================================

    /// Queue a reading for the entries collection.
    pub async fn enqueue_reading(&self, reading: Reading) {
        self.inner.queue.enqueue(reading).await;
        self.request_flush();
    }

    /// Queue a device status snapshot.
    pub async fn upload_device_status(&self, status: DeviceStatusSnapshot) {
        self.inner.queue.enqueue(status).await;
        self.request_flush();
    }

    /// Queue a treatment. The caller may keep the `Arc` to observe the remote
    /// identifier once the treatment is confirmed.
    pub async fn enqueue_treatment(&self, treatment: Arc<TreatmentRecord>) {
        self.inner.queue.enqueue(treatment).await;
        self.request_flush();
    }

    /// Queue the sensor reading carried by `status`, if it has one worth
    /// recording. Returns whether a reading was queued.
    pub async fn upload_sensor_status(&self, status: &SensorStatus, device: &str) -> bool {
        let Some(reading) = reading_from_sensor_status(status, device) else {
            debug!(device = %device, glucose = ?status.glucose, "Sensor status carries no reading");
            return false;
        };
        self.inner.queue.enqueue(reading).await;
        self.request_flush();
        true
    }

    /// Queue a meter reading received now, unless it is an acknowledgement
    /// or a repeat inside the deduplication window.
    pub async fn handle_meter_message(&self, message: &MeterMessage) -> bool {
        self.handle_meter_message_at(message, Utc::now()).await
    }

    /// [`UploadManager::handle_meter_message`] with an explicit receipt time.
    pub async fn handle_meter_message_at(&self, message: &MeterMessage, now: DateTime<Utc>) -> bool {
        if !self.inner.meter_dedup.lock().accept(message, now) {
            debug!(glucose = message.glucose, ack = message.ack_flag, "Meter message skipped");
            return false;
        }

        let reading = Reading::meter(message.glucose, METER_DEVICE_NAME, now);
        self.inner.queue.enqueue(reading).await;
        self.request_flush();
        true
    }

    /// Translate pump history into treatments and queue them.
    ///
    /// `observing_since` moves to the oldest bolus still delivering, or to
    /// the newest event when none is open. Returns the queued treatments.
    pub async fn process_pump_events(
        &self,
        events: &[TimestampedPumpEvent],
        source: &str,
    ) -> Vec<Arc<TreatmentRecord>> {
        if let Some(since) = observation_watermark(events) {
            self.inner.queue.update_observing_since(since).await;
        }

        let treatments: Vec<Arc<TreatmentRecord>> =
            translate(events, source).map(Arc::new).collect();
        debug!(
            source = %source,
            events = events.len(),
            treatments = treatments.len(),
            "Translated pump events"
        );

        self.inner.queue.enqueue_all(treatments.iter().cloned()).await;
        self.request_flush();
        treatments
    }

    // ========================================================================
    // Flush engine
    // ========================================================================

    fn request_flush(&self) {
        if !self.inner.config.flush_on_enqueue {
            return;
        }
        let manager = self.clone();
        tokio::spawn(async move {
            manager.flush_all().await;
        });
    }

    /// Flush all three buffers concurrently.
    pub async fn flush_all(&self) -> FlushReport {
        let (device_statuses, readings, treatments) = tokio::join!(
            self.flush_device_statuses(),
            self.flush_readings(),
            self.flush_treatments(),
        );
        FlushReport {
            device_statuses,
            readings,
            treatments,
        }
    }

    pub async fn flush_readings(&self) -> FlushOutcome {
        self.flush::<Reading>().await
    }

    pub async fn flush_device_statuses(&self) -> FlushOutcome {
        self.flush::<DeviceStatusSnapshot>().await
    }

    pub async fn flush_treatments(&self) -> FlushOutcome {
        self.flush::<Arc<TreatmentRecord>>().await
    }

    /// Drain `T`'s buffer and deliver it in one request.
    ///
    /// Gateway failures requeue the batch; a rejected response shape drops it.
    /// Either way the failure goes to the error observer, never to the caller
    /// that enqueued the records.
    pub async fn flush<T: BufferedRecord>(&self) -> FlushOutcome {
        let queue = &self.inner.queue;
        let batch = match queue.drain::<T>().await {
            Drain::Busy => return FlushOutcome::AlreadyFlushing,
            Drain::Empty => return FlushOutcome::Empty,
            Drain::Batch(batch) => batch,
        };

        let endpoint = self.endpoint_for(T::KIND);
        let count = batch.len();
        debug!(buffer = %T::KIND, ticket = %batch.ticket(), count = count, "Flushing buffer");

        match post_records(self.inner.gateway.as_ref(), endpoint, batch.records()).await {
            Ok(ids) => {
                let confirmed = T::confirm(batch.records(), &ids);
                if let Err(err) = queue.complete::<T>(batch.ticket(), confirmed).await {
                    warn!(buffer = %T::KIND, error = %err, "Failed to persist checkpoint");
                }
                info!(buffer = %T::KIND, count = count, "Delivered batch");
                FlushOutcome::Delivered { ids }
            }
            Err(failure) => {
                let outcome = if failure.requeue {
                    queue.requeue(batch).await;
                    FlushOutcome::Requeued { count }
                } else {
                    if let Err(err) = queue.complete::<T>(batch.ticket(), None).await {
                        warn!(buffer = %T::KIND, error = %err, "Failed to release buffer");
                    }
                    warn!(buffer = %T::KIND, count = count, "Dropped batch after rejected response");
                    FlushOutcome::Dropped { count }
                };
                self.report(&failure.error, T::KIND.context_label());
                outcome
            }
        }
    }

    fn endpoint_for(&self, kind: BufferKind) -> &str {
        let endpoints = &self.inner.config.endpoints;
        match kind {
            BufferKind::Readings => &endpoints.entries,
            BufferKind::DeviceStatuses => &endpoints.device_status,
            BufferKind::Treatments => &endpoints.treatments,
        }
    }

    fn report(&self, err: &UploadError, context: &str) {
        let observer = self.inner.observer.read().clone();
        observer.on_error(err, context);
    }

    // ========================================================================
    // Direct operations (not queued, not retried)
    // ========================================================================

    /// Translate and POST pump events immediately.
    pub async fn upload_pump_events(
        &self,
        events: &[TimestampedPumpEvent],
        source: &str,
    ) -> UploadResult<()> {
        let treatments: Vec<TreatmentRecord> = translate(events, source).collect();
        post_records(
            self.inner.gateway.as_ref(),
            &self.inner.config.endpoints.treatments,
            &treatments,
        )
        .await?;
        Ok(())
    }

    /// POST treatments immediately, returning one identifier per record.
    ///
    /// Confirmed identifiers are attached to the records.
    pub async fn upload_treatments(
        &self,
        treatments: &[Arc<TreatmentRecord>],
    ) -> UploadResult<Vec<String>> {
        let ids = post_records(
            self.inner.gateway.as_ref(),
            &self.inner.config.endpoints.treatments,
            treatments,
        )
        .await?;

        for (record, id) in treatments.iter().zip(&ids) {
            if id != REMOTE_ID_SENTINEL {
                record.attach_remote_id(id.clone());
            }
        }
        Ok(ids)
    }

    /// PUT each treatment concurrently; returns the first error in input order.
    ///
    /// Every treatment must carry a remote identifier.
    pub async fn modify_treatments(&self, treatments: &[Arc<TreatmentRecord>]) -> OutboxResult<()> {
        let endpoint = self.inner.config.endpoints.treatments.as_str();
        let calls = treatments.iter().map(|treatment| async move {
            if treatment.remote_id().is_none() {
                return Err(OutboxError::MissingRemoteId(treatment.timestamp().to_rfc3339()));
            }
            let payload = serde_json::to_value(treatment.as_ref()).map_err(UploadError::from)?;
            self.inner
                .gateway
                .call(Some(payload), endpoint, HttpMethod::Put)
                .await?;
            Ok(())
        });

        first_error(join_all(calls).await)
    }

    /// DELETE each treatment concurrently; returns the first error in input order.
    pub async fn delete_treatments_by_id(&self, ids: &[String]) -> OutboxResult<()> {
        let endpoints = &self.inner.config.endpoints;
        let calls = ids.iter().map(|id| async move {
            self.inner
                .gateway
                .call(None, &endpoints.treatment(id), HttpMethod::Delete)
                .await?;
            Ok(())
        });

        first_error(join_all(calls).await)
    }

    /// Validate the configured credentials.
    pub async fn check_auth(&self) -> UploadResult<()> {
        self.inner.prober.check().await
    }

    // ========================================================================
    // State
    // ========================================================================

    pub async fn status(&self) -> QueueStatus {
        self.inner.queue.status().await
    }

    pub async fn checkpoint(&self) -> Checkpoint {
        self.inner.queue.checkpoint().await
    }

    /// Forget confirmed progress and look back the default window from now.
    pub async fn reset(&self) -> OutboxResult<()> {
        self.inner.queue.reset_checkpoint(Utc::now()).await
    }

    pub fn queue(&self) -> &UploadQueue {
        &self.inner.queue
    }
}

fn first_error(results: Vec<OutboxResult<()>>) -> OutboxResult<()> {
    let total = results.len();
    let mut errors = results.into_iter().filter_map(Result::err);
    match errors.next() {
        Some(err) => {
            warn!(total = total, failed = 1 + errors.count(), error = %err, "Bulk treatment operation failed");
            Err(err)
        }
        None => Ok(()),
    }
}
