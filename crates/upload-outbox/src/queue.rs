//! Upload queue: pending records and the resumption checkpoint.
//!
//! All state lives in one [`QueueState`] behind a single lock, so enqueues
//! from any task never race a drain. Each buffer is FIFO and admits at most
//! one in-flight batch, identified by a ticket.

use crate::{CheckpointStore, OutboxError, OutboxResult};
use chrono::{DateTime, Utc};
use nightscout_gateway::REMOTE_ID_SENTINEL;
use nightscout_records::{Checkpoint, DeviceStatusSnapshot, Reading, TreatmentRecord};
use serde::Serialize;
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Identifies one of the three independent buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferKind {
    Readings,
    DeviceStatuses,
    Treatments,
}

impl BufferKind {
    /// Context label passed to the error observer when this buffer fails to flush.
    pub fn context_label(&self) -> &'static str {
        match self {
            BufferKind::Readings => "Uploading nightscout entries",
            BufferKind::DeviceStatuses => "Uploading device status",
            BufferKind::Treatments => "Uploading nightscout treatment records",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BufferKind::Readings => "readings",
            BufferKind::DeviceStatuses => "device_statuses",
            BufferKind::Treatments => "treatments",
        }
    }
}

impl fmt::Display for BufferKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One FIFO buffer and its in-flight marker.
#[derive(Debug)]
pub struct Buffer<T> {
    pending: VecDeque<T>,
    in_flight: Option<Uuid>,
}

impl<T> Default for Buffer<T> {
    fn default() -> Self {
        Self {
            pending: VecDeque::new(),
            in_flight: None,
        }
    }
}

/// Everything guarded by the queue lock.
#[derive(Debug)]
pub struct QueueState {
    readings: Buffer<Reading>,
    device_statuses: Buffer<DeviceStatusSnapshot>,
    treatments: Buffer<Arc<TreatmentRecord>>,
    checkpoint: Checkpoint,
}

/// A record type with its own buffer in the queue.
pub trait BufferedRecord: Serialize + Send + Sync + Sized + 'static {
    const KIND: BufferKind;

    fn buffer(state: &QueueState) -> &Buffer<Self>;

    fn buffer_mut(state: &mut QueueState) -> &mut Buffer<Self>;

    /// Hook run after a batch was accepted by the remote API, with one
    /// identifier per record. Returns the timestamp to confirm in the
    /// checkpoint, if this record type advances it.
    fn confirm(_batch: &[Self], _ids: &[String]) -> Option<DateTime<Utc>> {
        None
    }
}

impl BufferedRecord for Reading {
    const KIND: BufferKind = BufferKind::Readings;

    fn buffer(state: &QueueState) -> &Buffer<Self> {
        &state.readings
    }

    fn buffer_mut(state: &mut QueueState) -> &mut Buffer<Self> {
        &mut state.readings
    }
}

impl BufferedRecord for DeviceStatusSnapshot {
    const KIND: BufferKind = BufferKind::DeviceStatuses;

    fn buffer(state: &QueueState) -> &Buffer<Self> {
        &state.device_statuses
    }

    fn buffer_mut(state: &mut QueueState) -> &mut Buffer<Self> {
        &mut state.device_statuses
    }
}

impl BufferedRecord for Arc<TreatmentRecord> {
    const KIND: BufferKind = BufferKind::Treatments;

    fn buffer(state: &QueueState) -> &Buffer<Self> {
        &state.treatments
    }

    fn buffer_mut(state: &mut QueueState) -> &mut Buffer<Self> {
        &mut state.treatments
    }

    fn confirm(batch: &[Self], ids: &[String]) -> Option<DateTime<Utc>> {
        for (record, id) in batch.iter().zip(ids) {
            if id != REMOTE_ID_SENTINEL {
                record.attach_remote_id(id.clone());
            }
        }
        batch.last().map(|record| record.timestamp())
    }
}

/// A drained snapshot of one buffer, owned by the flush that drained it.
#[derive(Debug)]
pub struct DrainedBatch<T> {
    ticket: Uuid,
    records: Vec<T>,
}

impl<T> DrainedBatch<T> {
    pub fn ticket(&self) -> Uuid {
        self.ticket
    }

    pub fn records(&self) -> &[T] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Result of [`UploadQueue::drain`].
#[derive(Debug)]
pub enum Drain<T> {
    /// Another flush of this buffer is still in flight.
    Busy,
    /// Nothing pending.
    Empty,
    /// The buffer's full contents, now in flight.
    Batch(DrainedBatch<T>),
}

/// Snapshot of one buffer for status reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferStatus {
    pub pending: usize,
    pub flushing: bool,
}

impl<T> From<&Buffer<T>> for BufferStatus {
    fn from(buffer: &Buffer<T>) -> Self {
        Self {
            pending: buffer.pending.len(),
            flushing: buffer.in_flight.is_some(),
        }
    }
}

/// Snapshot of the whole queue.
#[derive(Debug, Clone, PartialEq)]
pub struct QueueStatus {
    pub readings: BufferStatus,
    pub device_statuses: BufferStatus,
    pub treatments: BufferStatus,
    pub checkpoint: Checkpoint,
}

/// Pending records plus the checkpoint, behind one lock.
pub struct UploadQueue {
    state: Mutex<QueueState>,
    store: Arc<dyn CheckpointStore>,
    /// Serializes writes to `store`; never held together with `state`.
    persist: Mutex<()>,
}

impl UploadQueue {
    /// Create an empty queue, resuming the checkpoint from `store`.
    pub fn new(store: Arc<dyn CheckpointStore>) -> OutboxResult<Self> {
        Self::resume_at(store, Utc::now())
    }

    /// Like [`UploadQueue::new`] with an explicit clock reading.
    pub fn resume_at(store: Arc<dyn CheckpointStore>, now: DateTime<Utc>) -> OutboxResult<Self> {
        let checkpoint = Checkpoint::resume(store.load()?, now);
        info!(
            observing_since = %checkpoint.observing_since,
            last_confirmed = ?checkpoint.last_confirmed_treatment_timestamp,
            "Upload queue resumed"
        );

        Ok(Self {
            state: Mutex::new(QueueState {
                readings: Buffer::default(),
                device_statuses: Buffer::default(),
                treatments: Buffer::default(),
                checkpoint,
            }),
            store,
            persist: Mutex::new(()),
        })
    }

    /// Append a record to its buffer.
    pub async fn enqueue<T: BufferedRecord>(&self, record: T) {
        let mut state = self.state.lock().await;
        let buffer = T::buffer_mut(&mut state);
        buffer.pending.push_back(record);
        debug!(buffer = %T::KIND, pending = buffer.pending.len(), "Enqueued record");
    }

    /// Append several records, preserving their order.
    pub async fn enqueue_all<T: BufferedRecord>(&self, records: impl IntoIterator<Item = T>) {
        let mut state = self.state.lock().await;
        let buffer = T::buffer_mut(&mut state);
        buffer.pending.extend(records);
        debug!(buffer = %T::KIND, pending = buffer.pending.len(), "Enqueued records");
    }

    /// Atomically take the buffer's entire contents and mark it in flight.
    ///
    /// Returns [`Drain::Busy`] while a previous batch is still in flight and
    /// [`Drain::Empty`] when there is nothing to send; neither changes state.
    pub async fn drain<T: BufferedRecord>(&self) -> Drain<T> {
        let mut state = self.state.lock().await;
        let buffer = T::buffer_mut(&mut state);

        if buffer.in_flight.is_some() {
            debug!(buffer = %T::KIND, "Flush already in flight");
            return Drain::Busy;
        }
        if buffer.pending.is_empty() {
            return Drain::Empty;
        }

        let ticket = Uuid::new_v4();
        let records: Vec<T> = buffer.pending.drain(..).collect();
        buffer.in_flight = Some(ticket);

        debug!(buffer = %T::KIND, ticket = %ticket, count = records.len(), "Drained batch");
        Drain::Batch(DrainedBatch { ticket, records })
    }

    /// Put a failed batch back in front of anything enqueued since it was
    /// drained, and clear the in-flight marker.
    pub async fn requeue<T: BufferedRecord>(&self, batch: DrainedBatch<T>) {
        let mut state = self.state.lock().await;
        let buffer = T::buffer_mut(&mut state);

        if buffer.in_flight != Some(batch.ticket) {
            warn!(buffer = %T::KIND, ticket = %batch.ticket, "Requeue with stale ticket");
        }

        let count = batch.records.len();
        for record in batch.records.into_iter().rev() {
            buffer.pending.push_front(record);
        }
        buffer.in_flight = None;

        warn!(
            buffer = %T::KIND,
            ticket = %batch.ticket,
            count = count,
            pending = buffer.pending.len(),
            "Batch returned for retry"
        );
    }

    /// Finish the in-flight batch `ticket`, optionally confirming a treatment
    /// timestamp first.
    ///
    /// The in-flight marker is cleared even if persisting the checkpoint fails.
    pub async fn complete<T: BufferedRecord>(
        &self,
        ticket: Uuid,
        confirmed: Option<DateTime<Utc>>,
    ) -> OutboxResult<()> {
        let advanced = {
            let mut state = self.state.lock().await;

            let buffer = T::buffer_mut(&mut state);
            if buffer.in_flight == Some(ticket) {
                buffer.in_flight = None;
            } else {
                warn!(buffer = %T::KIND, ticket = %ticket, "Completion with stale ticket");
            }

            confirmed.is_some_and(|timestamp| Self::advance_locked(&mut state, timestamp))
        };

        if advanced {
            self.persist_checkpoint().await?;
        }
        Ok(())
    }

    /// Move `last_confirmed_treatment_timestamp` forward if `timestamp` is newer.
    ///
    /// Returns true if the watermark changed (and was persisted).
    pub async fn advance_checkpoint(&self, timestamp: DateTime<Utc>) -> OutboxResult<bool> {
        let advanced = Self::advance_locked(&mut *self.state.lock().await, timestamp);
        if advanced {
            self.persist_checkpoint().await?;
        }
        Ok(advanced)
    }

    fn advance_locked(state: &mut QueueState, timestamp: DateTime<Utc>) -> bool {
        if !state.checkpoint.advance(timestamp) {
            debug!(timestamp = %timestamp, "Checkpoint not advanced (not newer)");
            return false;
        }
        info!(timestamp = %timestamp, "Checkpoint advanced");
        true
    }

    /// Write the current in-memory watermark to the store.
    ///
    /// Runs on the blocking pool without the state lock, so enqueues and
    /// drains proceed during disk I/O. The value is read after taking the
    /// persist lock, so the last write always carries the newest watermark.
    async fn persist_checkpoint(&self) -> OutboxResult<()> {
        let _guard = self.persist.lock().await;
        let value = self
            .state
            .lock()
            .await
            .checkpoint
            .last_confirmed_treatment_timestamp;

        let store = self.store.clone();
        tokio::task::spawn_blocking(move || store.save(value))
            .await
            .map_err(|e| OutboxError::Checkpoint(format!("save task failed: {e}")))?
    }

    /// Set `observing_since` unconditionally.
    pub async fn update_observing_since(&self, timestamp: DateTime<Utc>) {
        let mut state = self.state.lock().await;
        state.checkpoint.observing_since = timestamp;
        debug!(observing_since = %timestamp, "Observing pump events since");
    }

    /// Forget confirmed progress and look back the default window from `now`.
    pub async fn reset_checkpoint(&self, now: DateTime<Utc>) -> OutboxResult<()> {
        {
            let mut state = self.state.lock().await;
            state.checkpoint.reset(now);
            info!(observing_since = %state.checkpoint.observing_since, "Checkpoint reset");
        }
        self.persist_checkpoint().await
    }

    pub async fn checkpoint(&self) -> Checkpoint {
        self.state.lock().await.checkpoint
    }

    /// Copy of the records currently pending in `T`'s buffer, in order.
    pub async fn pending<T: BufferedRecord + Clone>(&self) -> Vec<T> {
        let state = self.state.lock().await;
        T::buffer(&state).pending.iter().cloned().collect()
    }

    pub async fn pending_count<T: BufferedRecord>(&self) -> usize {
        T::buffer(&*self.state.lock().await).pending.len()
    }

    pub async fn is_flushing<T: BufferedRecord>(&self) -> bool {
        T::buffer(&*self.state.lock().await).in_flight.is_some()
    }

    pub async fn status(&self) -> QueueStatus {
        let state = self.state.lock().await;
        QueueStatus {
            readings: BufferStatus::from(&state.readings),
            device_statuses: BufferStatus::from(&state.device_statuses),
            treatments: BufferStatus::from(&state.treatments),
            checkpoint: state.checkpoint,
        }
    }
}
