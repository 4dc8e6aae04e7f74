//! Store-and-forward delivery of Nightscout records.
//!
//! This crate provides:
//! - UploadQueue: three FIFO buffers plus the resumption checkpoint behind one lock
//! - UploadManager: flush engine, record intake and direct (unbuffered) operations
//! - CheckpointStore: persistence seam for the confirmed-treatment watermark
//! - ErrorObserver: sink for flush failures, which never reach enqueue callers

mod checkpoint_store;
mod error;
mod manager;
mod observer;
mod queue;
mod sender;

pub use checkpoint_store::{CheckpointStore, JsonFileCheckpointStore, MemoryCheckpointStore};
pub use error::{OutboxError, OutboxResult};
pub use manager::{FlushOutcome, FlushReport, ManagerConfig, UploadManager};
pub use observer::{ErrorObserver, LoggingObserver};
pub use queue::{
    Buffer, BufferKind, BufferStatus, BufferedRecord, Drain, DrainedBatch, QueueState,
    QueueStatus, UploadQueue,
};
