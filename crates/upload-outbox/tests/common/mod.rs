#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use nightscout_gateway::{HttpMethod, NetworkGateway, UploadError, UploadResult};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::Semaphore;
use upload_outbox::{ManagerConfig, MemoryCheckpointStore, UploadManager};

/// One recorded gateway call.
#[derive(Debug, Clone)]
pub struct Call {
    pub payload: Option<Value>,
    pub endpoint: String,
    pub method: HttpMethod,
}

/// In-memory gateway driven by a script of results.
///
/// Once the script is exhausted every POST succeeds with one `_id` per
/// submitted record. With a gate installed, each call waits for
/// [`FakeGateway::release`] before answering.
#[derive(Default)]
pub struct FakeGateway {
    script: Mutex<VecDeque<UploadResult<Value>>>,
    calls: Mutex<Vec<Call>>,
    gate: Option<Gate>,
}

struct Gate {
    entered: Semaphore,
    release: Semaphore,
}

impl Default for Gate {
    fn default() -> Self {
        Self {
            entered: Semaphore::new(0),
            release: Semaphore::new(0),
        }
    }
}

impl FakeGateway {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn scripted(results: Vec<UploadResult<Value>>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(results.into()),
            ..Self::default()
        })
    }

    pub fn gated(results: Vec<UploadResult<Value>>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(results.into()),
            gate: Some(Gate::default()),
            ..Self::default()
        })
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// Wait until a call has reached the gate.
    pub async fn entered(&self) {
        if let Some(gate) = &self.gate {
            gate.entered
                .acquire()
                .await
                .expect("gate closed")
                .forget();
        }
    }

    /// Let one gated call answer.
    pub fn release(&self) {
        if let Some(gate) = &self.gate {
            gate.release.add_permits(1);
        }
    }
}

#[async_trait]
impl NetworkGateway for FakeGateway {
    async fn call(
        &self,
        payload: Option<Value>,
        endpoint: &str,
        method: HttpMethod,
    ) -> UploadResult<Value> {
        self.calls.lock().push(Call {
            payload: payload.clone(),
            endpoint: endpoint.to_string(),
            method,
        });

        if let Some(gate) = &self.gate {
            gate.entered.add_permits(1);
            gate.release
                .acquire()
                .await
                .expect("gate closed")
                .forget();
        }

        if let Some(result) = self.script.lock().pop_front() {
            return result;
        }
        let count = payload
            .as_ref()
            .and_then(Value::as_array)
            .map(Vec::len)
            .unwrap_or(0);
        Ok(Value::Array(
            (0..count).map(|i| json!({ "_id": format!("remote-{i}") })).collect(),
        ))
    }
}

pub fn transport_failure() -> UploadResult<Value> {
    Err(UploadError::Transport("connection reset".to_string()))
}

/// Manager with no automatic flushing and an in-memory checkpoint.
pub fn manager(gateway: Arc<FakeGateway>) -> UploadManager {
    UploadManager::new(
        gateway,
        Arc::new(MemoryCheckpointStore::default()),
        ManagerConfig {
            flush_on_enqueue: false,
            ..ManagerConfig::default()
        },
    )
    .expect("failed to create manager")
}

/// Manager with the default configuration, which flushes after every enqueue.
pub fn auto_flush_manager(gateway: Arc<FakeGateway>) -> UploadManager {
    UploadManager::new(
        gateway,
        Arc::new(MemoryCheckpointStore::default()),
        ManagerConfig::default(),
    )
    .expect("failed to create manager")
}

/// Poll until every buffer is empty and nothing is in flight.
pub async fn wait_until_idle(manager: &UploadManager) {
    let idle = async {
        loop {
            let status = manager.status().await;
            let buffers = [status.readings, status.device_statuses, status.treatments];
            if buffers.iter().all(|b| b.pending == 0 && !b.flushing) {
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
    };
    tokio::time::timeout(std::time::Duration::from_secs(2), idle)
        .await
        .expect("manager never became idle");
}

pub fn at(minute: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 10, 5, 6, 0, 0).unwrap() + Duration::minutes(minute)
}

/// Glucose values in a posted entries body, in order.
pub fn posted_values(call: &Call) -> Vec<i64> {
    call.payload
        .as_ref()
        .and_then(Value::as_array)
        .map(|records| {
            records
                .iter()
                .filter_map(|r| r.get("mbg").or_else(|| r.get("sgv")).and_then(Value::as_i64))
                .collect()
        })
        .unwrap_or_default()
}
