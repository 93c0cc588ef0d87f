use chrono::{DateTime, Utc};

use super::WorkerId;

/// A payload checked out by a worker.
///
/// The backing store has no task ids: a task *is* its byte sequence, sitting
/// in the worker's in-flight keyspace until it is completed or abandoned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    payload: Vec<u8>,
    source: String,
    worker_id: WorkerId,
    received_at: DateTime<Utc>,
}

impl Task {
    pub fn new(payload: Vec<u8>, source: impl Into<String>, worker_id: WorkerId) -> Self {
        Self {
            payload,
            source: source.into(),
            worker_id,
            received_at: Utc::now(),
        }
    }

    /// Raw payload bytes, exactly as pushed
    pub fn bytes(&self) -> &[u8] {
        &self.payload
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.payload
    }

    /// Main keyspace the task was pulled from
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn worker_id(&self) -> &WorkerId {
        &self.worker_id
    }

    /// When the task was relocated into the worker's keyspace
    pub fn received_at(&self) -> DateTime<Utc> {
        self.received_at
    }

    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}

impl AsRef<[u8]> for Task {
    fn as_ref(&self) -> &[u8] {
        &self.payload
    }
}
