use std::time::Duration;

use async_trait::async_trait;

use super::MemoryBackend;
use crate::{
    backend::{End, ListBackend},
    QueueError, QueueResult,
};

/// Memory backend whose blocking reads fail as if the connection reset
#[derive(Default)]
pub(crate) struct FailingBackend {
    inner: MemoryBackend,
}

impl FailingBackend {
    pub(crate) fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ListBackend for FailingBackend {
    async fn push(&self, key: &str, end: End, payload: &[u8]) -> QueueResult<()> {
        self.inner.push(key, end, payload).await
    }

    async fn pop(&self, _key: &str, _end: End, _timeout: Duration) -> QueueResult<Option<Vec<u8>>> {
        Err(QueueError::connectivity("reset"))
    }

    async fn move_one(
        &self,
        _src: &str,
        _from: End,
        _dst: &str,
        _to: End,
        _timeout: Duration,
    ) -> QueueResult<Option<Vec<u8>>> {
        Err(QueueError::connectivity("reset"))
    }

    async fn remove(&self, key: &str, payload: &[u8]) -> QueueResult<usize> {
        self.inner.remove(key, payload).await
    }

    async fn remove_first(&self, keys: &[&str], payload: &[u8]) -> QueueResult<bool> {
        self.inner.remove_first(keys, payload).await
    }

    async fn requeue(&self, src: &str, dst: &str, to: End, payload: &[u8]) -> QueueResult<bool> {
        self.inner.requeue(src, dst, to, payload).await
    }

    async fn drain(&self, src: &str, from: End, dst: &str, to: End) -> QueueResult<usize> {
        self.inner.drain(src, from, dst, to).await
    }

    async fn length(&self, key: &str) -> QueueResult<usize> {
        self.inner.length(key).await
    }

    async fn clear(&self, key: &str) -> QueueResult<()> {
        self.inner.clear(key).await
    }
}
