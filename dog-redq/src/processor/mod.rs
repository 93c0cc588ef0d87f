//! Strategies for how a queue physically stores and yields items.
//!
//! A processor is stateless: it is handed the backend and keyspace names on
//! every call. Variants differ only in which list ends they push to and pull
//! from, so they normally override [`Processor::push_end`] and
//! [`Processor::pull_end`] and inherit the rest. A strategy with a different
//! storage shape can override the operations themselves.

pub mod fifo;
pub mod lifo;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::{
    backend::{End, ListBackend},
    QueueResult,
};

pub use fifo::Fifo;
pub use lifo::Lifo;

#[async_trait]
pub trait Processor: Send + Sync + fmt::Debug {
    /// Short name for logs
    fn name(&self) -> &'static str;

    /// End new items are inserted at
    fn push_end(&self) -> End;

    /// End items are taken from
    fn pull_end(&self) -> End;

    /// Insert `payload` into `key`; never blocks
    async fn push(&self, backend: &dyn ListBackend, key: &str, payload: &[u8]) -> QueueResult<()> {
        backend.push(key, self.push_end(), payload).await
    }

    /// Take the next item from `key`, waiting at most `timeout`
    async fn pull(
        &self,
        backend: &dyn ListBackend,
        key: &str,
        timeout: Duration,
    ) -> QueueResult<Option<Vec<u8>>> {
        backend.pop(key, self.pull_end(), timeout).await
    }

    /// Take the next item from `src` and atomically park it in `dst`.
    ///
    /// Items land at the left of `dst`, so the oldest relocation sits at the right.
    async fn pull_to(
        &self,
        backend: &dyn ListBackend,
        src: &str,
        dst: &str,
        timeout: Duration,
    ) -> QueueResult<Option<Vec<u8>>> {
        backend.move_one(src, self.pull_end(), dst, End::Left, timeout).await
    }

    /// Move one parked `payload` from `parked` back into `key` as if newly pushed
    async fn requeue(
        &self,
        backend: &dyn ListBackend,
        parked: &str,
        key: &str,
        payload: &[u8],
    ) -> QueueResult<bool> {
        backend.requeue(parked, key, self.push_end(), payload).await
    }

    /// Move everything parked in `parked` back into `key`, oldest first
    async fn requeue_all(&self, backend: &dyn ListBackend, parked: &str, key: &str) -> QueueResult<usize> {
        backend.drain(parked, End::Right, key, self.push_end()).await
    }
}

/// Processor used when none is configured
pub fn default_processor() -> Arc<dyn Processor> {
    Arc::new(Fifo)
}
