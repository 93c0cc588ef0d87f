#[cfg(feature = "memory")]
pub mod memory;

#[cfg(feature = "redis")]
pub mod redis;

use std::time::Duration;

use async_trait::async_trait;

use crate::QueueResult;

/// One end of a list keyspace
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum End {
    Left,
    Right,
}

impl End {
    /// Direction argument as spelled by `LMOVE`/`BLMOVE`
    pub fn as_arg(self) -> &'static str {
        match self {
            Self::Left => "LEFT",
            Self::Right => "RIGHT",
        }
    }
}

/// Backend trait for keyed-list storage primitives.
///
/// Every method is a single round trip and is atomic with respect to every
/// other method. Blocking methods take a `timeout`; `Duration::ZERO` blocks
/// until data arrives and any other value returns `Ok(None)` once it elapses.
#[async_trait]
pub trait ListBackend: Send + Sync {
    /// Insert `payload` at `end` of `key` without blocking
    async fn push(&self, key: &str, end: End, payload: &[u8]) -> QueueResult<()>;

    /// Pop from `end` of `key`, waiting up to `timeout` for an item
    async fn pop(&self, key: &str, end: End, timeout: Duration) -> QueueResult<Option<Vec<u8>>>;

    /// Pop from `from` of `src` and push at `to` of `dst` as one indivisible
    /// step, waiting up to `timeout` for `src` to hold an item
    async fn move_one(
        &self,
        src: &str,
        from: End,
        dst: &str,
        to: End,
        timeout: Duration,
    ) -> QueueResult<Option<Vec<u8>>>;

    /// Remove one occurrence of `payload` from `key`, returning how many were removed
    async fn remove(&self, key: &str, payload: &[u8]) -> QueueResult<usize>;

    /// Remove one occurrence of `payload` from the first of `keys` holding one.
    /// Returns false when no key held it.
    async fn remove_first(&self, keys: &[&str], payload: &[u8]) -> QueueResult<bool>;

    /// Remove one occurrence of `payload` from `src` and, only if one was
    /// removed, push it at `to` of `dst`
    async fn requeue(&self, src: &str, dst: &str, to: End, payload: &[u8]) -> QueueResult<bool>;

    /// Move every item of `src` into `dst`, popping at `from` and pushing at `to`.
    /// Returns the number of items moved.
    async fn drain(&self, src: &str, from: End, dst: &str, to: End) -> QueueResult<usize>;

    /// Number of items in `key`
    async fn length(&self, key: &str) -> QueueResult<usize>;

    /// Delete `key` entirely
    async fn clear(&self, key: &str) -> QueueResult<()>;
}
