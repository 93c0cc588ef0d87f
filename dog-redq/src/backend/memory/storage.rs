use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::time::Instant;

use crate::{
    backend::{End, ListBackend},
    QueueResult,
};

type Lists = HashMap<String, VecDeque<Vec<u8>>>;

/// In-memory backend for testing and embedded use.
///
/// All lists live behind one lock, which makes every operation atomic.
/// Blocked pops park on a shared `Notify` and re-check after each insert.
pub struct MemoryBackend {
    /// key -> list, left end at the front
    pub(crate) lists: Mutex<Lists>,

    /// Signalled whenever an item lands in any list
    pub(crate) arrivals: Notify,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            lists: Mutex::new(HashMap::new()),
            arrivals: Notify::new(),
        }
    }

    /// Copy of the items in `key`, left to right
    pub fn contents(&self, key: &str) -> Vec<Vec<u8>> {
        self.lists
            .lock()
            .get(key)
            .map(|list| list.iter().cloned().collect())
            .unwrap_or_default()
    }

    fn take(lists: &mut Lists, key: &str, end: End) -> Option<Vec<u8>> {
        let list = lists.get_mut(key)?;
        let item = match end {
            End::Left => list.pop_front(),
            End::Right => list.pop_back(),
        };
        if list.is_empty() {
            lists.remove(key);
        }
        item
    }

    fn put(lists: &mut Lists, key: &str, end: End, payload: Vec<u8>) {
        let list = lists.entry(key.to_string()).or_default();
        match end {
            End::Left => list.push_front(payload),
            End::Right => list.push_back(payload),
        }
    }

    /// Removes the occurrence closest to the left end, like `LREM key 1`
    fn remove_one(lists: &mut Lists, key: &str, payload: &[u8]) -> bool {
        let Some(list) = lists.get_mut(key) else {
            return false;
        };
        let Some(index) = list.iter().position(|item| item.as_slice() == payload) else {
            return false;
        };
        list.remove(index);
        if list.is_empty() {
            lists.remove(key);
        }
        true
    }

    /// Retry `attempt` under the lock until it yields or `timeout` elapses
    async fn wait_for<T, F>(&self, timeout: Duration, mut attempt: F) -> Option<T>
    where
        F: FnMut(&mut Lists) -> Option<T> + Send,
        T: Send,
    {
        let deadline = (!timeout.is_zero()).then(|| Instant::now() + timeout);

        loop {
            // Register before checking so an insert between the check and
            // the await still wakes us.
            let notified = self.arrivals.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let ready = {
                let mut lists = self.lists.lock();
                attempt(&mut lists)
            };
            if ready.is_some() {
                return ready;
            }

            match deadline {
                Some(deadline) => {
                    if tokio::time::timeout_at(deadline, notified).await.is_err() {
                        return None;
                    }
                }
                None => notified.await,
            }
        }
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ListBackend for MemoryBackend {
    async fn push(&self, key: &str, end: End, payload: &[u8]) -> QueueResult<()> {
        Self::put(&mut self.lists.lock(), key, end, payload.to_vec());
        self.arrivals.notify_waiters();
        Ok(())
    }

    async fn pop(&self, key: &str, end: End, timeout: Duration) -> QueueResult<Option<Vec<u8>>> {
        Ok(self.wait_for(timeout, |lists| Self::take(lists, key, end)).await)
    }

    async fn move_one(
        &self,
        src: &str,
        from: End,
        dst: &str,
        to: End,
        timeout: Duration,
    ) -> QueueResult<Option<Vec<u8>>> {
        let moved = self
            .wait_for(timeout, |lists| {
                let item = Self::take(lists, src, from)?;
                Self::put(lists, dst, to, item.clone());
                Some(item)
            })
            .await;

        if moved.is_some() {
            self.arrivals.notify_waiters();
        }
        Ok(moved)
    }

    async fn remove(&self, key: &str, payload: &[u8]) -> QueueResult<usize> {
        let removed = Self::remove_one(&mut self.lists.lock(), key, payload);
        Ok(usize::from(removed))
    }

    async fn remove_first(&self, keys: &[&str], payload: &[u8]) -> QueueResult<bool> {
        let mut lists = self.lists.lock();
        Ok(keys.iter().any(|key| Self::remove_one(&mut lists, key, payload)))
    }

    async fn requeue(&self, src: &str, dst: &str, to: End, payload: &[u8]) -> QueueResult<bool> {
        {
            let mut lists = self.lists.lock();
            if !Self::remove_one(&mut lists, src, payload) {
                return Ok(false);
            }
            Self::put(&mut lists, dst, to, payload.to_vec());
        }
        self.arrivals.notify_waiters();
        Ok(true)
    }

    async fn drain(&self, src: &str, from: End, dst: &str, to: End) -> QueueResult<usize> {
        if src == dst {
            return Ok(0);
        }
        let mut moved = 0;
        {
            let mut lists = self.lists.lock();
            while let Some(item) = Self::take(&mut lists, src, from) {
                Self::put(&mut lists, dst, to, item);
                moved += 1;
            }
        }
        if moved > 0 {
            self.arrivals.notify_waiters();
        }
        Ok(moved)
    }

    async fn length(&self, key: &str) -> QueueResult<usize> {
        Ok(self.lists.lock().get(key).map_or(0, VecDeque::len))
    }

    async fn clear(&self, key: &str) -> QueueResult<()> {
        self.lists.lock().remove(key);
        Ok(())
    }
}
