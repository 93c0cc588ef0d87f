//! Reliable consumption: main keyspace -> worker keyspace -> completed.
//!
//! A task moves through three states:
//!
//! - **queued**: in the main keyspace (`<source>`)
//! - **in flight**: in the worker keyspace (`<source>:worker_<id>`), handed
//!   to the consumer but not yet acknowledged
//! - **completed**: removed from the backend
//!
//! `abandon`/`abandon_all` move in-flight tasks back to queued. Apart from
//! `Queue::push` and `complete`, every transition is a single atomic move in
//! the backend, so the number of tasks across the main keyspace and all
//! worker keyspaces only changes on push and complete.

pub mod lifecycle;
pub mod runner;

use async_trait::async_trait;

use crate::{QueueResult, Task, WorkerId};

pub use lifecycle::{DefaultLifecycle, Listener};
pub use runner::{TaskHandler, Worker, WorkerHandle};

/// Keyspace holding the tasks `worker_id` has in flight for `source`
pub fn worker_keyspace(source: &str, worker_id: &WorkerId) -> String {
    format!("{source}:worker_{worker_id}")
}

#[async_trait]
pub trait Lifecycle: Send + Sync {
    /// Start the background consumption loop.
    ///
    /// Fails with `AlreadyListening` while a previous loop is still running.
    fn listen(&self) -> QueueResult<Listener>;

    /// Stop the consumption loop and wait for it to exit. A no-op when not listening.
    async fn stop_listening(&self) -> QueueResult<()>;

    /// Acknowledge `task`; unknown or already completed tasks are ignored
    async fn complete(&self, task: &Task) -> QueueResult<()>;

    /// Return `task` to the main keyspace for another attempt
    async fn abandon(&self, task: &Task) -> QueueResult<()>;

    /// Return everything this worker has in flight, returning how many tasks moved
    async fn abandon_all(&self) -> QueueResult<usize>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_worker_keyspace_format() {
        let key = worker_keyspace("queue", &WorkerId::from("worker_1"));
        assert_eq!(key, "queue:worker_worker_1");
    }

    #[test]
    fn test_worker_keyspaces_are_distinct_per_worker() {
        let a = worker_keyspace("queue", &WorkerId::from("a"));
        let b = worker_keyspace("queue", &WorkerId::from("b"));
        assert_ne!(a, b);
        assert_ne!(a, "queue");
    }
}
