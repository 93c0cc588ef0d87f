//! # dog-redq: Reliable Work Queue over Redis Lists
//!
//! **At-least-once delivery with per-worker in-flight keyspaces**
//!
//! Producers push opaque byte payloads into a named list (the *source*).
//! A worker's consumption loop atomically moves each item into its own
//! in-flight list (`<source>:worker_<id>`) before handing it over, so an item
//! is always in exactly one of the two places. The worker then either
//! completes it (removes it for good) or abandons it (puts it back). A worker
//! that crashes leaves its items in flight; calling `abandon_all` under the
//! same worker id on restart returns them to the queue.
//!
//! ## Features
//!
//! - **No lost tasks**: relocation is a single atomic `BLMOVE`
//! - **Crash recovery**: in-flight work is keyed by worker identity
//! - **Pluggable ordering**: FIFO by default, LIFO or your own [`Processor`]
//! - **Backends**: Redis for production, in-memory for tests and embedding
//! - **Observability**: task event stream and live counters
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use dog_redq::prelude::*;
//! use std::sync::Arc;
//!
//! let config = RedqConfig::from_env()?;
//! let backend = Arc::new(RedisBackend::connect(&config).await?);
//! let queue = Arc::new(ByteQueue::new(backend, "emails"));
//!
//! queue.push(b"{\"to\":\"ops@example.com\"}").await?;
//!
//! let lifecycle = Arc::new(DefaultLifecycle::with_config(queue, "mailer-1", &config));
//! let worker = Worker::with_config(lifecycle, |task: Task| async move {
//!     send_email(task.bytes()).await.map_err(TaskError::retryable)
//! }, &config);
//!
//! let handle = worker.start().await?;
//! // ...
//! handle.shutdown().await?;
//! ```

pub mod backend;
pub mod config;
pub mod error;
pub mod observability;
pub mod processor;
pub mod queue;
pub mod types;
pub mod worker;

// Core API exports
pub use queue::{ByteQueue, Queue};
pub use processor::{Fifo, Lifo, Processor};
pub use worker::{
    worker_keyspace, DefaultLifecycle, Lifecycle, Listener, TaskHandler, Worker, WorkerHandle,
};
pub use types::{Task, TaskEvent, WorkerId};
pub use error::{QueueError, QueueResult, TaskError};
pub use config::RedqConfig;
pub use backend::{End, ListBackend};

// Observability exports
pub use observability::{LiveMetrics, ObservabilityLayer, PerformanceAnalytics};

// Backend implementations
#[cfg(feature = "memory")]
pub use backend::memory::MemoryBackend;

#[cfg(feature = "redis")]
pub use backend::redis::RedisBackend;

/// Everything needed to push, listen, and acknowledge
pub mod prelude {
    // Queue and lifecycle
    pub use crate::{ByteQueue, DefaultLifecycle, Lifecycle, Listener, Queue};

    // Workers
    pub use crate::{TaskHandler, Worker, WorkerHandle};

    // Essential types
    pub use crate::{Processor, QueueError, QueueResult, RedqConfig, Task, TaskError, WorkerId};

    // Backends
    pub use crate::ListBackend;

    #[cfg(feature = "memory")]
    pub use crate::MemoryBackend;

    #[cfg(feature = "redis")]
    pub use crate::RedisBackend;

    // Essential traits
    pub use async_trait::async_trait;
}
