use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::{debug, instrument, trace};

use crate::{
    backend::ListBackend,
    observability::ObservabilityLayer,
    processor::{default_processor, Processor},
    QueueResult,
};

/// Default bound on a single blocking attempt inside [`Queue::pull`]
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// A named keyspace whose items enter and leave through a swappable [`Processor`]
#[async_trait]
pub trait Queue: Send + Sync {
    /// The keyspace this queue is populated from; fixed for the queue's lifetime
    fn source(&self) -> &str;

    /// Push `payload` through the current processor.
    ///
    /// On error the payload must be assumed not stored.
    async fn push(&self, payload: &[u8]) -> QueueResult<()>;

    /// Next available payload, waiting as long as it takes
    async fn pull(&self) -> QueueResult<Vec<u8>>;

    /// The active processor (FIFO unless one was set)
    fn processor(&self) -> Arc<dyn Processor>;

    /// Install `processor`; calls already in progress keep the old one
    fn set_processor(&self, processor: Arc<dyn Processor>);
}

/// Queue of opaque byte payloads
pub struct ByteQueue {
    source: String,
    backend: Arc<dyn ListBackend>,
    processor: RwLock<Arc<dyn Processor>>,
    poll_interval: Duration,
    observability: Arc<ObservabilityLayer>,
}

impl ByteQueue {
    pub fn new(backend: Arc<dyn ListBackend>, source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            backend,
            processor: RwLock::new(default_processor()),
            poll_interval: DEFAULT_POLL_INTERVAL,
            observability: Arc::new(ObservabilityLayer::new()),
        }
    }

    /// Start with a processor other than FIFO
    pub fn with_processor(self, processor: Arc<dyn Processor>) -> Self {
        *self.processor.write() = processor;
        self
    }

    /// Bound a single blocking attempt. `Duration::ZERO` blocks without bound.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Share an observability layer with other components
    pub fn with_observability(mut self, observability: Arc<ObservabilityLayer>) -> Self {
        self.observability = observability;
        self
    }

    pub fn backend(&self) -> &Arc<dyn ListBackend> {
        &self.backend
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub fn observability(&self) -> &Arc<ObservabilityLayer> {
        &self.observability
    }

    /// Items waiting in the main keyspace
    pub async fn len(&self) -> QueueResult<usize> {
        self.backend.length(&self.source).await
    }

    pub async fn is_empty(&self) -> QueueResult<bool> {
        Ok(self.len().await? == 0)
    }
}

#[async_trait]
impl Queue for ByteQueue {
    fn source(&self) -> &str {
        &self.source
    }

    #[instrument(skip(self, payload), fields(source = %self.source, size = payload.len()))]
    async fn push(&self, payload: &[u8]) -> QueueResult<()> {
        let processor = self.processor();
        processor.push(self.backend.as_ref(), &self.source, payload).await?;

        self.observability.record_pushed(&self.source, payload.len());
        debug!("Pushed {} bytes via {}", payload.len(), processor.name());
        Ok(())
    }

    #[instrument(skip(self), fields(source = %self.source))]
    async fn pull(&self) -> QueueResult<Vec<u8>> {
        let processor = self.processor();

        loop {
            match processor
                .pull(self.backend.as_ref(), &self.source, self.poll_interval)
                .await?
            {
                Some(payload) => {
                    debug!("Pulled {} bytes via {}", payload.len(), processor.name());
                    return Ok(payload);
                }
                None => trace!("Pull attempt timed out, retrying"),
            }
        }
    }

    fn processor(&self) -> Arc<dyn Processor> {
        self.processor.read().clone()
    }

    fn set_processor(&self, processor: Arc<dyn Processor>) {
        let mut current = self.processor.write();
        debug!("Switching {} processor from {} to {}", self.source, current.name(), processor.name());
        *current = processor;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::memory::MemoryBackend;
    use crate::processor::{Fifo, Lifo};

    fn queue_with_backend() -> (Arc<MemoryBackend>, ByteQueue) {
        let backend = Arc::new(MemoryBackend::new());
        let queue = ByteQueue::new(backend.clone(), "queue").with_poll_interval(Duration::from_millis(10));
        (backend, queue)
    }

    #[tokio::test]
    async fn test_push_then_pull_round_trips_bytes() {
        let (_, queue) = queue_with_backend();
        let payload = vec![0u8, 159, 146, 150, 255];

        queue.push(&payload).await.unwrap();

        assert_eq!(queue.pull().await.unwrap(), payload);
        assert!(queue.is_empty().await.unwrap());
    }

    #[tokio::test]
    async fn test_default_processor_is_fifo() {
        let (_, queue) = queue_with_backend();
        assert_eq!(queue.processor().name(), "fifo");

        queue.push(b"one").await.unwrap();
        queue.push(b"two").await.unwrap();

        assert_eq!(queue.pull().await.unwrap(), b"one".to_vec());
        assert_eq!(queue.pull().await.unwrap(), b"two".to_vec());
    }

    #[tokio::test]
    async fn test_set_processor_applies_to_next_call() {
        let (_, queue) = queue_with_backend();
        queue.push(b"one").await.unwrap();
        queue.push(b"two").await.unwrap();

        queue.set_processor(Arc::new(Lifo));

        assert_eq!(queue.processor().name(), "lifo");
        assert_eq!(queue.pull().await.unwrap(), b"two".to_vec());
    }

    #[tokio::test]
    async fn test_pull_waits_across_poll_timeouts() {
        let (backend, queue) = queue_with_backend();
        let queue = Arc::new(queue);

        let puller = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.pull().await })
        };
        tokio::time::sleep(Duration::from_millis(35)).await;
        assert!(!puller.is_finished());

        backend.push("queue", Fifo.push_end(), b"late").await.unwrap();

        assert_eq!(puller.await.unwrap().unwrap(), b"late".to_vec());
    }

    #[tokio::test]
    async fn test_in_progress_pull_keeps_old_processor() {
        let (_, queue) = queue_with_backend();
        let queue = Arc::new(queue);

        let puller = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.pull().await })
        };
        tokio::time::sleep(Duration::from_millis(15)).await;
        queue.set_processor(Arc::new(Lifo));

        // Both land at the left; the FIFO puller takes from the right.
        queue.push(b"older").await.unwrap();
        queue.push(b"newer").await.unwrap();

        assert_eq!(puller.await.unwrap().unwrap(), b"older".to_vec());
    }

    #[tokio::test]
    async fn test_push_counts_in_metrics() {
        let (_, queue) = queue_with_backend();

        queue.push(b"x").await.unwrap();
        queue.push(b"y").await.unwrap();

        assert_eq!(queue.observability().metrics().tasks_pushed(), 2);
    }
}
