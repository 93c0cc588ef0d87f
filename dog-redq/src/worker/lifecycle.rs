use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use futures::Stream;
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use super::{worker_keyspace, Lifecycle};
use crate::{config::RedqConfig, ByteQueue, Queue, QueueError, QueueResult, Task, WorkerId};

/// Tasks and loop failures produced by [`Lifecycle::listen`]
pub struct Listener {
    tasks: mpsc::Receiver<Task>,
    errors: mpsc::Receiver<QueueError>,
    stopped: Arc<AtomicBool>,
}

impl Listener {
    /// Next delivered task.
    ///
    /// Returns `None` once the loop has stopped; tasks still buffered at that
    /// point stay in flight and are recovered with `abandon_all`.
    pub async fn recv(&mut self) -> Option<Task> {
        if self.is_stopped() {
            return None;
        }
        let task = self.tasks.recv().await?;
        if self.is_stopped() {
            return None;
        }
        Some(task)
    }

    /// The error that ended the loop, waiting for the loop to end
    pub async fn error(&mut self) -> Option<QueueError> {
        self.errors.recv().await
    }

    /// The error that ended the loop, if it already ended with one
    pub fn try_error(&mut self) -> Option<QueueError> {
        self.errors.try_recv().ok()
    }

    /// True once `stop_listening` has been called
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    /// Delivered tasks as a stream
    pub fn into_stream(self) -> impl Stream<Item = Task> + Send {
        futures::stream::unfold(self, |mut listener| async move {
            let task = listener.recv().await?;
            Some((task, listener))
        })
    }
}

/// Handle for a running consumption loop
struct ListenerHandle {
    shutdown_tx: oneshot::Sender<()>,
    stopped: Arc<AtomicBool>,
    join_handle: JoinHandle<()>,
}

/// Lifecycle binding one queue and one worker identity
pub struct DefaultLifecycle {
    queue: Arc<ByteQueue>,
    worker_id: WorkerId,
    worker_keyspace: String,
    channel_capacity: usize,
    active: Mutex<Option<ListenerHandle>>,
}

impl DefaultLifecycle {
    pub fn new(queue: Arc<ByteQueue>, worker_id: impl Into<WorkerId>) -> Self {
        let worker_id = worker_id.into();
        let worker_keyspace = worker_keyspace(queue.source(), &worker_id);

        Self {
            queue,
            worker_id,
            worker_keyspace,
            channel_capacity: RedqConfig::default().channel_capacity,
            active: Mutex::new(None),
        }
    }

    /// Lifecycle under a freshly generated worker id.
    ///
    /// Nothing can reclaim its in-flight tasks after a crash, so it suits
    /// consumers that never restart under the same identity.
    pub fn ephemeral(queue: Arc<ByteQueue>) -> Self {
        Self::new(queue, WorkerId::default())
    }

    /// Create a lifecycle using the channel settings from `config`
    pub fn with_config(queue: Arc<ByteQueue>, worker_id: impl Into<WorkerId>, config: &RedqConfig) -> Self {
        Self::new(queue, worker_id).with_channel_capacity(config.channel_capacity)
    }

    /// Tasks buffered between the loop and the consumer (at least 1)
    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity.max(1);
        self
    }

    pub fn worker_id(&self) -> &WorkerId {
        &self.worker_id
    }

    pub fn worker_keyspace(&self) -> &str {
        &self.worker_keyspace
    }

    pub fn queue(&self) -> &Arc<ByteQueue> {
        &self.queue
    }

    /// Tasks currently held by this worker
    pub async fn in_flight_len(&self) -> QueueResult<usize> {
        self.queue.backend().length(&self.worker_keyspace).await
    }

    /// True while a consumption loop is running
    pub fn is_listening(&self) -> bool {
        self.active
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.join_handle.is_finished())
    }
}

#[async_trait]
impl Lifecycle for DefaultLifecycle {
    fn listen(&self) -> QueueResult<Listener> {
        let mut active = self.active.lock();
        if let Some(handle) = active.as_ref() {
            if !handle.join_handle.is_finished() {
                return Err(QueueError::AlreadyListening(self.worker_id.to_string()));
            }
        }

        let (task_tx, tasks) = mpsc::channel(self.channel_capacity);
        let (error_tx, errors) = mpsc::channel(1);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let stopped = Arc::new(AtomicBool::new(false));

        let consumer = ConsumeLoop {
            queue: self.queue.clone(),
            worker_id: self.worker_id.clone(),
            worker_keyspace: self.worker_keyspace.clone(),
            task_tx,
            error_tx,
        };
        let join_handle = tokio::spawn(consumer.run(shutdown_rx));

        *active = Some(ListenerHandle {
            shutdown_tx,
            stopped: stopped.clone(),
            join_handle,
        });

        Ok(Listener {
            tasks,
            errors,
            stopped,
        })
    }

    #[instrument(skip(self), fields(worker_id = %self.worker_id, source = %self.queue.source()))]
    async fn stop_listening(&self) -> QueueResult<()> {
        let handle = self.active.lock().take();
        let Some(handle) = handle else {
            debug!("Not listening, nothing to stop");
            return Ok(());
        };

        handle.stopped.store(true, Ordering::Release);
        let _ = handle.shutdown_tx.send(());
        handle
            .join_handle
            .await
            .map_err(|e| QueueError::Internal(format!("Listener join error: {}", e)))
    }

    #[instrument(skip(self, task), fields(worker_id = %self.worker_id, source = %self.queue.source()))]
    async fn complete(&self, task: &Task) -> QueueResult<()> {
        // An abandoned task may be acknowledged late; it then sits in the main keyspace.
        let keys = [self.worker_keyspace.as_str(), self.queue.source()];
        let removed = self.queue.backend().remove_first(&keys, task.bytes()).await?;

        if removed {
            self.queue.observability().record_completed(self.queue.source(), &self.worker_id);
            debug!("Completed task ({} bytes)", task.len());
        } else {
            debug!("Complete for unknown task ignored");
        }
        Ok(())
    }

    #[instrument(skip(self, task), fields(worker_id = %self.worker_id, source = %self.queue.source()))]
    async fn abandon(&self, task: &Task) -> QueueResult<()> {
        let processor = self.queue.processor();
        let requeued = processor
            .requeue(
                self.queue.backend().as_ref(),
                &self.worker_keyspace,
                self.queue.source(),
                task.bytes(),
            )
            .await?;

        if requeued {
            self.queue.observability().record_abandoned(self.queue.source(), &self.worker_id);
            debug!("Abandoned task ({} bytes)", task.len());
        } else {
            debug!("Abandon for task not in flight ignored");
        }
        Ok(())
    }

    #[instrument(skip(self), fields(worker_id = %self.worker_id, source = %self.queue.source()))]
    async fn abandon_all(&self) -> QueueResult<usize> {
        let processor = self.queue.processor();
        let reclaimed = processor
            .requeue_all(self.queue.backend().as_ref(), &self.worker_keyspace, self.queue.source())
            .await?;

        if reclaimed > 0 {
            self.queue
                .observability()
                .record_reclaimed(self.queue.source(), &self.worker_id, reclaimed);
            info!("Reclaimed {} in-flight tasks", reclaimed);
        }
        Ok(reclaimed)
    }
}

/// Background loop: relocate one task, hand it off, repeat
struct ConsumeLoop {
    queue: Arc<ByteQueue>,
    worker_id: WorkerId,
    worker_keyspace: String,
    task_tx: mpsc::Sender<Task>,
    error_tx: mpsc::Sender<QueueError>,
}

impl ConsumeLoop {
    async fn run(self, mut shutdown_rx: oneshot::Receiver<()>) {
        let source = self.queue.source().to_string();
        info!("Worker {} listening on {}", self.worker_id, source);

        let failure = loop {
            // Processor swaps take effect from the next relocation.
            let processor = self.queue.processor();

            let pulled = tokio::select! {
                biased;
                _ = &mut shutdown_rx => break None,
                _ = self.task_tx.closed() => {
                    warn!("Listener for worker {} dropped; stopping", self.worker_id);
                    break None;
                }
                pulled = processor.pull_to(
                    self.queue.backend().as_ref(),
                    &source,
                    &self.worker_keyspace,
                    self.queue.poll_interval(),
                ) => pulled,
            };

            let payload = match pulled {
                Ok(Some(payload)) => payload,
                Ok(None) => continue,
                Err(err) => {
                    error!("Worker {} failed to pull from {}: {}", self.worker_id, source, err);
                    break Some(err);
                }
            };

            // From here the task is in flight; if it cannot be handed off it
            // stays in the worker keyspace until abandoned.
            let task = Task::new(payload, source.as_str(), self.worker_id.clone());
            tokio::select! {
                biased;
                _ = &mut shutdown_rx => {
                    debug!("Stopped before hand-off; task stays in flight");
                    break None;
                }
                sent = self.task_tx.send(task) => {
                    if sent.is_err() {
                        warn!("Listener for worker {} dropped; task stays in flight", self.worker_id);
                        break None;
                    }
                }
            }

            self.queue.observability().record_delivered(&source, &self.worker_id);
            debug!("Delivered task to worker {}", self.worker_id);
        };

        if let Some(err) = &failure {
            let _ = self.error_tx.try_send(err.clone());
        }
        self.queue
            .observability()
            .record_listener_stopped(&source, &self.worker_id, failure.as_ref());
        info!("Worker {} stopped listening on {}", self.worker_id, source);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::memory::{failing::FailingBackend, MemoryBackend};
    use crate::backend::ListBackend;
    use futures::StreamExt;
    use std::time::Duration;
    use tracing_test::traced_test;

    fn lifecycle() -> (Arc<MemoryBackend>, Arc<ByteQueue>, DefaultLifecycle) {
        let backend = Arc::new(MemoryBackend::new());
        let queue = Arc::new(
            ByteQueue::new(backend.clone(), "queue").with_poll_interval(Duration::from_millis(10)),
        );
        let lifecycle = DefaultLifecycle::new(queue.clone(), "worker_1");
        (backend, queue, lifecycle)
    }

    #[tokio::test]
    async fn test_listen_twice_is_rejected() {
        let (_, _, lifecycle) = lifecycle();

        let _listener = lifecycle.listen().unwrap();
        let second = lifecycle.listen();

        assert!(matches!(second, Err(QueueError::AlreadyListening(id)) if id == "worker_1"));
        lifecycle.stop_listening().await.unwrap();
    }

    #[tokio::test]
    async fn test_listen_again_after_stop() {
        let (_, queue, lifecycle) = lifecycle();

        let _first = lifecycle.listen().unwrap();
        lifecycle.stop_listening().await.unwrap();
        assert!(!lifecycle.is_listening());

        let mut second = lifecycle.listen().unwrap();
        queue.push(b"again").await.unwrap();

        assert_eq!(second.recv().await.unwrap().bytes(), b"again");
        lifecycle.stop_listening().await.unwrap();
    }

    #[tokio::test]
    async fn test_stop_without_listen_is_noop() {
        let (_, _, lifecycle) = lifecycle();
        assert!(lifecycle.stop_listening().await.is_ok());
    }

    #[tokio::test]
    async fn test_recv_returns_none_after_stop() {
        let (_, queue, lifecycle) = lifecycle();
        queue.push(b"buffered").await.unwrap();

        let mut listener = lifecycle.listen().unwrap();
        // Let the loop relocate the task into the channel buffer.
        while lifecycle.in_flight_len().await.unwrap() == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        lifecycle.stop_listening().await.unwrap();

        assert!(listener.is_stopped());
        assert!(listener.recv().await.is_none());
        assert_eq!(lifecycle.in_flight_len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_complete_is_idempotent() {
        let (backend, queue, lifecycle) = lifecycle();
        queue.push(b"once").await.unwrap();

        let mut listener = lifecycle.listen().unwrap();
        let task = listener.recv().await.unwrap();
        lifecycle.stop_listening().await.unwrap();

        lifecycle.complete(&task).await.unwrap();
        lifecycle.complete(&task).await.unwrap();

        assert_eq!(backend.length("queue").await.unwrap(), 0);
        assert_eq!(backend.length("queue:worker_worker_1").await.unwrap(), 0);
        assert_eq!(queue.observability().metrics().tasks_completed(), 1);
    }

    #[tokio::test]
    async fn test_abandon_unknown_task_does_not_duplicate() {
        let (backend, _, lifecycle) = lifecycle();
        let stranger = Task::new(b"never pulled".to_vec(), "queue", WorkerId::from("worker_1"));

        lifecycle.abandon(&stranger).await.unwrap();

        assert_eq!(backend.length("queue").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_dropped_listener_stops_loop_without_claiming() {
        let (backend, queue, lifecycle) = lifecycle();

        let listener = lifecycle.listen().unwrap();
        drop(listener);
        tokio::time::timeout(Duration::from_secs(1), async {
            while lifecycle.is_listening() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("loop kept running without a listener");

        queue.push(b"orphan").await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;

        assert_eq!(backend.length("queue").await.unwrap(), 1);
        assert_eq!(lifecycle.in_flight_len().await.unwrap(), 0);

        let mut listener = lifecycle.listen().unwrap();
        assert_eq!(listener.recv().await.unwrap().bytes(), b"orphan");
        lifecycle.stop_listening().await.unwrap();
    }

    #[tokio::test]
    async fn test_backend_failure_ends_loop_with_error() {
        let backend = Arc::new(FailingBackend::new());
        let queue = Arc::new(
            ByteQueue::new(backend, "queue").with_poll_interval(Duration::from_millis(10)),
        );
        let lifecycle = DefaultLifecycle::new(queue.clone(), "worker_1");

        let mut listener = lifecycle.listen().unwrap();

        assert!(listener.recv().await.is_none());
        assert_eq!(listener.error().await, Some(QueueError::connectivity("reset")));
        assert_eq!(queue.observability().metrics().loop_errors(), 1);

        while lifecycle.is_listening() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(lifecycle.listen().is_ok());
        lifecycle.stop_listening().await.unwrap();
    }

    #[tokio::test]
    async fn test_try_error_reports_only_finished_failures() {
        let (_, _, healthy) = lifecycle();
        let mut listener = healthy.listen().unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(listener.try_error().is_none());
        healthy.stop_listening().await.unwrap();
        assert!(listener.try_error().is_none());

        let queue = Arc::new(
            ByteQueue::new(Arc::new(FailingBackend::new()), "queue")
                .with_poll_interval(Duration::from_millis(10)),
        );
        let failing = DefaultLifecycle::new(queue, "worker_1");
        let mut listener = failing.listen().unwrap();
        while failing.is_listening() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(matches!(listener.try_error(), Some(QueueError::Connectivity(_))));
    }

    #[tokio::test]
    async fn test_into_stream_yields_in_order_and_ends_on_stop() {
        let (_, queue, lifecycle) = lifecycle();
        for payload in ["one", "two", "three"] {
            queue.push(payload.as_bytes()).await.unwrap();
        }

        let stream = lifecycle.listen().unwrap().into_stream();
        tokio::pin!(stream);

        let mut received = Vec::new();
        for _ in 0..3 {
            received.push(stream.next().await.unwrap().into_bytes());
        }
        assert_eq!(received, vec![b"one".to_vec(), b"two".to_vec(), b"three".to_vec()]);

        lifecycle.stop_listening().await.unwrap();
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_ephemeral_lifecycles_get_distinct_keyspaces() {
        let (_, queue, _) = lifecycle();

        let first = DefaultLifecycle::ephemeral(queue.clone());
        let second = DefaultLifecycle::ephemeral(queue);

        assert_ne!(first.worker_id(), second.worker_id());
        assert!(first.worker_keyspace().starts_with("queue:worker_"));
        assert_ne!(first.worker_keyspace(), second.worker_keyspace());
    }

    #[tokio::test]
    #[traced_test]
    async fn test_abandon_all_logs_reclaimed_count() {
        let (backend, _, lifecycle) = lifecycle();
        backend.push("queue:worker_worker_1", crate::backend::End::Left, b"left behind").await.unwrap();

        let reclaimed = lifecycle.abandon_all().await.unwrap();

        assert_eq!(reclaimed, 1);
        assert!(logs_contain("Reclaimed 1 in-flight tasks"));
    }
}
