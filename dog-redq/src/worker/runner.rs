use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{oneshot, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use super::{DefaultLifecycle, Lifecycle, Listener};
use crate::{config::RedqConfig, Queue, QueueError, QueueResult, Task, TaskError};

/// Processes one task at a time; the outcome decides how the task is acknowledged
#[async_trait]
pub trait TaskHandler: Send + Sync + 'static {
    async fn handle(&self, task: &Task) -> Result<(), TaskError>;
}

#[async_trait]
impl<F, Fut> TaskHandler for F
where
    F: Fn(Task) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), TaskError>> + Send,
{
    async fn handle(&self, task: &Task) -> Result<(), TaskError> {
        (self)(task.clone()).await
    }
}

/// Handle for managing a running worker
pub struct WorkerHandle {
    shutdown_tx: oneshot::Sender<()>,
    join_handle: JoinHandle<QueueResult<()>>,
}

impl WorkerHandle {
    /// Stop consuming, wait for in-progress handlers, and report how the run ended
    pub async fn shutdown(self) -> QueueResult<()> {
        let _ = self.shutdown_tx.send(());
        self.join_handle
            .await
            .map_err(|e| QueueError::Internal(format!("Worker join error: {}", e)))?
    }

    /// True once the run has ended on its own (fatal listener error)
    pub fn is_finished(&self) -> bool {
        self.join_handle.is_finished()
    }
}

/// Drives a lifecycle: recover, listen, dispatch, acknowledge
pub struct Worker<H> {
    lifecycle: Arc<DefaultLifecycle>,
    handler: Arc<H>,
    max_concurrency: usize,
}

impl<H: TaskHandler> Worker<H> {
    pub fn new(lifecycle: Arc<DefaultLifecycle>, handler: H) -> Self {
        Self {
            lifecycle,
            handler: Arc::new(handler),
            max_concurrency: RedqConfig::default().max_concurrency,
        }
    }

    /// Create a worker using the concurrency limit from `config`
    pub fn with_config(lifecycle: Arc<DefaultLifecycle>, handler: H, config: &RedqConfig) -> Self {
        Self::new(lifecycle, handler).with_max_concurrency(config.max_concurrency)
    }

    /// Handlers allowed to run at once (at least 1)
    pub fn with_max_concurrency(mut self, max: usize) -> Self {
        self.max_concurrency = max.clamp(1, Semaphore::MAX_PERMITS.min(u32::MAX as usize));
        self
    }

    /// Reclaim anything a previous run of this worker identity left in
    /// flight, then start consuming in the background
    #[instrument(skip(self), fields(worker_id = %self.lifecycle.worker_id()))]
    pub async fn start(self) -> QueueResult<WorkerHandle> {
        let reclaimed = self.lifecycle.abandon_all().await?;
        if reclaimed > 0 {
            info!("Recovered {} tasks left in flight by a previous run", reclaimed);
        }

        let listener = self.lifecycle.listen()?;
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let join_handle = tokio::spawn(self.run(listener, shutdown_rx));

        Ok(WorkerHandle {
            shutdown_tx,
            join_handle,
        })
    }

    async fn run(self, mut listener: Listener, mut shutdown_rx: oneshot::Receiver<()>) -> QueueResult<()> {
        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));
        info!(
            "Worker {} started on {} with concurrency {}",
            self.lifecycle.worker_id(),
            self.lifecycle.queue().source(),
            self.max_concurrency
        );

        let outcome = loop {
            let permit = tokio::select! {
                biased;
                _ = &mut shutdown_rx => break Ok(()),
                permit = semaphore.clone().acquire_owned() => permit,
            };
            let Ok(permit) = permit else {
                break Err(QueueError::Internal("Worker semaphore closed".to_string()));
            };

            let task = tokio::select! {
                biased;
                _ = &mut shutdown_rx => break Ok(()),
                task = listener.recv() => task,
            };
            let Some(task) = task else {
                // The listener only ends without a shutdown request on a fatal error.
                break match listener.error().await {
                    Some(err) => Err(err),
                    None => Ok(()),
                };
            };

            let lifecycle = self.lifecycle.clone();
            let handler = self.handler.clone();
            tokio::spawn(async move {
                process(lifecycle.as_ref(), handler.as_ref(), task).await;
                drop(permit);
            });
        };

        self.lifecycle.stop_listening().await?;

        // Every permit back means every handler has finished.
        let permits = u32::try_from(self.max_concurrency).unwrap_or(u32::MAX);
        let _ = semaphore.acquire_many(permits).await;

        match &outcome {
            Ok(()) => info!("Worker {} stopped", self.lifecycle.worker_id()),
            Err(err) => error!("Worker {} stopped on error: {}", self.lifecycle.worker_id(), err),
        }
        outcome
    }
}

async fn process<H: TaskHandler>(lifecycle: &DefaultLifecycle, handler: &H, task: Task) {
    let acked = match handler.handle(&task).await {
        Ok(()) => lifecycle.complete(&task).await,
        Err(TaskError::Retryable(reason)) => {
            warn!("Task failed, abandoning for retry: {}", reason);
            lifecycle.abandon(&task).await
        }
        Err(TaskError::Permanent(reason)) => {
            error!("Task failed permanently, dropping: {}", reason);
            lifecycle.complete(&task).await
        }
    };

    match acked {
        Ok(()) => debug!("Task acknowledged"),
        // Still in flight; the next abandon_all for this worker returns it.
        Err(err) => error!("Failed to acknowledge task: {}", err),
    }
}
