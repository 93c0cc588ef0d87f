use std::sync::Arc;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;
use tracing::debug;
use chrono::Utc;

use crate::{QueueError, TaskEvent, WorkerId};

/// Event fan-out plus counters, shared by a queue and its lifecycles
#[derive(Clone)]
pub struct ObservabilityLayer {
    event_broadcaster: broadcast::Sender<TaskEvent>,
    metrics: Arc<super::LiveMetrics>,
}

impl ObservabilityLayer {
    /// Create new observability layer
    pub fn new() -> Self {
        let (event_broadcaster, _) = broadcast::channel(10000);

        Self {
            event_broadcaster,
            metrics: Arc::new(super::LiveMetrics::new()),
        }
    }

    pub fn record_pushed(&self, source: &str, size: usize) {
        let _ = self.event_broadcaster.send(TaskEvent::Pushed {
            source: source.to_string(),
            size,
            at: Utc::now(),
        });
        self.metrics.increment_tasks_pushed();
    }

    pub fn record_delivered(&self, source: &str, worker_id: &WorkerId) {
        let _ = self.event_broadcaster.send(TaskEvent::Delivered {
            source: source.to_string(),
            worker_id: worker_id.clone(),
            at: Utc::now(),
        });
        self.metrics.increment_tasks_delivered();
    }

    pub fn record_completed(&self, source: &str, worker_id: &WorkerId) {
        let _ = self.event_broadcaster.send(TaskEvent::Completed {
            source: source.to_string(),
            worker_id: worker_id.clone(),
            at: Utc::now(),
        });
        self.metrics.increment_tasks_completed();
    }

    pub fn record_abandoned(&self, source: &str, worker_id: &WorkerId) {
        let _ = self.event_broadcaster.send(TaskEvent::Abandoned {
            source: source.to_string(),
            worker_id: worker_id.clone(),
            at: Utc::now(),
        });
        self.metrics.increment_tasks_abandoned();
    }

    pub fn record_reclaimed(&self, source: &str, worker_id: &WorkerId, count: usize) {
        let _ = self.event_broadcaster.send(TaskEvent::Reclaimed {
            source: source.to_string(),
            worker_id: worker_id.clone(),
            count,
            at: Utc::now(),
        });
        self.metrics.add_tasks_reclaimed(count);
    }

    pub fn record_listener_stopped(&self, source: &str, worker_id: &WorkerId, error: Option<&QueueError>) {
        if error.is_some() {
            self.metrics.increment_loop_errors();
        }
        let _ = self.event_broadcaster.send(TaskEvent::ListenerStopped {
            source: source.to_string(),
            worker_id: worker_id.clone(),
            error: error.map(ToString::to_string),
            at: Utc::now(),
        });
        debug!("Recorded listener stop for worker {} on {}", worker_id, source);
    }

    /// Get event stream
    pub fn event_stream(&self) -> broadcast::Receiver<TaskEvent> {
        self.event_broadcaster.subscribe()
    }

    /// Events as a stream; events missed by a lagging subscriber are skipped
    pub fn events(&self) -> impl tokio_stream::Stream<Item = TaskEvent> + Send + Unpin {
        BroadcastStream::new(self.event_broadcaster.subscribe()).filter_map(Result::ok)
    }

    /// Get live metrics
    pub fn metrics(&self) -> &super::LiveMetrics {
        &self.metrics
    }
}

impl Default for ObservabilityLayer {
    fn default() -> Self {
        Self::new()
    }
}

/// Derived ratios over the live counters
pub struct PerformanceAnalytics {
    observability: Arc<ObservabilityLayer>,
}

impl PerformanceAnalytics {
    pub fn new(observability: Arc<ObservabilityLayer>) -> Self {
        Self { observability }
    }

    /// Tasks currently delivered but neither completed nor abandoned,
    /// as seen by this process
    pub fn outstanding(&self) -> u64 {
        let metrics = self.observability.metrics();
        metrics
            .tasks_delivered()
            .saturating_sub(metrics.tasks_completed() + metrics.tasks_abandoned())
    }

    /// Get success rate percentage
    pub fn success_rate(&self) -> f64 {
        let completed = self.observability.metrics.tasks_completed() as f64;
        let abandoned = self.observability.metrics.tasks_abandoned() as f64;
        let total = completed + abandoned;

        if total == 0.0 {
            100.0
        } else {
            (completed / total) * 100.0
        }
    }

    /// Get retry rate percentage
    pub fn retry_rate(&self) -> f64 {
        let retried = self.observability.metrics.tasks_abandoned() as f64;
        let delivered = self.observability.metrics.tasks_delivered() as f64;

        if delivered == 0.0 {
            0.0
        } else {
            (retried / delivered) * 100.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_events_reach_subscribers() {
        let layer = ObservabilityLayer::new();
        let mut events = layer.event_stream();
        let worker = WorkerId::from("w1");

        layer.record_delivered("jobs", &worker);
        layer.record_completed("jobs", &worker);

        assert_eq!(events.recv().await.unwrap().event_name(), "delivered");
        let completed = events.recv().await.unwrap();
        assert_eq!(completed.event_name(), "completed");
        assert_eq!(completed.source(), "jobs");
    }

    #[tokio::test]
    async fn test_event_stream_yields_in_order() {
        let layer = ObservabilityLayer::new();
        let mut events = layer.events();
        let worker = WorkerId::from("w1");

        layer.record_pushed("jobs", 3);
        layer.record_reclaimed("jobs", &worker, 2);

        assert_eq!(events.next().await.unwrap().event_name(), "pushed");
        assert_eq!(events.next().await.unwrap().event_name(), "reclaimed");
    }

    #[test]
    fn test_rates() {
        let layer = Arc::new(ObservabilityLayer::new());
        let worker = WorkerId::from("w1");
        for _ in 0..4 {
            layer.record_delivered("jobs", &worker);
        }
        for _ in 0..3 {
            layer.record_completed("jobs", &worker);
        }

        let analytics = PerformanceAnalytics::new(layer.clone());
        assert_eq!(analytics.outstanding(), 1);
        assert_eq!(analytics.success_rate(), 100.0);

        layer.record_abandoned("jobs", &worker);
        assert_eq!(analytics.outstanding(), 0);
        assert_eq!(analytics.success_rate(), 75.0);
        assert_eq!(analytics.retry_rate(), 25.0);
    }

    #[test]
    fn test_loop_errors_counted_on_failed_stop() {
        let layer = ObservabilityLayer::new();
        let worker = WorkerId::from("w1");

        layer.record_listener_stopped("jobs", &worker, None);
        layer.record_listener_stopped("jobs", &worker, Some(&QueueError::connectivity("reset")));

        assert_eq!(layer.metrics().loop_errors(), 1);
    }
}
