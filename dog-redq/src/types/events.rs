use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::WorkerId;

/// Minimal stable event protocol for structured observability
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TaskEvent {
    /// Payload was pushed onto a main keyspace
    Pushed {
        source: String,
        size: usize,
        at: DateTime<Utc>,
    },

    /// Payload was relocated into a worker keyspace and handed to the consumer
    Delivered {
        source: String,
        worker_id: WorkerId,
        at: DateTime<Utc>,
    },

    /// Task was acknowledged and removed
    Completed {
        source: String,
        worker_id: WorkerId,
        at: DateTime<Utc>,
    },

    /// Task was moved back onto the main keyspace for retry
    Abandoned {
        source: String,
        worker_id: WorkerId,
        at: DateTime<Utc>,
    },

    /// Worker keyspace was drained back onto the main keyspace
    Reclaimed {
        source: String,
        worker_id: WorkerId,
        count: usize,
        at: DateTime<Utc>,
    },

    /// Consumption loop ended
    ListenerStopped {
        source: String,
        worker_id: WorkerId,
        error: Option<String>,
        at: DateTime<Utc>,
    },
}

impl TaskEvent {
    /// Get event type name as string
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::Pushed { .. } => "pushed",
            Self::Delivered { .. } => "delivered",
            Self::Completed { .. } => "completed",
            Self::Abandoned { .. } => "abandoned",
            Self::Reclaimed { .. } => "reclaimed",
            Self::ListenerStopped { .. } => "listener_stopped",
        }
    }

    /// Get the source keyspace from any event
    pub fn source(&self) -> &str {
        match self {
            Self::Pushed { source, .. }
            | Self::Delivered { source, .. }
            | Self::Completed { source, .. }
            | Self::Abandoned { source, .. }
            | Self::Reclaimed { source, .. }
            | Self::ListenerStopped { source, .. } => source,
        }
    }

    /// Get the timestamp from any event
    pub fn timestamp(&self) -> &DateTime<Utc> {
        match self {
            Self::Pushed { at, .. } => at,
            Self::Delivered { at, .. } => at,
            Self::Completed { at, .. } => at,
            Self::Abandoned { at, .. } => at,
            Self::Reclaimed { at, .. } => at,
            Self::ListenerStopped { at, .. } => at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_json_shape() {
        let event = TaskEvent::Reclaimed {
            source: "jobs".to_string(),
            worker_id: WorkerId::from("w1"),
            count: 2,
            at: Utc::now(),
        };

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["Reclaimed"]["worker_id"], "w1");
        assert_eq!(json["Reclaimed"]["count"], 2);

        let decoded: TaskEvent = serde_json::from_value(json).unwrap();
        assert_eq!(decoded.event_name(), "reclaimed");
        assert_eq!(decoded.timestamp(), event.timestamp());
    }
}
