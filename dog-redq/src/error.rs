use thiserror::Error;

/// Result type for queue operations
pub type QueueResult<T> = Result<T, QueueError>;

/// Infrastructure errors for queue and lifecycle operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueueError {
    /// Backing store unreachable, or a command failed on the server
    #[error("Backing store connectivity error: {0}")]
    Connectivity(String),

    /// Backing store replied with a shape the protocol never expects
    #[error("Backing store protocol error: {0}")]
    Protocol(String),

    #[error("Worker {0} is already listening")]
    AlreadyListening(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl QueueError {
    /// Create a connectivity error
    pub fn connectivity(msg: impl Into<String>) -> Self {
        Self::Connectivity(msg.into())
    }

    /// Create a protocol error
    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Check if the backing store could not be reached
    pub fn is_connectivity(&self) -> bool {
        matches!(self, Self::Connectivity(_))
    }

    /// Errors that terminate an active consumption loop
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Connectivity(_) | Self::Protocol(_) | Self::Internal(_))
    }
}

/// Handler outcome - determines whether a task is retried
#[derive(Error, Debug, Clone)]
pub enum TaskError {
    /// Retryable error - the task is abandoned back onto the main queue
    #[error("Retryable error: {0}")]
    Retryable(String),

    /// Permanent error - the task is acknowledged and dropped
    #[error("Permanent error: {0}")]
    Permanent(String),
}

impl TaskError {
    /// Create a retryable error
    pub fn retryable(msg: impl Into<String>) -> Self {
        Self::Retryable(msg.into())
    }

    /// Create a permanent error
    pub fn permanent(msg: impl Into<String>) -> Self {
        Self::Permanent(msg.into())
    }

    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Retryable(_))
    }

    /// Get the error message
    pub fn message(&self) -> &str {
        match self {
            Self::Retryable(msg) | Self::Permanent(msg) => msg,
        }
    }
}

#[cfg(feature = "redis")]
impl From<redis::RedisError> for QueueError {
    fn from(err: redis::RedisError) -> Self {
        match err.kind() {
            redis::ErrorKind::TypeError => Self::Protocol(err.to_string()),
            _ => Self::Connectivity(err.to_string()),
        }
    }
}
