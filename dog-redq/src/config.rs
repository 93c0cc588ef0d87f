//! Runtime configuration for queues, lifecycles and the Redis store.
//!
//! Every field has a default; applications override them with the
//! `with_*` setters or from `REDQ_*` environment variables:
//!
//! ```bash
//! export REDQ_REDIS_URL=redis://cache.internal:6379
//! export REDQ_POLL_INTERVAL_MS=250
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{QueueError, QueueResult};

/// Prefix shared by all environment overrides
pub const ENV_PREFIX: &str = "REDQ_";

/// Configuration for queue and worker behavior
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedqConfig {
    /// Redis connection URL
    pub redis_url: String,

    /// Upper bound on a single blocking pull; cancellation is observed
    /// at least this often while a worker is idle
    pub poll_interval: Duration,

    /// Buffered tasks between the consumption loop and the consumer
    pub channel_capacity: usize,

    /// Blocking commands allowed in progress at once, each on its own connection
    pub blocking_pool_size: usize,

    /// Maximum handlers running at once in a `Worker`
    pub max_concurrency: usize,
}

impl Default for RedqConfig {
    fn default() -> Self {
        Self {
            redis_url: "redis://127.0.0.1:6379".to_string(),
            poll_interval: Duration::from_secs(1),
            channel_capacity: 1,
            blocking_pool_size: 4,
            max_concurrency: 4,
        }
    }
}

impl RedqConfig {
    /// Create a new config with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Load defaults overridden by `REDQ_*` environment variables
    pub fn from_env() -> QueueResult<Self> {
        Self::from_vars(std::env::vars())
    }

    /// Load defaults overridden by `REDQ_*` entries of `vars`.
    ///
    /// Unknown `REDQ_*` keys are ignored.
    pub fn from_vars<I, K, V>(vars: I) -> QueueResult<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut config = Self::default();

        for (key, value) in vars {
            let Some(name) = key.as_ref().strip_prefix(ENV_PREFIX) else {
                continue;
            };
            let value = value.as_ref().trim();

            match name {
                "REDIS_URL" => config.redis_url = value.to_string(),
                "POLL_INTERVAL_MS" => {
                    config.poll_interval = Duration::from_millis(parse_number(key.as_ref(), value)?)
                }
                "CHANNEL_CAPACITY" => config.channel_capacity = parse_number(key.as_ref(), value)?,
                "BLOCKING_POOL_SIZE" => {
                    config.blocking_pool_size = parse_number(key.as_ref(), value)?
                }
                "MAX_CONCURRENCY" => config.max_concurrency = parse_number(key.as_ref(), value)?,
                _ => {}
            }
        }

        config.validate()?;
        Ok(config)
    }

    /// Set the Redis connection URL
    pub fn with_redis_url<S: Into<String>>(mut self, url: S) -> Self {
        self.redis_url = url.into();
        self
    }

    /// Set the blocking pull bound
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Set the task channel capacity
    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity;
        self
    }

    /// Set the blocking connection pool size
    pub fn with_blocking_pool_size(mut self, size: usize) -> Self {
        self.blocking_pool_size = size;
        self
    }

    /// Set the worker handler concurrency
    pub fn with_max_concurrency(mut self, max: usize) -> Self {
        self.max_concurrency = max;
        self
    }

    /// Reject values the runtime cannot honor
    pub fn validate(&self) -> QueueResult<()> {
        if self.redis_url.is_empty() {
            return Err(QueueError::config("redis_url must not be empty"));
        }
        if self.poll_interval.is_zero() {
            return Err(QueueError::config("poll_interval must be greater than zero"));
        }
        if self.channel_capacity == 0 {
            return Err(QueueError::config("channel_capacity must be at least 1"));
        }
        if self.blocking_pool_size == 0 {
            return Err(QueueError::config("blocking_pool_size must be at least 1"));
        }
        if self.max_concurrency == 0 {
            return Err(QueueError::config("max_concurrency must be at least 1"));
        }
        Ok(())
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> QueueResult<T> {
    value
        .parse()
        .map_err(|_| QueueError::config(format!("{key}: expected a number, got {value:?}")))
}
