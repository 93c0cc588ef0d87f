//! Redis-backed list storage.
//!
//! Non-blocking commands share one auto-reconnecting `ConnectionManager`.
//! Blocking commands (`BLPOP`/`BRPOP`/`BLMOVE`) would stall every other
//! command multiplexed on the same socket, so they run on dedicated
//! connections checked out of a small pool. At most `blocking_pool_size`
//! blocking commands are in progress at once; further callers wait for a
//! checkout. A connection goes back to the
//! pool only after its command has returned; one whose command was
//! cancelled or failed is dropped instead, since the server may still be
//! answering it.
//!
//! Operations that touch two keys atomically are Lua scripts, which Redis
//! executes without interleaving other clients' commands.

use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use tokio::sync::{Semaphore, SemaphorePermit};
use redis::aio::{ConnectionManager, MultiplexedConnection};
use redis::{Client, Script};
use tracing::{debug, info};

use crate::{
    backend::{End, ListBackend},
    config::RedqConfig,
    QueueError, QueueResult,
};

static REMOVE_FIRST: Lazy<Script> = Lazy::new(|| {
    Script::new(
        r#"
for index, key in ipairs(KEYS) do
    if redis.call('LREM', key, 1, ARGV[1]) > 0 then
        return index
    end
end
return 0
"#,
    )
});

static REQUEUE: Lazy<Script> = Lazy::new(|| {
    Script::new(
        r#"
if redis.call('LREM', KEYS[1], 1, ARGV[1]) == 0 then
    return 0
end
if ARGV[2] == 'LEFT' then
    redis.call('LPUSH', KEYS[2], ARGV[1])
else
    redis.call('RPUSH', KEYS[2], ARGV[1])
end
return 1
"#,
    )
});

static DRAIN: Lazy<Script> = Lazy::new(|| {
    Script::new(
        r#"
if KEYS[1] == KEYS[2] then
    return 0
end
local moved = 0
while redis.call('LMOVE', KEYS[1], KEYS[2], ARGV[1], ARGV[2]) do
    moved = moved + 1
end
return moved
"#,
    )
});

/// Redis list backend
pub struct RedisBackend {
    manager: ConnectionManager,
    blocking: BlockingPool,
}

impl RedisBackend {
    /// Connect using the given configuration
    pub async fn connect(config: &RedqConfig) -> QueueResult<Self> {
        config.validate()?;

        let client = Client::open(config.redis_url.as_str())
            .map_err(|e| QueueError::config(format!("invalid redis_url: {e}")))?;
        let manager = ConnectionManager::new(client.clone()).await?;

        info!(
            "Connected to Redis at {} (blocking pool size {})",
            config.redis_url, config.blocking_pool_size
        );

        Ok(Self {
            manager,
            blocking: BlockingPool::new(client, config.blocking_pool_size),
        })
    }

    /// Connect to `url` with default settings
    pub async fn open(url: &str) -> QueueResult<Self> {
        Self::connect(&RedqConfig::new().with_redis_url(url)).await
    }

    fn connection(&self) -> ConnectionManager {
        self.manager.clone()
    }
}

#[async_trait]
impl ListBackend for RedisBackend {
    async fn push(&self, key: &str, end: End, payload: &[u8]) -> QueueResult<()> {
        let command = match end {
            End::Left => "LPUSH",
            End::Right => "RPUSH",
        };
        let mut conn = self.connection();
        let _: () = redis::cmd(command)
            .arg(key)
            .arg(payload)
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn pop(&self, key: &str, end: End, timeout: Duration) -> QueueResult<Option<Vec<u8>>> {
        let command = match end {
            End::Left => "BLPOP",
            End::Right => "BRPOP",
        };
        let mut pooled = self.blocking.acquire().await?;
        let reply: Option<(String, Vec<u8>)> = redis::cmd(command)
            .arg(key)
            .arg(timeout.as_secs_f64())
            .query_async(&mut pooled.conn)
            .await?;
        pooled.release();

        Ok(reply.map(|(_, payload)| payload))
    }

    async fn move_one(
        &self,
        src: &str,
        from: End,
        dst: &str,
        to: End,
        timeout: Duration,
    ) -> QueueResult<Option<Vec<u8>>> {
        let mut pooled = self.blocking.acquire().await?;
        let moved: Option<Vec<u8>> = redis::cmd("BLMOVE")
            .arg(src)
            .arg(dst)
            .arg(from.as_arg())
            .arg(to.as_arg())
            .arg(timeout.as_secs_f64())
            .query_async(&mut pooled.conn)
            .await?;
        pooled.release();

        Ok(moved)
    }

    async fn remove(&self, key: &str, payload: &[u8]) -> QueueResult<usize> {
        let mut conn = self.connection();
        let removed: usize = redis::cmd("LREM")
            .arg(key)
            .arg(1)
            .arg(payload)
            .query_async(&mut conn)
            .await?;
        Ok(removed)
    }

    async fn remove_first(&self, keys: &[&str], payload: &[u8]) -> QueueResult<bool> {
        let mut invocation = REMOVE_FIRST.prepare_invoke();
        for key in keys {
            invocation.key(*key);
        }
        invocation.arg(payload);

        let mut conn = self.connection();
        let index: i64 = invocation.invoke_async(&mut conn).await?;
        let hit = usize::try_from(index - 1).ok().and_then(|i| keys.get(i));
        if let Some(key) = hit {
            debug!("Removed payload from {}", key);
        }
        Ok(hit.is_some())
    }

    async fn requeue(&self, src: &str, dst: &str, to: End, payload: &[u8]) -> QueueResult<bool> {
        let mut conn = self.connection();
        let moved: i64 = REQUEUE
            .key(src)
            .key(dst)
            .arg(payload)
            .arg(to.as_arg())
            .invoke_async(&mut conn)
            .await?;
        Ok(moved == 1)
    }

    async fn drain(&self, src: &str, from: End, dst: &str, to: End) -> QueueResult<usize> {
        let mut conn = self.connection();
        let moved: usize = DRAIN
            .key(src)
            .key(dst)
            .arg(from.as_arg())
            .arg(to.as_arg())
            .invoke_async(&mut conn)
            .await?;
        Ok(moved)
    }

    async fn length(&self, key: &str) -> QueueResult<usize> {
        let mut conn = self.connection();
        let len: usize = redis::cmd("LLEN").arg(key).query_async(&mut conn).await?;
        Ok(len)
    }

    async fn clear(&self, key: &str) -> QueueResult<()> {
        let mut conn = self.connection();
        let _: () = redis::cmd("DEL").arg(key).query_async(&mut conn).await?;
        Ok(())
    }
}

/// Dedicated connections for blocking commands
struct BlockingPool {
    client: Client,
    idle: Mutex<Vec<MultiplexedConnection>>,
    checkouts: Semaphore,
    size: usize,
}

impl BlockingPool {
    fn new(client: Client, size: usize) -> Self {
        Self {
            client,
            idle: Mutex::new(Vec::with_capacity(size)),
            checkouts: Semaphore::new(size.min(Semaphore::MAX_PERMITS)),
            size,
        }
    }

    /// Wait for a free slot, then reuse an idle connection or open one
    async fn acquire(&self) -> QueueResult<PooledConnection<'_>> {
        let permit = self
            .checkouts
            .acquire()
            .await
            .map_err(|_| QueueError::Internal("Blocking pool closed".to_string()))?;

        let idle = self.idle.lock().pop();
        let conn = match idle {
            Some(conn) => conn,
            None => self.client.get_multiplexed_async_connection().await?,
        };
        Ok(PooledConnection {
            conn,
            pool: self,
            _permit: permit,
        })
    }
}

/// A checked-out blocking connection; dropped unless explicitly released.
/// Either way its slot frees up when the guard goes away.
struct PooledConnection<'a> {
    conn: MultiplexedConnection,
    pool: &'a BlockingPool,
    _permit: SemaphorePermit<'a>,
}

impl PooledConnection<'_> {
    /// Hand the connection back; only valid once its command has replied
    fn release(self) {
        let mut idle = self.pool.idle.lock();
        if idle.len() < self.pool.size {
            idle.push(self.conn);
        }
    }
}
