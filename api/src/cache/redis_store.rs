//! Redis-backed external store.
//!
//! Opening the store only parses the URL; no connection is made and nothing is
//! pinged, so an unreachable Redis cannot fail startup. The multiplexed
//! connection is established on first use and dropped after an error on it,
//! which makes the next call reconnect. Each `get`/`set` is bounded by
//! `timeout` as a whole: connecting, waiting on the shared slot and the command.
//!
//! `rediss://` URLs are supported through rustls, like the HTTP client.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use tokio::sync::Mutex;
use tokio::time::timeout;

use super::CacheBackend;
use crate::errors::CacheError;

/// The shared connection, tagged with a generation number.
///
/// A failed command only clears the slot if it still holds the connection the
/// command ran on; a newer connection stored meanwhile by another task stays.
struct Slot<C> {
    current: Option<(u64, C)>,
    next_generation: u64,
}

impl<C: Clone> Slot<C> {
    fn new() -> Self {
        Self {
            current: None,
            next_generation: 0,
        }
    }

    fn current(&self) -> Option<(u64, C)> {
        self.current.clone()
    }

    fn store(&mut self, conn: C) -> u64 {
        let generation = self.next_generation;
        self.next_generation += 1;
        self.current = Some((generation, conn));
        generation
    }

    fn forget(&mut self, generation: u64) {
        if matches!(self.current, Some((current, _)) if current == generation) {
            self.current = None;
        }
    }
}

pub struct RedisStore {
    client: redis::Client,
    slot: Mutex<Slot<MultiplexedConnection>>,
    timeout: Duration,
}

impl RedisStore {
    pub fn open(url: &str, timeout: Duration) -> Result<Self, CacheError> {
        let client = redis::Client::open(url)?;
        Ok(Self {
            client,
            slot: Mutex::new(Slot::new()),
            timeout,
        })
    }

    async fn connection(&self) -> Result<(u64, MultiplexedConnection), CacheError> {
        if let Some(current) = self.slot.lock().await.current() {
            return Ok(current);
        }

        // The slot is not locked while connecting: a hanging server stalls
        // each caller for at most its own timeout.
        let conn = self.client.get_multiplexed_async_connection().await?;
        tracing::info!("Connected to Redis");
        let generation = self.slot.lock().await.store(conn.clone());
        Ok((generation, conn))
    }

    /// Run one command on the shared connection within `timeout`.
    async fn run<T, F, Fut>(&self, command: F) -> Result<T, CacheError>
    where
        T: Send,
        F: FnOnce(MultiplexedConnection) -> Fut + Send,
        Fut: Future<Output = redis::RedisResult<T>> + Send,
    {
        let mut used = None;
        let outcome = timeout(self.timeout, async {
            let (generation, conn) = self.connection().await?;
            used = Some(generation);
            Ok::<_, CacheError>(command(conn).await?)
        })
        .await;

        let err = match outcome {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(e)) => e,
            Err(_) => CacheError::Timeout(self.timeout),
        };
        if let Some(generation) = used {
            self.slot.lock().await.forget(generation);
        }
        Err(err)
    }
}

#[async_trait]
impl CacheBackend for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        self.run(|mut conn| async move { conn.get::<_, Option<String>>(key).await }).await
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError> {
        // SETEX rejects 0; a sub-second TTL still gets one second.
        let seconds = ttl.as_secs().max(1);
        self.run(|mut conn| async move { conn.set_ex::<_, _, ()>(key, value, seconds).await })
            .await
    }
}
