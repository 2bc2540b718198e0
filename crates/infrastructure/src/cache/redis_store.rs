//! Redis-backed key-value store
//!
//! Uses a `ConnectionManager` (auto-reconnecting, multiplexed) that is
//! established lazily on first use, so an unreachable server at start-up
//! degrades to cache misses instead of failing the process. Every command is
//! bounded by the configured operation timeout.

use std::future::Future;
use std::time::Duration;

use application::{ApplicationError, KeyTtl, KeyValueStore, ScanPage};
use async_trait::async_trait;
use redis::{AsyncCommands, Client, aio::ConnectionManager};
use tokio::sync::OnceCell;
use tracing::{debug, instrument};

use crate::config::RedisConfig;

/// Key-value store adapter for Redis
#[derive(Clone)]
pub struct RedisStore {
    client: Client,
    connection: std::sync::Arc<OnceCell<ConnectionManager>>,
    connect_timeout: Duration,
    operation_timeout: Duration,
}

impl std::fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStore")
            .field("connected", &self.connection.initialized())
            .field("operation_timeout", &self.operation_timeout)
            .finish_non_exhaustive()
    }
}

impl RedisStore {
    /// Create a store for the configured server without connecting
    ///
    /// # Errors
    ///
    /// Returns `Configuration` if the URL cannot be parsed.
    pub fn new(config: &RedisConfig) -> Result<Self, ApplicationError> {
        let client = Client::open(config.url.as_str())
            .map_err(|e| ApplicationError::Configuration(format!("invalid redis url: {e}")))?;

        Ok(Self {
            client,
            connection: std::sync::Arc::new(OnceCell::new()),
            connect_timeout: config.connect_timeout(),
            operation_timeout: config.operation_timeout(),
        })
    }

    async fn connection(&self) -> Result<ConnectionManager, ApplicationError> {
        let manager = self
            .connection
            .get_or_try_init(|| async {
                debug!("Connecting to redis");
                tokio::time::timeout(
                    self.connect_timeout,
                    ConnectionManager::new(self.client.clone()),
                )
                .await
                .map_err(|_| unavailable("connect timed out"))?
                .map_err(|e| unavailable(&e.to_string()))
            })
            .await?;
        Ok(manager.clone())
    }

    /// Run one command under the operation deadline
    async fn bounded<T, F>(&self, op: &str, fut: F) -> Result<T, ApplicationError>
    where
        F: Future<Output = redis::RedisResult<T>>,
    {
        match tokio::time::timeout(self.operation_timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(unavailable(&format!("{op} failed: {e}"))),
            Err(_) => Err(unavailable(&format!("{op} timed out"))),
        }
    }
}

fn unavailable(reason: &str) -> ApplicationError {
    ApplicationError::StoreUnavailable(format!("redis: {reason}"))
}

#[async_trait]
impl KeyValueStore for RedisStore {
    #[instrument(skip(self), level = "trace")]
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, ApplicationError> {
        let mut conn = self.connection().await?;
        self.bounded("GET", conn.get(key)).await
    }

    #[instrument(skip(self, value), level = "trace")]
    async fn set(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl: Option<Duration>,
    ) -> Result<(), ApplicationError> {
        let mut conn = self.connection().await?;
        match ttl {
            Some(ttl) => {
                #[allow(clippy::cast_possible_truncation)]
                let millis = (ttl.as_millis() as u64).max(1);
                self.bounded("SET PX", conn.pset_ex(key, value, millis))
                    .await
            },
            None => self.bounded("SET", conn.set(key, value)).await,
        }
    }

    #[instrument(skip(self), fields(count = keys.len()), level = "trace")]
    async fn delete(&self, keys: &[String]) -> Result<u64, ApplicationError> {
        if keys.is_empty() {
            return Ok(0);
        }
        let mut conn = self.connection().await?;
        self.bounded("DEL", conn.del(keys)).await
    }

    #[instrument(skip(self), level = "trace")]
    async fn scan(
        &self,
        cursor: u64,
        pattern: &str,
        count: usize,
    ) -> Result<ScanPage, ApplicationError> {
        let mut conn = self.connection().await?;
        let (cursor, keys): (u64, Vec<String>) = self
            .bounded(
                "SCAN",
                redis::cmd("SCAN")
                    .arg(cursor)
                    .arg("MATCH")
                    .arg(pattern)
                    .arg("COUNT")
                    .arg(count)
                    .query_async(&mut conn),
            )
            .await?;
        Ok(ScanPage { cursor, keys })
    }

    #[instrument(skip(self), level = "trace")]
    async fn ttl(&self, key: &str) -> Result<KeyTtl, ApplicationError> {
        let mut conn = self.connection().await?;
        let reply: i64 = self.bounded("PTTL", conn.pttl(key)).await?;
        Ok(KeyTtl::from_millis_reply(reply))
    }
}
