//! Disposable Redis server for store adapter tests

use testcontainers::{ContainerAsync, ImageExt, runners::AsyncRunner};
use testcontainers_modules::redis::Redis;
use thiserror::Error;
use tracing::info;

use crate::cache::RedisStore;
use crate::config::RedisConfig;

const REDIS_TAG: &str = "7-alpine";
const REDIS_PORT: u16 = 6379;

#[derive(Debug, Error)]
pub enum ContainerError {
    #[error("Redis container failed to start: {0}")]
    Start(String),

    #[error("Redis container rejected store setup: {0}")]
    Store(String),
}

/// A running Redis container, stopped on drop
#[derive(Debug)]
pub struct RedisContainer {
    _container: ContainerAsync<Redis>,
    url: String,
}

impl RedisContainer {
    pub async fn start() -> Result<Self, ContainerError> {
        let container = Redis::default()
            .with_tag(REDIS_TAG)
            .start()
            .await
            .map_err(|e| ContainerError::Start(e.to_string()))?;
        let host = container
            .get_host()
            .await
            .map_err(|e| ContainerError::Start(e.to_string()))?;
        let port = container
            .get_host_port_ipv4(REDIS_PORT)
            .await
            .map_err(|e| ContainerError::Start(e.to_string()))?;

        let url = format!("redis://{host}:{port}");
        info!(url = %url, "Redis container ready");
        Ok(Self {
            _container: container,
            url,
        })
    }

    /// Store settings pointing at this container
    pub fn redis_config(&self) -> RedisConfig {
        RedisConfig {
            url: self.url.clone(),
            ..RedisConfig::default()
        }
    }

    /// A store adapter connected to this container
    pub fn store(&self) -> Result<RedisStore, ContainerError> {
        RedisStore::new(&self.redis_config()).map_err(|e| ContainerError::Store(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_error_names_redis() {
        let error = ContainerError::Start("no docker socket".into());
        assert_eq!(
            error.to_string(),
            "Redis container failed to start: no docker socket"
        );
    }
}
