//! Backing store connection settings.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Redis connection configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedisConfig {
    /// Connection URL (e.g., "redis://localhost:6379")
    #[serde(default = "default_url")]
    pub url: String,

    /// Connect timeout in milliseconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_ms: u64,

    /// Per-command deadline in milliseconds
    #[serde(default = "default_operation_timeout")]
    pub operation_timeout_ms: u64,
}

fn default_url() -> String {
    "redis://localhost:6379".to_string()
}

const fn default_connect_timeout() -> u64 {
    2_000
}

const fn default_operation_timeout() -> u64 {
    500
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            connect_timeout_ms: default_connect_timeout(),
            operation_timeout_ms: default_operation_timeout(),
        }
    }
}

impl RedisConfig {
    /// Get the connect timeout as a Duration
    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Get the per-command deadline as a Duration
    #[must_use]
    pub const fn operation_timeout(&self) -> Duration {
        Duration::from_millis(self.operation_timeout_ms)
    }
}
