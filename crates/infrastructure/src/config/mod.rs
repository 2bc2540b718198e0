//! Application configuration
//!
//! Split into focused sub-modules:
//! - `cache`: Key namespace, per-category TTLs, jitter, scan batch size
//! - `redis`: Backing store connection and deadlines
//! - `upstream`: Third-party response caching policy
//! - `telemetry`: Log filter and format
//!
//! Values are read from an optional `config.toml`, then overridden by
//! `CACHELAYER__*` environment variables (e.g. `CACHELAYER__CACHE__ENABLED=false`).

mod cache;
mod redis;
mod telemetry;
mod upstream;

use std::fmt;

use application::ApplicationError;
use serde::{Deserialize, Serialize};

pub use cache::CacheConfig;
pub use redis::RedisConfig;
pub use telemetry::{LogFormat, TelemetryConfig};
pub use upstream::UpstreamCacheConfig;

/// Prefix for environment variable overrides
pub const ENV_PREFIX: &str = "CACHELAYER";

/// Shared default for boolean `true` fields across config structs
pub(crate) const fn default_true() -> bool {
    true
}

/// Deployment environment, the second key segment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl Environment {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Staging => "staging",
            Self::Production => "production",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "development" | "dev" => Ok(Self::Development),
            "staging" | "stage" => Ok(Self::Staging),
            "production" | "prod" => Ok(Self::Production),
            _ => Err(format!(
                "Invalid environment: {s}. Use 'development', 'staging' or 'production'"
            )),
        }
    }
}

/// Main application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Deployment environment
    #[serde(default)]
    pub environment: Environment,

    /// Cache configuration
    #[serde(default)]
    pub cache: CacheConfig,

    /// Backing store configuration
    #[serde(default)]
    pub redis: RedisConfig,

    /// Upstream response caching
    #[serde(default)]
    pub upstream: UpstreamCacheConfig,

    /// Logging
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

impl AppConfig {
    /// Load configuration from `config.toml` (if present) and the environment
    pub fn load() -> Result<Self, config::ConfigError> {
        Self::load_from("config")
    }

    /// Load configuration from the named file (if present) and the environment
    pub fn load_from(file: &str) -> Result<Self, config::ConfigError> {
        let builder = config::Config::builder()
            // Load from file if exists
            .add_source(config::File::with_name(file).required(false))
            // Override with environment variables (e.g., CACHELAYER__REDIS__URL)
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Parse configuration from a TOML document
    pub fn from_toml(toml: &str) -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(config::File::from_str(toml, config::FileFormat::Toml))
            .build()?
            .try_deserialize()
    }

    /// Reject settings the cache layer cannot operate with
    pub fn validate(&self) -> Result<(), ApplicationError> {
        let mut problems = Vec::new();

        if self.cache.namespace.trim().is_empty() {
            problems.push("cache.namespace must not be empty".to_string());
        }
        if self.cache.schema_version.trim().is_empty() {
            problems.push("cache.schema_version must not be empty".to_string());
        }
        if !(0.0..1.0).contains(&self.cache.jitter_factor) {
            problems.push(format!(
                "cache.jitter_factor must be in [0, 1), got {}",
                self.cache.jitter_factor
            ));
        }
        if self.cache.scan_batch_size == 0 {
            problems.push("cache.scan_batch_size must be positive".to_string());
        }
        if self.redis.operation_timeout_ms == 0 {
            problems.push("redis.operation_timeout_ms must be positive".to_string());
        }
        if self.upstream.default_ttl_secs > self.upstream.max_ttl_secs {
            problems.push(format!(
                "upstream.default_ttl_secs ({}) exceeds upstream.max_ttl_secs ({})",
                self.upstream.default_ttl_secs, self.upstream.max_ttl_secs
            ));
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(ApplicationError::Configuration(problems.join("; ")))
        }
    }
}
