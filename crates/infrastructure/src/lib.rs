//! Infrastructure layer - Adapters for external systems
//!
//! Implements the store port for Redis and in process, the HTTP semantic
//! cache over `reqwest`, configuration loading, and tracing setup.

pub mod bootstrap;
pub mod cache;
pub mod config;
pub mod http;
pub mod telemetry;
#[cfg(test)]
pub mod testing;

pub use bootstrap::CacheServices;
pub use cache::{InMemoryStore, RedisStore, glob_match};
pub use config::{
    AppConfig, CacheConfig, Environment, LogFormat, RedisConfig, TelemetryConfig,
    UpstreamCacheConfig,
};
pub use http::{
    CachedUpstreamClient, HttpResponseCache, ResponseSource, UpstreamCachePolicy, UpstreamError,
    UpstreamResponse, parse_cache_control_max_age,
};
pub use telemetry::{TelemetryError, init_tracing};
