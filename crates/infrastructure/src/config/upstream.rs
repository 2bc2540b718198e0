//! Third-party upstream caching settings.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::default_true;

/// How responses from third-party APIs are cached
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpstreamCacheConfig {
    /// Honor the upstream's own `Cache-Control` max-age (clamped to `max_ttl_secs`)
    #[serde(default = "default_true")]
    pub respect_cache_control: bool,

    /// TTL when the upstream gives no usable directive (default: 10 minutes)
    #[serde(default = "default_ttl")]
    pub default_ttl_secs: u64,

    /// Ceiling on any upstream-derived TTL (default: 1 hour)
    #[serde(default = "default_max_ttl")]
    pub max_ttl_secs: u64,

    /// Deadline for upstream requests in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

const fn default_ttl() -> u64 {
    10 * 60 // 10 minutes
}

const fn default_max_ttl() -> u64 {
    60 * 60 // 1 hour
}

const fn default_request_timeout() -> u64 {
    10
}

impl Default for UpstreamCacheConfig {
    fn default() -> Self {
        Self {
            respect_cache_control: true,
            default_ttl_secs: default_ttl(),
            max_ttl_secs: default_max_ttl(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl UpstreamCacheConfig {
    #[must_use]
    pub const fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.default_ttl_secs)
    }

    #[must_use]
    pub const fn max_ttl(&self) -> Duration {
        Duration::from_secs(self.max_ttl_secs)
    }

    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
