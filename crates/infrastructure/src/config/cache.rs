//! Cache configuration with TTL settings.

use std::time::Duration;

use application::CacheSettings;
use domain::TtlPolicy;
use serde::{Deserialize, Serialize};

use super::default_true;

/// Cache configuration: key namespace, per-category TTLs, and scan tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Whether caching is enabled; when false every read computes directly
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Application namespace, the first key segment
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Cache schema version; bumping it orphans every existing key
    #[serde(default = "default_schema_version")]
    pub schema_version: String,

    /// Single-entity TTL in seconds (default: 30 minutes)
    #[serde(default = "default_entity_ttl")]
    pub entity_ttl_secs: u64,

    /// List TTL in seconds (default: 5 minutes)
    #[serde(default = "default_list_ttl")]
    pub list_ttl_secs: u64,

    /// Search TTL in seconds (default: 2 minutes)
    #[serde(default = "default_search_ttl")]
    pub search_ttl_secs: u64,

    /// Upstream response TTL in seconds (default: 10 minutes)
    #[serde(default = "default_upstream_ttl")]
    pub upstream_ttl_secs: u64,

    /// Negative result TTL in seconds (default: 30 seconds)
    #[serde(default = "default_negative_ttl")]
    pub negative_ttl_secs: u64,

    /// Relative TTL jitter (default: 0.1 = ±10%)
    #[serde(default = "default_jitter_factor")]
    pub jitter_factor: f64,

    /// Keys requested per SCAN step (default: 500)
    #[serde(default = "default_scan_batch_size")]
    pub scan_batch_size: usize,
}

fn default_namespace() -> String {
    "cachelayer".to_string()
}

fn default_schema_version() -> String {
    "v1".to_string()
}

const fn default_entity_ttl() -> u64 {
    30 * 60 // 30 minutes
}

const fn default_list_ttl() -> u64 {
    5 * 60 // 5 minutes
}

const fn default_search_ttl() -> u64 {
    2 * 60 // 2 minutes
}

const fn default_upstream_ttl() -> u64 {
    10 * 60 // 10 minutes
}

const fn default_negative_ttl() -> u64 {
    30
}

const fn default_jitter_factor() -> f64 {
    0.1
}

const fn default_scan_batch_size() -> usize {
    500
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            namespace: default_namespace(),
            schema_version: default_schema_version(),
            entity_ttl_secs: default_entity_ttl(),
            list_ttl_secs: default_list_ttl(),
            search_ttl_secs: default_search_ttl(),
            upstream_ttl_secs: default_upstream_ttl(),
            negative_ttl_secs: default_negative_ttl(),
            jitter_factor: default_jitter_factor(),
            scan_batch_size: default_scan_batch_size(),
        }
    }
}

impl CacheConfig {
    /// Per-category TTLs as a domain policy
    #[must_use]
    pub const fn ttl_policy(&self) -> TtlPolicy {
        TtlPolicy {
            entity: Duration::from_secs(self.entity_ttl_secs),
            list: Duration::from_secs(self.list_ttl_secs),
            search: Duration::from_secs(self.search_ttl_secs),
            upstream: Duration::from_secs(self.upstream_ttl_secs),
            negative: Duration::from_secs(self.negative_ttl_secs),
        }
    }

    /// Runtime switches for the cache client
    #[must_use]
    pub const fn settings(&self) -> CacheSettings {
        CacheSettings {
            enabled: self.enabled,
            jitter_factor: self.jitter_factor,
            scan_batch_size: self.scan_batch_size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_ttl_policy_defaults() {
        assert_eq!(CacheConfig::default().ttl_policy(), TtlPolicy::default());
    }

    #[test]
    fn settings_carry_switches() {
        let config = CacheConfig {
            enabled: false,
            jitter_factor: 0.2,
            scan_batch_size: 50,
            ..CacheConfig::default()
        };
        let settings = config.settings();
        assert!(!settings.enabled);
        assert!((settings.jitter_factor - 0.2).abs() < f64::EPSILON);
        assert_eq!(settings.scan_batch_size, 50);
    }

    #[test]
    fn missing_fields_take_defaults() {
        let config: CacheConfig = serde_json::from_str(r#"{"namespace": "stats"}"#).unwrap();
        assert_eq!(config.namespace, "stats");
        assert_eq!(config.schema_version, "v1");
        assert_eq!(config.entity_ttl_secs, 1800);
        assert!(config.enabled);
    }
}
