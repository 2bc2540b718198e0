//! Per-category TTL policy

use std::time::Duration;

use super::CacheCategory;

/// Nominal time-to-live for each access category
///
/// Durations are nominal: the cache client applies jitter when writing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TtlPolicy {
    /// Single-entity reads (default: 30 minutes)
    pub entity: Duration,
    /// List / collection reads (default: 5 minutes)
    pub list: Duration,
    /// Search results (default: 2 minutes)
    pub search: Duration,
    /// Third-party upstream reads (default: 10 minutes)
    pub upstream: Duration,
    /// Negative / not-found results (default: 30 seconds)
    pub negative: Duration,
}

impl Default for TtlPolicy {
    fn default() -> Self {
        Self {
            entity: Duration::from_secs(30 * 60),
            list: Duration::from_secs(5 * 60),
            search: Duration::from_secs(2 * 60),
            upstream: Duration::from_secs(10 * 60),
            negative: Duration::from_secs(30),
        }
    }
}

impl TtlPolicy {
    /// Nominal TTL for a category
    #[must_use]
    pub const fn for_category(&self, category: CacheCategory) -> Duration {
        match category {
            CacheCategory::Entity => self.entity,
            CacheCategory::List => self.list,
            CacheCategory::Search => self.search,
            CacheCategory::Upstream => self.upstream,
            CacheCategory::Negative => self.negative,
        }
    }
}
