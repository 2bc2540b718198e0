//! Application services - Cache-aside engine and helpers

mod cache_client;
mod flight;
mod introspection;
mod jitter;
mod metrics;
mod resource_cache;

pub use cache_client::{CacheClient, CacheSettings, DEFAULT_SCAN_BATCH_SIZE};
pub use introspection::{
    CacheAdmin, CacheInspector, DEFAULT_TTL_BUCKETS, KeyInspection, KeyStats, KeyStream,
    TtlBucket, TtlHistogram,
};
pub use jitter::{DEFAULT_JITTER_FACTOR, jittered_ttl};
pub use metrics::{CacheMetrics, MetricsSnapshot};
pub use resource_cache::{EntityCache, ListCache};
