//! Cache introspection and administration
//!
//! Key enumeration is a lazy sequence over the store's cursor scan: each
//! call to [`CacheInspector::scan`] starts a fresh scan, and a scan error ends
//! the sequence after being yielded. A scan may return the same key more than
//! once, so aggregating operations deduplicate.

use std::{
    collections::{BTreeMap, BTreeSet, VecDeque},
    sync::Arc,
    time::Duration,
};

use domain::{DomainError, KeyBuilder, escape_glob};
use futures::{StreamExt, TryStreamExt, stream::BoxStream};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use super::metrics::CacheMetrics;
use crate::error::ApplicationError;
use crate::ports::{KeyTtl, KeyValueStore};

/// Lazily scanned key names
pub type KeyStream = BoxStream<'static, Result<String, ApplicationError>>;

/// Concurrent TTL lookups while gathering stats
const TTL_LOOKUP_CONCURRENCY: usize = 16;

/// Default histogram bucket upper bounds: 1m, 5m, 15m, 1h, 6h, 24h
pub const DEFAULT_TTL_BUCKETS: [Duration; 6] = [
    Duration::from_secs(60),
    Duration::from_secs(5 * 60),
    Duration::from_secs(15 * 60),
    Duration::from_secs(60 * 60),
    Duration::from_secs(6 * 60 * 60),
    Duration::from_secs(24 * 60 * 60),
];

/// Read-side and maintenance operations over the raw key space
#[derive(Debug, Clone)]
pub struct CacheInspector {
    store: Arc<dyn KeyValueStore>,
    batch_size: usize,
    metrics: Arc<CacheMetrics>,
}

struct ScanState {
    store: Arc<dyn KeyValueStore>,
    pattern: String,
    batch_size: usize,
    cursor: Option<u64>,
    buffered: VecDeque<String>,
}

impl CacheInspector {
    pub fn new(store: Arc<dyn KeyValueStore>, batch_size: usize) -> Self {
        Self {
            store,
            batch_size: batch_size.max(1),
            metrics: Arc::new(CacheMetrics::new()),
        }
    }

    #[must_use]
    pub fn with_metrics(mut self, metrics: Arc<CacheMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Enumerate keys matching a glob `pattern`
    ///
    /// Nothing is fetched until the stream is polled.
    pub fn scan(&self, pattern: &str) -> KeyStream {
        let state = ScanState {
            store: Arc::clone(&self.store),
            pattern: pattern.to_owned(),
            batch_size: self.batch_size,
            cursor: Some(0),
            buffered: VecDeque::new(),
        };

        futures::stream::try_unfold(state, |mut state| async move {
            loop {
                if let Some(key) = state.buffered.pop_front() {
                    return Ok(Some((key, state)));
                }
                let Some(cursor) = state.cursor else {
                    return Ok(None);
                };

                let page = state
                    .store
                    .scan(cursor, &state.pattern, state.batch_size)
                    .await?;
                state.cursor = (!page.is_last()).then_some(page.cursor);
                state.buffered.extend(page.keys);
            }
        })
        .boxed()
    }

    /// Count keys matching `pattern` and collect their remaining TTLs
    ///
    /// # Errors
    ///
    /// Returns `StoreUnavailable` if the scan or a TTL lookup fails.
    #[instrument(skip(self), level = "debug")]
    pub async fn stats(&self, pattern: &str) -> Result<KeyStats, ApplicationError> {
        let keys: BTreeSet<String> = self.scan(pattern).try_collect().await?;

        let store = &self.store;
        let ttls: BTreeMap<String, KeyTtl> = futures::stream::iter(keys)
            .map(|key| async move {
                let ttl = store.ttl(&key).await?;
                Ok::<_, ApplicationError>((key, ttl))
            })
            .buffer_unordered(TTL_LOOKUP_CONCURRENCY)
            .try_collect()
            .await?;

        debug!(pattern, count = ttls.len(), "Collected key stats");
        Ok(KeyStats {
            pattern: pattern.to_owned(),
            ttls,
        })
    }

    /// Delete every key whose name starts with `prefix`
    ///
    /// Keys not under the prefix are left alone. Intended for maintenance
    /// paths, not request handling.
    ///
    /// # Errors
    ///
    /// Rejects an empty prefix, and returns `StoreUnavailable` if scanning or
    /// deleting fails part-way (keys already deleted stay deleted).
    #[instrument(skip(self), level = "debug")]
    pub async fn invalidate_by_prefix(&self, prefix: &str) -> Result<u64, ApplicationError> {
        if prefix.is_empty() {
            return Err(DomainError::ValidationError(
                "refusing to invalidate an empty prefix".into(),
            )
            .into());
        }

        let pattern = format!("{}*", escape_glob(prefix));
        let deleted = self.delete_matching(&pattern).await?;
        info!(prefix, deleted, "Invalidated keys by prefix");
        Ok(deleted)
    }

    /// Delete every key matching a glob `pattern`, in scan-sized batches
    ///
    /// # Errors
    ///
    /// Returns `StoreUnavailable` if scanning or deleting fails part-way.
    #[instrument(skip(self), level = "debug")]
    pub async fn delete_matching(&self, pattern: &str) -> Result<u64, ApplicationError> {
        let mut keys = self.scan(pattern);
        let mut batch = Vec::with_capacity(self.batch_size);
        let mut deleted = 0;

        while let Some(key) = keys.try_next().await? {
            batch.push(key);
            if batch.len() >= self.batch_size {
                deleted += self.delete_batch(&mut batch).await?;
            }
        }
        if !batch.is_empty() {
            deleted += self.delete_batch(&mut batch).await?;
        }

        self.metrics.record_deletes(deleted);
        Ok(deleted)
    }

    async fn delete_batch(&self, batch: &mut Vec<String>) -> Result<u64, ApplicationError> {
        batch.sort_unstable();
        batch.dedup();
        let removed = self.store.delete(batch).await.inspect_err(|e| {
            self.metrics.record_store_error();
            warn!(error = %e, "Batch delete failed");
        })?;
        batch.clear();
        Ok(removed)
    }
}

/// Keys matching a pattern and their remaining TTLs
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyStats {
    pub pattern: String,
    pub ttls: BTreeMap<String, KeyTtl>,
}

impl KeyStats {
    pub fn count(&self) -> usize {
        self.ttls.len()
    }

    /// Bucket remaining TTLs by the given upper bounds
    pub fn histogram(&self, bounds: &[Duration]) -> TtlHistogram {
        TtlHistogram::from_ttls(self.ttls.values(), bounds)
    }
}

/// One histogram bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TtlBucket {
    /// Inclusive upper bound; `None` for the overflow bucket
    pub upper_bound: Option<Duration>,
    pub count: usize,
}

/// Distribution of remaining TTLs
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TtlHistogram {
    pub buckets: Vec<TtlBucket>,
    /// Keys with no expiry
    pub persistent: usize,
    /// Keys that vanished between scan and TTL lookup
    pub missing: usize,
}

impl TtlHistogram {
    pub fn from_ttls<'a>(
        ttls: impl IntoIterator<Item = &'a KeyTtl>,
        bounds: &[Duration],
    ) -> Self {
        let mut sorted = bounds.to_vec();
        sorted.sort_unstable();
        sorted.dedup();

        let mut buckets: Vec<TtlBucket> = sorted
            .iter()
            .map(|&bound| TtlBucket {
                upper_bound: Some(bound),
                count: 0,
            })
            .chain(std::iter::once(TtlBucket {
                upper_bound: None,
                count: 0,
            }))
            .collect();
        let mut persistent = 0;
        let mut missing = 0;

        for ttl in ttls {
            match ttl {
                KeyTtl::Expires(remaining) => {
                    let index = sorted.partition_point(|bound| bound < remaining);
                    buckets[index].count += 1;
                },
                KeyTtl::Persistent => persistent += 1,
                KeyTtl::Missing => missing += 1,
            }
        }

        Self {
            buckets,
            persistent,
            missing,
        }
    }

    /// Total keys counted, including persistent and missing
    pub fn total(&self) -> usize {
        self.buckets.iter().map(|b| b.count).sum::<usize>() + self.persistent + self.missing
    }
}

/// A single key's raw value and TTL
#[derive(Debug, Clone, PartialEq)]
pub struct KeyInspection {
    pub key: String,
    pub ttl: KeyTtl,
    pub size_bytes: usize,
    /// The payload as text (lossy for non-UTF-8 bytes)
    pub text: String,
    /// The payload parsed as JSON, when it is JSON
    pub json: Option<serde_json::Value>,
}

/// Library boundary for the external inspection tool
///
/// Destructive operations refuse to run unless explicitly confirmed.
#[derive(Debug, Clone)]
pub struct CacheAdmin {
    inspector: CacheInspector,
    keys: KeyBuilder,
}

impl CacheAdmin {
    pub const fn new(inspector: CacheInspector, keys: KeyBuilder) -> Self {
        Self { inspector, keys }
    }

    pub const fn inspector(&self) -> &CacheInspector {
        &self.inspector
    }

    /// Up to `limit` distinct keys matching `pattern`, sorted
    ///
    /// # Errors
    ///
    /// Returns `StoreUnavailable` if the scan fails.
    pub async fn list_keys(
        &self,
        pattern: &str,
        limit: usize,
    ) -> Result<Vec<String>, ApplicationError> {
        let mut stream = self.inspector.scan(pattern);
        let mut seen = BTreeSet::new();
        while seen.len() < limit {
            match stream.try_next().await? {
                Some(key) => {
                    seen.insert(key);
                },
                None => break,
            }
        }
        Ok(seen.into_iter().collect())
    }

    /// Fetch a key's value and remaining TTL
    ///
    /// # Errors
    ///
    /// Returns `StoreUnavailable` if either lookup fails.
    pub async fn inspect(&self, key: &str) -> Result<Option<KeyInspection>, ApplicationError> {
        let store = &self.inspector.store;
        let Some(bytes) = store.get(key).await? else {
            return Ok(None);
        };
        let ttl = store.ttl(key).await?;

        Ok(Some(KeyInspection {
            key: key.to_owned(),
            ttl,
            size_bytes: bytes.len(),
            text: String::from_utf8_lossy(&bytes).into_owned(),
            json: serde_json::from_slice(&bytes).ok(),
        }))
    }

    /// Key count and TTL distribution for `pattern`
    ///
    /// # Errors
    ///
    /// Returns `StoreUnavailable` if the scan or a TTL lookup fails.
    pub async fn stats(&self, pattern: &str) -> Result<KeyStats, ApplicationError> {
        self.inspector.stats(pattern).await
    }

    /// Delete every key matching `pattern`
    ///
    /// # Errors
    ///
    /// Returns `ConfirmationRequired` unless `confirm` is set.
    pub async fn delete_matching(
        &self,
        pattern: &str,
        confirm: bool,
    ) -> Result<u64, ApplicationError> {
        if !confirm {
            return Err(ApplicationError::ConfirmationRequired(format!(
                "deleting keys matching '{pattern}'"
            )));
        }
        let deleted = self.inspector.delete_matching(pattern).await?;
        info!(pattern, deleted, "Deleted keys by pattern");
        Ok(deleted)
    }

    /// Delete every key of this namespace and environment, across all
    /// schema versions
    ///
    /// # Errors
    ///
    /// Returns `ConfirmationRequired` unless `confirm` is set.
    pub async fn clear_namespace(&self, confirm: bool) -> Result<u64, ApplicationError> {
        let prefix = self.keys.environment_prefix();
        if !confirm {
            return Err(ApplicationError::ConfirmationRequired(format!(
                "clearing every key under '{prefix}'"
            )));
        }
        self.inspector.invalidate_by_prefix(&prefix).await
    }
}
