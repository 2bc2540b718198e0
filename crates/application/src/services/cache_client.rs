//! Core cache client
//!
//! Cache-aside primitives over a [`KeyValueStore`] plus a coalescing
//! compute-on-miss operation. Cache failures fail open: reads degrade to a
//! miss and writes are advisory, so a degraded store never fails a request.

use std::{future::Future, sync::Arc, time::Duration};

use bytes::Bytes;
use domain::{CacheKey, KeyBuilder, TtlPolicy};
use serde::{Serialize, de::DeserializeOwned};
use tracing::{debug, instrument, warn};

use super::flight::{Flight, FlightLeader, FlightOutcome, FlightRegistry};
use super::introspection::CacheInspector;
use super::jitter::{DEFAULT_JITTER_FACTOR, jittered_ttl};
use super::metrics::CacheMetrics;
use crate::error::{ApplicationError, ComputeError};
use crate::ports::KeyValueStore;

/// Default number of keys requested per scan step
pub const DEFAULT_SCAN_BATCH_SIZE: usize = 500;

/// Runtime switches for the cache client
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CacheSettings {
    /// When false every operation bypasses the store entirely
    pub enabled: bool,
    /// Relative TTL spread applied on write (0.1 = ±10%)
    pub jitter_factor: f64,
    /// Keys requested per scan step during bulk operations
    pub scan_batch_size: usize,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            jitter_factor: DEFAULT_JITTER_FACTOR,
            scan_batch_size: DEFAULT_SCAN_BATCH_SIZE,
        }
    }
}

/// Cache-aside client shared by every cache helper
///
/// Cloning is cheap; clones share the store, the coalescing registry and the
/// metrics.
#[derive(Debug, Clone)]
pub struct CacheClient {
    store: Arc<dyn KeyValueStore>,
    keys: KeyBuilder,
    ttl_policy: TtlPolicy,
    settings: CacheSettings,
    flights: Arc<FlightRegistry>,
    metrics: Arc<CacheMetrics>,
}

impl CacheClient {
    /// Create a client with default TTL policy and settings
    pub fn new(store: Arc<dyn KeyValueStore>, keys: KeyBuilder) -> Self {
        Self {
            store,
            keys,
            ttl_policy: TtlPolicy::default(),
            settings: CacheSettings::default(),
            flights: Arc::new(FlightRegistry::new()),
            metrics: Arc::new(CacheMetrics::new()),
        }
    }

    #[must_use]
    pub const fn with_ttl_policy(mut self, ttl_policy: TtlPolicy) -> Self {
        self.ttl_policy = ttl_policy;
        self
    }

    #[must_use]
    pub const fn with_settings(mut self, settings: CacheSettings) -> Self {
        self.settings = settings;
        self
    }

    #[must_use]
    pub fn with_metrics(mut self, metrics: Arc<CacheMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub const fn keys(&self) -> &KeyBuilder {
        &self.keys
    }

    pub const fn ttl_policy(&self) -> &TtlPolicy {
        &self.ttl_policy
    }

    pub const fn settings(&self) -> &CacheSettings {
        &self.settings
    }

    pub const fn is_enabled(&self) -> bool {
        self.settings.enabled
    }

    pub fn metrics(&self) -> &Arc<CacheMetrics> {
        &self.metrics
    }

    pub fn store(&self) -> &Arc<dyn KeyValueStore> {
        &self.store
    }

    /// Introspection over the same store and metrics
    pub fn inspector(&self) -> CacheInspector {
        CacheInspector::new(Arc::clone(&self.store), self.settings.scan_batch_size)
            .with_metrics(Arc::clone(&self.metrics))
    }

    /// Look up a value
    ///
    /// Returns `None` on a miss and also when the cache is disabled, the
    /// store fails, or the stored payload does not decode as `T`.
    #[instrument(skip(self), fields(key = %key), level = "debug")]
    pub async fn get<T: DeserializeOwned>(&self, key: &CacheKey) -> Option<T> {
        if !self.settings.enabled {
            return None;
        }

        let value = match self.fetch(key).await {
            Some(bytes) => self.decode(key, &bytes),
            None => None,
        };

        if value.is_some() {
            self.metrics.record_hit();
            debug!("Cache hit");
        } else {
            self.metrics.record_miss();
            debug!("Cache miss");
        }
        value
    }

    /// Store a value under `key` for a jittered `ttl`
    ///
    /// A zero `ttl` stores without expiry. A disabled cache accepts and
    /// discards the write.
    ///
    /// # Errors
    ///
    /// Returns `Serialization` if `value` cannot be encoded, or
    /// `StoreUnavailable` if the write fails. Both are advisory.
    #[instrument(skip(self, value), fields(key = %key), level = "debug")]
    pub async fn set<T>(
        &self,
        key: &CacheKey,
        value: &T,
        ttl: Duration,
    ) -> Result<(), ApplicationError>
    where
        T: Serialize + ?Sized,
    {
        self.encode_and_write(key, value, ttl, None).await
    }

    /// Store a value like [`CacheClient::set`], never past `ceiling`
    ///
    /// The jittered expiry is clamped to `ceiling`, so an upper bound taken
    /// from configuration holds after jitter too.
    ///
    /// # Errors
    ///
    /// Same as [`CacheClient::set`].
    #[instrument(skip(self, value), fields(key = %key), level = "debug")]
    pub async fn set_capped<T>(
        &self,
        key: &CacheKey,
        value: &T,
        ttl: Duration,
        ceiling: Duration,
    ) -> Result<(), ApplicationError>
    where
        T: Serialize + ?Sized,
    {
        self.encode_and_write(key, value, ttl, Some(ceiling)).await
    }

    async fn encode_and_write<T>(
        &self,
        key: &CacheKey,
        value: &T,
        ttl: Duration,
        ceiling: Option<Duration>,
    ) -> Result<(), ApplicationError>
    where
        T: Serialize + ?Sized,
    {
        if !self.settings.enabled {
            return Ok(());
        }

        let bytes = serde_json::to_vec(value).inspect_err(|_| {
            self.metrics.record_serialization_error();
        })?;
        self.write(key, bytes, ttl, ceiling).await
    }

    /// Remove `key`
    ///
    /// # Errors
    ///
    /// Returns `StoreUnavailable` if the store rejects the delete.
    #[instrument(skip(self), fields(key = %key), level = "debug")]
    pub async fn delete(&self, key: &CacheKey) -> Result<(), ApplicationError> {
        if !self.settings.enabled {
            return Ok(());
        }

        match self.store.delete(&[key.as_str().to_owned()]).await {
            Ok(removed) => {
                self.metrics.record_deletes(removed);
                Ok(())
            },
            Err(e) => {
                self.metrics.record_store_error();
                warn!(key = %key, error = %e, "Cache delete failed");
                Err(e)
            },
        }
    }

    /// Return the cached value or compute, store and return it
    ///
    /// Concurrent callers missing on the same key are coalesced: exactly one
    /// of them runs `compute` and the rest receive its value or its error.
    /// Compute errors are never cached. When the cache is disabled `compute`
    /// runs on every call.
    ///
    /// # Errors
    ///
    /// Returns the computation's error, shared by every coalesced caller.
    #[instrument(skip(self, compute), fields(key = %key), level = "debug")]
    pub async fn get_or_compute<T, F, Fut, E>(
        &self,
        key: &CacheKey,
        ttl: Duration,
        compute: F,
    ) -> Result<T, ComputeError>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::error::Error + Send + Sync + 'static,
    {
        if !self.settings.enabled {
            return compute().await.map_err(ComputeError::new);
        }

        if let Some(value) = self.get(key).await {
            return Ok(value);
        }

        loop {
            let follower = match self.flights.join(key.as_str()) {
                Flight::Leader(leader) => return self.lead(key, ttl, leader, compute).await,
                Flight::Follower(follower) => follower,
            };

            self.metrics.record_coalesced_wait();
            debug!("Waiting on in-flight computation");

            match follower.wait().await {
                Some(FlightOutcome::Value(bytes)) => {
                    if let Some(value) = self.decode(key, &bytes) {
                        return Ok(value);
                    }
                    return Self::compute_uncached(compute).await;
                },
                Some(FlightOutcome::Failed(err)) => return Err(err),
                Some(FlightOutcome::Unshareable) => return Self::compute_uncached(compute).await,
                None => {
                    debug!("In-flight computation abandoned, retrying");
                    if let Some(value) = self.peek(key).await {
                        return Ok(value);
                    }
                },
            }
        }
    }

    async fn lead<T, F, Fut, E>(
        &self,
        key: &CacheKey,
        ttl: Duration,
        leader: FlightLeader<'_>,
        compute: F,
    ) -> Result<T, ComputeError>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::error::Error + Send + Sync + 'static,
    {
        // Another process or a just-finished flight may have filled the key.
        if let Some(bytes) = self.fetch(key).await {
            if let Some(value) = self.decode::<T>(key, &bytes) {
                leader.complete(FlightOutcome::Value(Bytes::from(bytes)));
                return Ok(value);
            }
        }

        self.metrics.record_computation();
        let value = match compute().await {
            Ok(value) => value,
            Err(e) => {
                let err = ComputeError::new(e);
                debug!(error = %err, "Computation failed");
                leader.complete(FlightOutcome::Failed(err.clone()));
                return Err(err);
            },
        };

        match serde_json::to_vec(&value) {
            Ok(bytes) => {
                if let Err(e) = self.write(key, bytes.clone(), ttl, None).await {
                    debug!(error = %e, "Computed value not stored");
                }
                leader.complete(FlightOutcome::Value(Bytes::from(bytes)));
            },
            Err(e) => {
                self.metrics.record_serialization_error();
                warn!(key = %key, error = %e, "Computed value is not serializable");
                leader.complete(FlightOutcome::Unshareable);
            },
        }
        Ok(value)
    }

    async fn compute_uncached<T, F, Fut, E>(compute: F) -> Result<T, ComputeError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::error::Error + Send + Sync + 'static,
    {
        compute().await.map_err(ComputeError::new)
    }

    /// Read without touching hit/miss counters
    async fn peek<T: DeserializeOwned>(&self, key: &CacheKey) -> Option<T> {
        let bytes = self.fetch(key).await?;
        self.decode(key, &bytes)
    }

    async fn fetch(&self, key: &CacheKey) -> Option<Vec<u8>> {
        match self.store.get(key.as_str()).await {
            Ok(bytes) => bytes,
            Err(e) => {
                self.metrics.record_store_error();
                warn!(key = %key, error = %e, "Cache read failed, treating as miss");
                None
            },
        }
    }

    fn decode<T: DeserializeOwned>(&self, key: &CacheKey, bytes: &[u8]) -> Option<T> {
        match serde_json::from_slice(bytes) {
            Ok(value) => Some(value),
            Err(e) => {
                self.metrics.record_serialization_error();
                warn!(key = %key, error = %e, "Cached value failed to decode, treating as miss");
                None
            },
        }
    }

    async fn write(
        &self,
        key: &CacheKey,
        bytes: Vec<u8>,
        ttl: Duration,
        ceiling: Option<Duration>,
    ) -> Result<(), ApplicationError> {
        let expiry = (!ttl.is_zero()).then(|| {
            let jittered = jittered_ttl(ttl, self.settings.jitter_factor);
            ceiling.map_or(jittered, |max| jittered.min(max))
        });

        match self.store.set(key.as_str(), bytes, expiry).await {
            Ok(()) => {
                self.metrics.record_write();
                debug!(key = %key, ttl = ?expiry, "Cached value");
                Ok(())
            },
            Err(e) => {
                self.metrics.record_store_error();
                warn!(key = %key, error = %e, "Cache write failed");
                Err(e)
            },
        }
    }
}
