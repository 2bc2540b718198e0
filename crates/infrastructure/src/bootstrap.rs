//! Wiring from configuration to ready-to-use cache services

use std::sync::Arc;

use application::{
    ApplicationError, CacheAdmin, CacheClient, CacheMetrics, EntityCache, KeyValueStore,
    ListCache,
};
use domain::KeyBuilder;
use serde::{Serialize, de::DeserializeOwned};
use tracing::info;

use crate::cache::RedisStore;
use crate::config::AppConfig;
use crate::http::{CachedUpstreamClient, HttpResponseCache};

/// Every cache-facing service, sharing one store, registry and metrics
#[derive(Debug, Clone)]
pub struct CacheServices {
    /// Configuration the services were built from
    pub config: Arc<AppConfig>,
    /// Core cache-aside client
    pub client: CacheClient,
    /// Counters shared by every component
    pub metrics: Arc<CacheMetrics>,
    /// HTTP response cache
    pub http: HttpResponseCache,
    /// Caching client for third-party APIs
    pub upstream: CachedUpstreamClient,
    /// Maintenance operations
    pub admin: CacheAdmin,
}

impl CacheServices {
    /// Build services backed by the configured Redis server
    ///
    /// The connection is made lazily, so an unreachable server degrades to
    /// cache misses instead of failing start-up.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` for invalid settings or an unparsable URL.
    pub fn from_config(config: AppConfig) -> Result<Self, ApplicationError> {
        config.validate()?;
        let store = RedisStore::new(&config.redis)?;
        Self::with_store(config, Arc::new(store))
    }

    /// Build services over an explicit store
    ///
    /// # Errors
    ///
    /// Returns `Configuration` for invalid settings and `Domain` for key
    /// segments the key builder rejects.
    pub fn with_store(
        config: AppConfig,
        store: Arc<dyn KeyValueStore>,
    ) -> Result<Self, ApplicationError> {
        config.validate()?;

        let keys = KeyBuilder::new(
            &config.cache.namespace,
            config.environment.as_str(),
            &config.cache.schema_version,
        )?;
        let metrics = Arc::new(CacheMetrics::new());

        let client = CacheClient::new(store, keys.clone())
            .with_ttl_policy(config.cache.ttl_policy())
            .with_settings(config.cache.settings())
            .with_metrics(Arc::clone(&metrics));
        let http =
            HttpResponseCache::new(client.clone()).with_max_ttl(config.upstream.max_ttl());
        let upstream = CachedUpstreamClient::new(http.clone(), &config.upstream)
            .map_err(|e| ApplicationError::Configuration(e.to_string()))?;
        let admin = CacheAdmin::new(client.inspector(), keys);

        info!(
            prefix = client.keys().prefix(),
            enabled = config.cache.enabled,
            "Cache services ready"
        );

        Ok(Self {
            config: Arc::new(config),
            client,
            metrics,
            http,
            upstream,
            admin,
        })
    }

    /// Entity helper for `resource`
    pub fn entity_cache<T>(&self, resource: &str) -> EntityCache<T>
    where
        T: Serialize + DeserializeOwned,
    {
        EntityCache::new(self.client.clone(), resource)
    }

    /// List helper for `resource`
    pub fn list_cache<T>(&self, resource: &str) -> ListCache<T>
    where
        T: Serialize + DeserializeOwned,
    {
        ListCache::new(self.client.clone(), resource)
    }

    /// Search result helper
    pub fn search_cache<T>(&self) -> ListCache<T>
    where
        T: Serialize + DeserializeOwned,
    {
        ListCache::search(self.client.clone())
    }
}
