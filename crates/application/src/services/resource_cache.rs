//! Resource-scoped cache helpers
//!
//! Each helper pins a resource name and an access category, so repository
//! code reads and writes with the right key shape and TTL without building
//! keys by hand.

use std::{fmt, future::Future, marker::PhantomData, time::Duration};

use domain::{CacheCategory, CacheKey};
use serde::{Serialize, de::DeserializeOwned};
use tracing::info;

use super::cache_client::CacheClient;
use crate::error::{ApplicationError, ComputeError};

/// Cache for single-item lookups of one resource
#[derive(Debug, Clone)]
pub struct EntityCache<T> {
    client: CacheClient,
    resource: String,
    _value: PhantomData<fn() -> T>,
}

impl<T> EntityCache<T>
where
    T: Serialize + DeserializeOwned,
{
    pub fn new(client: CacheClient, resource: impl Into<String>) -> Self {
        Self {
            client,
            resource: resource.into(),
            _value: PhantomData,
        }
    }

    pub fn resource(&self) -> &str {
        &self.resource
    }

    /// Nominal TTL before jitter
    pub const fn ttl(&self) -> Duration {
        self.client.ttl_policy().entity
    }

    pub fn key(&self, id: impl fmt::Display) -> CacheKey {
        self.client.keys().entity_key(&self.resource, id)
    }

    pub async fn get(&self, id: impl fmt::Display) -> Option<T> {
        self.client.get(&self.key(id)).await
    }

    /// # Errors
    ///
    /// Advisory; see [`CacheClient::set`].
    pub async fn set(&self, id: impl fmt::Display, value: &T) -> Result<(), ApplicationError> {
        self.client.set(&self.key(id), value, self.ttl()).await
    }

    /// # Errors
    ///
    /// Returns the computation's error, shared by every coalesced caller.
    pub async fn get_or_compute<F, Fut, E>(
        &self,
        id: impl fmt::Display,
        compute: F,
    ) -> Result<T, ComputeError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::error::Error + Send + Sync + 'static,
    {
        self.client
            .get_or_compute(&self.key(id), self.ttl(), compute)
            .await
    }

    /// # Errors
    ///
    /// Returns `StoreUnavailable` if the store rejects the delete.
    pub async fn delete(&self, id: impl fmt::Display) -> Result<(), ApplicationError> {
        self.client.delete(&self.key(id)).await
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum ListScope {
    Resource(String),
    Search,
}

/// Cache for filtered collections (or search results) keyed by parameter set
///
/// Parameter order does not matter and empty values are ignored.
#[derive(Debug, Clone)]
pub struct ListCache<T> {
    client: CacheClient,
    scope: ListScope,
    _value: PhantomData<fn() -> T>,
}

impl<T> ListCache<T>
where
    T: Serialize + DeserializeOwned,
{
    /// List cache for one resource, using the list TTL
    pub fn new(client: CacheClient, resource: impl Into<String>) -> Self {
        Self {
            client,
            scope: ListScope::Resource(resource.into()),
            _value: PhantomData,
        }
    }

    /// Search result cache, using the search TTL
    pub const fn search(client: CacheClient) -> Self {
        Self {
            client,
            scope: ListScope::Search,
            _value: PhantomData,
        }
    }

    pub const fn category(&self) -> CacheCategory {
        match self.scope {
            ListScope::Resource(_) => CacheCategory::List,
            ListScope::Search => CacheCategory::Search,
        }
    }

    /// Nominal TTL before jitter
    pub const fn ttl(&self) -> Duration {
        self.client.ttl_policy().for_category(self.category())
    }

    pub fn key<I, K, V>(&self, params: I) -> CacheKey
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        match &self.scope {
            ListScope::Resource(resource) => self.client.keys().list_key(resource, params),
            ListScope::Search => self.client.keys().search_key(params),
        }
    }

    /// Prefix shared by every key this helper writes
    pub fn prefix(&self) -> String {
        match &self.scope {
            ListScope::Resource(resource) => self
                .client
                .keys()
                .resource_prefix(CacheCategory::List, resource),
            ListScope::Search => self.client.keys().category_prefix(CacheCategory::Search),
        }
    }

    pub async fn get<I, K, V>(&self, params: I) -> Option<T>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        self.client.get(&self.key(params)).await
    }

    /// # Errors
    ///
    /// Advisory; see [`CacheClient::set`].
    pub async fn set<I, K, V>(&self, params: I, value: &T) -> Result<(), ApplicationError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        self.client.set(&self.key(params), value, self.ttl()).await
    }

    /// # Errors
    ///
    /// Returns the computation's error, shared by every coalesced caller.
    pub async fn get_or_compute<I, K, V, F, Fut, E>(
        &self,
        params: I,
        compute: F,
    ) -> Result<T, ComputeError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::error::Error + Send + Sync + 'static,
    {
        self.client
            .get_or_compute(&self.key(params), self.ttl(), compute)
            .await
    }

    /// # Errors
    ///
    /// Returns `StoreUnavailable` if the store rejects the delete.
    pub async fn delete<I, K, V>(&self, params: I) -> Result<(), ApplicationError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        self.client.delete(&self.key(params)).await
    }

    /// Delete every cached parameter set for this resource
    ///
    /// # Errors
    ///
    /// Returns `StoreUnavailable` if scanning or deleting fails part-way.
    pub async fn invalidate_all(&self) -> Result<u64, ApplicationError> {
        if !self.client.is_enabled() {
            return Ok(0);
        }

        let prefix = self.prefix();
        let deleted = self.client.inspector().invalidate_by_prefix(&prefix).await?;
        info!(prefix = %prefix, deleted, "Invalidated cached lists");
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use domain::KeyBuilder;

    use super::*;
    use crate::ports::{MockKeyValueStore, ScanPage};

    fn client(store: MockKeyValueStore) -> CacheClient {
        CacheClient::new(
            Arc::new(store),
            KeyBuilder::new("stats", "test", "v1").unwrap(),
        )
    }

    #[test]
    fn entity_helper_uses_entity_key_and_ttl() {
        let players: EntityCache<u32> =
            EntityCache::new(client(MockKeyValueStore::new()), "player");
        assert_eq!(players.key("ruth").as_str(), "stats:test:v1:entity:player:ruth");
        assert_eq!(players.ttl(), Duration::from_secs(30 * 60));
    }

    #[test]
    fn list_and_search_helpers_pick_their_category() {
        let lists: ListCache<Vec<u32>> =
            ListCache::new(client(MockKeyValueStore::new()), "players");
        let search: ListCache<Vec<u32>> = ListCache::search(client(MockKeyValueStore::new()));

        assert_eq!(lists.ttl(), Duration::from_secs(5 * 60));
        assert_eq!(search.ttl(), Duration::from_secs(2 * 60));
        assert_eq!(lists.prefix(), "stats:test:v1:list:players:");
        assert_eq!(search.prefix(), "stats:test:v1:search:");

        let key = lists.key([("team", "NYY")]);
        assert!(key.as_str().starts_with(&lists.prefix()));
    }

    #[tokio::test]
    async fn entity_set_writes_with_entity_ttl() {
        let mut store = MockKeyValueStore::new();
        store
            .expect_set()
            .withf(|key, _, ttl| {
                key == "stats:test:v1:entity:player:ruth"
                    && ttl.is_some_and(|t| {
                        t >= Duration::from_secs(27 * 60) && t <= Duration::from_secs(33 * 60)
                    })
            })
            .times(1)
            .returning(|_, _, _| Ok(()));
        let players = EntityCache::new(client(store), "player");

        players.set("ruth", &714_u32).await.unwrap();
    }

    #[tokio::test]
    async fn invalidate_all_scans_resource_prefix() {
        let mut store = MockKeyValueStore::new();
        store
            .expect_scan()
            .withf(|cursor, pattern, _| *cursor == 0 && pattern == "stats:test:v1:list:players:*")
            .times(1)
            .returning(|_, _, _| {
                Ok(ScanPage {
                    cursor: 0,
                    keys: vec![
                        "stats:test:v1:list:players:aaa".into(),
                        "stats:test:v1:list:players:bbb".into(),
                    ],
                })
            });
        store
            .expect_delete()
            .withf(|keys| keys.len() == 2)
            .times(1)
            .returning(|_| Ok(2));
        let lists: ListCache<Vec<u32>> = ListCache::new(client(store), "players");

        assert_eq!(lists.invalidate_all().await.unwrap(), 2);
    }
}
