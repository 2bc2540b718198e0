//! HTTP-aware extension of the cache client
//!
//! Stores upstream responses with their validators so later requests can be
//! revalidated conditionally, and remembers error responses for a short
//! window.

use std::time::Duration;

use application::{ApplicationError, CacheClient};
use domain::{CacheKey, HttpCacheEntry, NegativeCacheEntry};
use reqwest::StatusCode;
use reqwest::header::{
    CACHE_CONTROL, ETAG, HeaderMap, HeaderName, HeaderValue, IF_MODIFIED_SINCE, IF_NONE_MATCH,
    LAST_MODIFIED, VARY,
};
use tracing::{debug, instrument};

/// Floor for negative entries so a zero `Retry-After` still dampens retries
const MIN_NEGATIVE_TTL: Duration = Duration::from_secs(1);

/// Response cache with conditional revalidation and negative caching
#[derive(Debug, Clone)]
pub struct HttpResponseCache {
    client: CacheClient,
    max_ttl: Option<Duration>,
}

impl HttpResponseCache {
    pub const fn new(client: CacheClient) -> Self {
        Self {
            client,
            max_ttl: None,
        }
    }

    /// Never keep a response longer than `max_ttl`, jitter included
    #[must_use]
    pub const fn with_max_ttl(mut self, max_ttl: Duration) -> Self {
        self.max_ttl = Some(max_ttl);
        self
    }

    pub const fn client(&self) -> &CacheClient {
        &self.client
    }

    /// Store a response together with its caching headers
    ///
    /// # Errors
    ///
    /// Propagates the advisory write error from the cache client.
    #[instrument(skip(self, headers, body), fields(key = %key, status = %status))]
    pub async fn cache_response(
        &self,
        key: &CacheKey,
        status: StatusCode,
        headers: &HeaderMap,
        body: &[u8],
        ttl: Duration,
    ) -> Result<(), ApplicationError> {
        let entry = entry_from_response(status, headers, body);
        self.store(key, &entry, ttl).await
    }

    /// The cached response for `key`, if any
    pub async fn cached_response(&self, key: &CacheKey) -> Option<HttpCacheEntry> {
        self.client.get(key).await
    }

    /// Attach `If-None-Match` / `If-Modified-Since` from the cached entry
    ///
    /// Returns `false` when there is no entry or it carries no validators.
    pub async fn add_conditional_headers(
        &self,
        key: &CacheKey,
        headers: &mut HeaderMap,
    ) -> bool {
        match self.cached_response(key).await {
            Some(entry) => apply_validators(&entry, headers),
            None => false,
        }
    }

    /// Re-store the cached entry with a fresh TTL after a `304 Not Modified`
    ///
    /// The body is left untouched; only the capture time moves. Returns
    /// `false` when there was nothing to refresh.
    ///
    /// # Errors
    ///
    /// Propagates the advisory write error from the cache client.
    #[instrument(skip(self), fields(key = %key))]
    pub async fn refresh(&self, key: &CacheKey, ttl: Duration) -> Result<bool, ApplicationError> {
        let Some(mut entry) = self.cached_response(key).await else {
            debug!("Nothing to refresh");
            return Ok(false);
        };

        entry.touch();
        self.store(key, &entry, ttl).await?;
        Ok(true)
    }

    async fn store(
        &self,
        key: &CacheKey,
        entry: &HttpCacheEntry,
        ttl: Duration,
    ) -> Result<(), ApplicationError> {
        match self.max_ttl {
            Some(max) => self.client.set_capped(key, entry, ttl, max).await,
            None => self.client.set(key, entry, ttl).await,
        }
    }

    /// Remember an error response for `key`
    ///
    /// Lives for the negative TTL, shortened to the entry's retry-after hint
    /// when that is sooner.
    ///
    /// # Errors
    ///
    /// Propagates the advisory write error from the cache client.
    #[instrument(skip(self, entry), fields(key = %key, status = entry.status()))]
    pub async fn cache_negative(
        &self,
        key: &CacheKey,
        entry: &NegativeCacheEntry,
    ) -> Result<(), ApplicationError> {
        let nominal = self.client.ttl_policy().negative;
        let ttl = entry
            .retry_after()
            .map_or(nominal, |hint| hint.min(nominal))
            .max(MIN_NEGATIVE_TTL);

        let negative_key = self.client.keys().negative_key(key);
        self.client.set(&negative_key, entry, ttl).await
    }

    /// The remembered error for `key`, if still live
    pub async fn negative(&self, key: &CacheKey) -> Option<NegativeCacheEntry> {
        let negative_key = self.client.keys().negative_key(key);
        self.client.get(&negative_key).await
    }
}

/// Build a cache entry from a response's status, headers and body
pub fn entry_from_response(
    status: StatusCode,
    headers: &HeaderMap,
    body: &[u8],
) -> HttpCacheEntry {
    let header = |name: HeaderName| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned)
    };

    HttpCacheEntry {
        etag: header(ETAG),
        last_modified: header(LAST_MODIFIED),
        cache_control: header(CACHE_CONTROL),
        vary: header(VARY),
        ..HttpCacheEntry::new(status.as_u16(), body)
    }
}

/// Copy the entry's validators onto an outgoing request's headers
///
/// Returns whether any validator was attached.
pub fn apply_validators(entry: &HttpCacheEntry, headers: &mut HeaderMap) -> bool {
    let mut attached = false;

    if let Some(value) = entry.etag.as_deref().and_then(|v| HeaderValue::from_str(v).ok()) {
        headers.insert(IF_NONE_MATCH, value);
        attached = true;
    }
    if let Some(value) = entry
        .last_modified
        .as_deref()
        .and_then(|v| HeaderValue::from_str(v).ok())
    {
        headers.insert(IF_MODIFIED_SINCE, value);
        attached = true;
    }
    attached
}
