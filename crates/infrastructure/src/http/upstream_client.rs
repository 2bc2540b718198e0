//! Caching client for third-party HTTP APIs
//!
//! Wraps `reqwest` with the response cache:
//! 1. a live negative entry short-circuits the call;
//! 2. a cached entry with validators is revalidated conditionally, and a
//!    `304` refreshes it and serves the cached body;
//! 3. a cached entry without validators is served as is;
//! 4. `2xx` responses are stored for the policy TTL unless `no-store`;
//! 5. `4xx`/`5xx` responses are remembered as negative entries.
//!
//! Cache failures never fail a request.

use bytes::Bytes;
use chrono::Utc;
use domain::{CacheKey, HttpCacheEntry, NegativeCacheEntry};
use reqwest::header::{
    CACHE_CONTROL, ETAG, HeaderMap, HeaderValue, LAST_MODIFIED, RETRY_AFTER, VARY,
};
use reqwest::{Client, Method, StatusCode, Url};
use thiserror::Error;
use tracing::{debug, instrument, warn};

use super::cache_control::{UpstreamCachePolicy, parse_retry_after};
use super::http_cache::{HttpResponseCache, apply_validators};
use crate::config::UpstreamCacheConfig;

/// Errors from an upstream call that could not be answered at all
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("Invalid upstream URL: {0}")]
    InvalidUrl(String),

    #[error("Upstream request failed: {0}")]
    Request(#[from] reqwest::Error),
}

/// Where a response body came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseSource {
    /// Fetched from the upstream
    Network,
    /// Served from cache without contacting the upstream
    Cache,
    /// Served from cache after the upstream answered `304 Not Modified`
    Revalidated,
    /// Answered from a remembered error
    Negative,
}

/// An upstream response, possibly replayed from cache
#[derive(Debug, Clone)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub source: ResponseSource,
}

impl UpstreamResponse {
    fn from_entry(entry: HttpCacheEntry, source: ResponseSource) -> Self {
        let mut headers = HeaderMap::new();
        for (name, value) in [
            (ETAG, entry.etag),
            (LAST_MODIFIED, entry.last_modified),
            (CACHE_CONTROL, entry.cache_control),
            (VARY, entry.vary),
        ] {
            if let Some(value) = value.and_then(|v| HeaderValue::from_str(&v).ok()) {
                headers.insert(name, value);
            }
        }

        Self {
            status: StatusCode::from_u16(entry.status).unwrap_or(StatusCode::OK),
            headers,
            body: Bytes::from(entry.body),
            source,
        }
    }

    fn from_negative(entry: &NegativeCacheEntry) -> Self {
        let mut headers = HeaderMap::new();
        if let Some(retry_after) = entry.retry_after() {
            headers.insert(RETRY_AFTER, HeaderValue::from(retry_after.as_secs()));
        }

        Self {
            status: StatusCode::from_u16(entry.status())
                .unwrap_or(StatusCode::SERVICE_UNAVAILABLE),
            headers,
            body: Bytes::copy_from_slice(entry.message().as_bytes()),
            source: ResponseSource::Negative,
        }
    }

    pub const fn is_from_cache(&self) -> bool {
        !matches!(self.source, ResponseSource::Network)
    }
}

/// HTTP client that consults the response cache around every `GET`
#[derive(Debug, Clone)]
pub struct CachedUpstreamClient {
    http: Client,
    cache: HttpResponseCache,
    policy: UpstreamCachePolicy,
}

impl CachedUpstreamClient {
    /// Build a client with the configured request deadline
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying reqwest client cannot be built.
    pub fn new(
        cache: HttpResponseCache,
        config: &UpstreamCacheConfig,
    ) -> Result<Self, UpstreamError> {
        let http = Client::builder()
            .timeout(config.request_timeout())
            .user_agent(format!("cachelayer/{}", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self::with_client(
            http,
            cache,
            UpstreamCachePolicy::from_config(config),
        ))
    }

    pub const fn with_client(
        http: Client,
        cache: HttpResponseCache,
        policy: UpstreamCachePolicy,
    ) -> Self {
        Self {
            http,
            cache,
            policy,
        }
    }

    pub const fn cache(&self) -> &HttpResponseCache {
        &self.cache
    }

    pub const fn policy(&self) -> &UpstreamCachePolicy {
        &self.policy
    }

    /// Cache key for a request
    pub fn key_for(&self, method: &Method, url: &Url) -> CacheKey {
        let host = match (url.host_str(), url.port()) {
            (Some(host), Some(port)) => format!("{host}:{port}"),
            (Some(host), None) => host.to_owned(),
            (None, _) => String::new(),
        };
        let path_and_query = match url.query() {
            Some(query) => format!("{}?{query}", url.path()),
            None => url.path().to_owned(),
        };

        self.cache
            .client()
            .keys()
            .upstream_key(method.as_str(), &host, &path_and_query)
    }

    /// `GET` through the cache
    ///
    /// # Errors
    ///
    /// Returns `InvalidUrl` for an unparsable URL and `Request` when the
    /// upstream cannot be reached and nothing cached can answer instead.
    #[instrument(skip(self))]
    pub async fn get(&self, url: &str) -> Result<UpstreamResponse, UpstreamError> {
        let url = Url::parse(url).map_err(|e| UpstreamError::InvalidUrl(e.to_string()))?;
        let key = self.key_for(&Method::GET, &url);

        if let Some(negative) = self.cache.negative(&key).await {
            debug!(status = negative.status(), "Serving remembered upstream error");
            return Ok(UpstreamResponse::from_negative(&negative));
        }

        let cached = self.cache.cached_response(&key).await;
        let mut request = self.http.get(url).build()?;
        if let Some(entry) = &cached {
            if !entry.has_validators() {
                debug!("Serving cached upstream response");
                return Ok(UpstreamResponse::from_entry(
                    entry.clone(),
                    ResponseSource::Cache,
                ));
            }
            apply_validators(entry, request.headers_mut());
        }

        let response = self.http.execute(request).await?;
        let status = response.status();
        let headers = response.headers().clone();

        if status == StatusCode::NOT_MODIFIED {
            if let Some(entry) = cached {
                self.revalidated(&key, &headers, &entry).await;
                return Ok(UpstreamResponse::from_entry(
                    entry,
                    ResponseSource::Revalidated,
                ));
            }
        }

        let body = response.bytes().await?;
        if status.is_success() {
            self.store_success(&key, status, &headers, &body).await;
        } else if status.is_client_error() || status.is_server_error() {
            self.store_failure(&key, status, &headers).await;
        }

        Ok(UpstreamResponse {
            status,
            headers,
            body,
            source: ResponseSource::Network,
        })
    }

    async fn revalidated(&self, key: &CacheKey, headers: &HeaderMap, entry: &HttpCacheEntry) {
        // A 304 may omit Cache-Control; fall back to what the original response said
        let ttl = if headers.contains_key(CACHE_CONTROL) {
            self.policy.determine_ttl(headers)
        } else {
            self.policy.ttl_for(entry.cache_control.as_deref())
        };

        debug!(ttl = ?ttl, "Upstream confirmed cached response");
        if let Err(e) = self.cache.refresh(key, ttl).await {
            warn!(key = %key, error = %e, "Failed to refresh cached response");
        }
    }

    async fn store_success(
        &self,
        key: &CacheKey,
        status: StatusCode,
        headers: &HeaderMap,
        body: &[u8],
    ) {
        if !self.policy.is_storable(headers) {
            debug!("Upstream response is not storable");
            return;
        }

        let ttl = self.policy.determine_ttl(headers);
        if let Err(e) = self
            .cache
            .cache_response(key, status, headers, body, ttl)
            .await
        {
            warn!(key = %key, error = %e, "Failed to cache upstream response");
        }
    }

    async fn store_failure(&self, key: &CacheKey, status: StatusCode, headers: &HeaderMap) {
        let message = status.canonical_reason().unwrap_or("upstream error");
        let entry = match NegativeCacheEntry::new(status.as_u16(), message) {
            Ok(entry) => entry,
            Err(e) => {
                warn!(error = %e, "Refusing to remember upstream failure");
                return;
            },
        };

        let retry_after = headers
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| parse_retry_after(v, Utc::now()));
        let entry = match retry_after {
            Some(delay) => entry.with_retry_after(delay),
            None => entry,
        };

        if let Err(e) = self.cache.cache_negative(key, &entry).await {
            warn!(key = %key, error = %e, "Failed to remember upstream failure");
        }
    }
}
