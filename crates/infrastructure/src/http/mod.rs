//! HTTP semantic caching
//!
//! Response caching with conditional revalidation, negative caching of
//! upstream failures, and the `Cache-Control` driven TTL policy.

mod cache_control;
mod http_cache;
mod upstream_client;

pub use cache_control::{
    UpstreamCachePolicy, has_directive, parse_cache_control_max_age, parse_retry_after,
};
pub use http_cache::{HttpResponseCache, apply_validators, entry_from_response};
pub use upstream_client::{CachedUpstreamClient, ResponseSource, UpstreamError, UpstreamResponse};
