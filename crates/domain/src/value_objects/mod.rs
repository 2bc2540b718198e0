//! Value Objects - Immutable, identity-less domain primitives

mod cache_category;
mod cache_key;
mod ttl_policy;

pub use cache_category::CacheCategory;
pub use cache_key::{CacheKey, KeyBuilder, escape_glob, hash_params, normalize_params};
pub use ttl_policy::TtlPolicy;
