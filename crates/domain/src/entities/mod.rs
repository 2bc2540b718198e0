//! Domain entities - Stored cache entries with a capture time

mod http_entry;
mod negative_entry;

pub use http_entry::HttpCacheEntry;
pub use negative_entry::NegativeCacheEntry;
