//! Key-value store adapters
//!
//! Implementations of the application's `KeyValueStore` port:
//! - `RedisStore`: The shared, networked backing store
//! - `InMemoryStore`: Process-local store with the same expiry and scan
//!   semantics, for tests and local development

mod glob;
mod memory_store;
mod redis_store;

pub use glob::glob_match;
pub use memory_store::InMemoryStore;
pub use redis_store::RedisStore;
