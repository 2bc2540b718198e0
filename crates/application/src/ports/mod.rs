//! Port definitions (interfaces for infrastructure adapters)

mod key_value_store;

#[cfg(test)]
pub use key_value_store::MockKeyValueStore;
pub use key_value_store::{KeyTtl, KeyValueStore, ScanPage};
