//! Key-value store port definition
//!
//! The backing store is an external, shared, networked service offering
//! GET / SET with expiry / DEL / SCAN / TTL. Expiry is store-native; this layer
//! never sweeps expired keys itself.

use std::time::Duration;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use crate::error::ApplicationError;

/// Port for the backing key-value store
///
/// Implementations must be safe to share across tasks and must bound every
/// round trip with a deadline. Failures are reported as
/// `ApplicationError::StoreUnavailable`.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait KeyValueStore: Send + Sync + std::fmt::Debug {
    /// Get the raw value stored under `key`
    ///
    /// Returns `None` if the key doesn't exist or has expired.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, ApplicationError>;

    /// Store `value` under `key`, expiring after `ttl` (or never when `None`)
    async fn set(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl: Option<Duration>,
    ) -> Result<(), ApplicationError>;

    /// Delete the given keys, returning how many existed
    async fn delete(&self, keys: &[String]) -> Result<u64, ApplicationError>;

    /// One step of a cursor-based scan over keys matching a glob `pattern`
    ///
    /// Start with cursor `0`; the scan is complete when the returned cursor is
    /// `0` again. `count` is a hint, pages may be larger, smaller or empty,
    /// and a key may be returned more than once.
    async fn scan(
        &self,
        cursor: u64,
        pattern: &str,
        count: usize,
    ) -> Result<ScanPage, ApplicationError>;

    /// Remaining time-to-live of `key`
    async fn ttl(&self, key: &str) -> Result<KeyTtl, ApplicationError>;
}

/// One page of a cursor-based scan
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanPage {
    /// Cursor for the next call; `0` when the scan is complete
    pub cursor: u64,
    /// Keys returned by this step
    pub keys: Vec<String>,
}

impl ScanPage {
    /// Whether this is the final page of the scan
    pub const fn is_last(&self) -> bool {
        self.cursor == 0
    }
}

/// Remaining lifetime of a key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyTtl {
    /// The key does not exist
    Missing,
    /// The key exists without an expiry
    Persistent,
    /// The key expires after the given duration
    Expires(Duration),
}

impl KeyTtl {
    /// Interpret a store `PTTL` reply (`-2` missing, `-1` persistent, else millis)
    #[allow(clippy::cast_sign_loss)]
    pub const fn from_millis_reply(reply: i64) -> Self {
        match reply {
            -2 => Self::Missing,
            ms if ms < 0 => Self::Persistent,
            ms => Self::Expires(Duration::from_millis(ms as u64)),
        }
    }

    /// Remaining duration, if the key expires
    pub const fn remaining(&self) -> Option<Duration> {
        match self {
            Self::Expires(d) => Some(*d),
            Self::Missing | Self::Persistent => None,
        }
    }
}
