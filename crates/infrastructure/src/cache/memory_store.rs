//! In-process key-value store
//!
//! Implements the store port with per-key expiry on the tokio clock, glob
//! `SCAN` and `PTTL` semantics, so the cache layer can run without a store
//! server in tests and local development. Expired entries are dropped on
//! access and swept on every scan step.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use application::{ApplicationError, KeyTtl, KeyValueStore, ScanPage};
use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::time::Instant;

use super::glob::glob_match;

#[derive(Debug)]
struct Entry {
    value: Vec<u8>,
    expires_at: Option<Instant>,
    /// Insertion order; scan cursors are positions in this sequence
    seq: u64,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

#[derive(Debug, Default)]
struct Inner {
    entries: HashMap<String, Entry>,
    next_seq: u64,
}

/// In-memory store with store-native expiry semantics
#[derive(Debug, Default)]
pub struct InMemoryStore {
    inner: Mutex<Inner>,
    unavailable: AtomicBool,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate an outage: every operation fails with `StoreUnavailable`
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of live (unexpired) keys
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.inner
            .lock()
            .entries
            .values()
            .filter(|e| !e.is_expired(now))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check_available(&self) -> Result<(), ApplicationError> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(ApplicationError::StoreUnavailable(
                "in-memory store marked unavailable".into(),
            ))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl KeyValueStore for InMemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, ApplicationError> {
        self.check_available()?;
        let now = Instant::now();
        let mut inner = self.inner.lock();

        if inner.entries.get(key).is_some_and(|e| e.is_expired(now)) {
            inner.entries.remove(key);
        }
        Ok(inner.entries.get(key).map(|e| e.value.clone()))
    }

    async fn set(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl: Option<Duration>,
    ) -> Result<(), ApplicationError> {
        self.check_available()?;
        let expires_at = ttl.map(|ttl| Instant::now() + ttl);
        let mut inner = self.inner.lock();

        // Overwrites keep their scan position
        let existing = inner.entries.get(key).map(|e| e.seq);
        let seq = match existing {
            Some(seq) => seq,
            None => {
                inner.next_seq += 1;
                inner.next_seq
            },
        };
        inner.entries.insert(
            key.to_owned(),
            Entry {
                value,
                expires_at,
                seq,
            },
        );
        Ok(())
    }

    async fn delete(&self, keys: &[String]) -> Result<u64, ApplicationError> {
        self.check_available()?;
        let now = Instant::now();
        let mut inner = self.inner.lock();

        let mut removed = 0;
        for key in keys {
            if let Some(entry) = inner.entries.remove(key) {
                if !entry.is_expired(now) {
                    removed += 1;
                }
            }
        }
        Ok(removed)
    }

    async fn scan(
        &self,
        cursor: u64,
        pattern: &str,
        count: usize,
    ) -> Result<ScanPage, ApplicationError> {
        self.check_available()?;
        let now = Instant::now();
        let mut inner = self.inner.lock();
        // Cursors are sequence numbers, so sweeping never skips a live key
        inner.entries.retain(|_, e| !e.is_expired(now));

        let mut remaining: Vec<(u64, &String, &Entry)> = inner
            .entries
            .iter()
            .filter(|(_, e)| e.seq > cursor)
            .map(|(k, e)| (e.seq, k, e))
            .collect();
        remaining.sort_unstable_by_key(|(seq, _, _)| *seq);

        let examined = remaining.len().min(count.max(1));
        let keys = remaining[..examined]
            .iter()
            .filter(|(_, key, _)| glob_match(pattern, key))
            .map(|(_, key, _)| (*key).clone())
            .collect();

        let next = if examined < remaining.len() {
            remaining[examined - 1].0
        } else {
            0
        };
        Ok(ScanPage { cursor: next, keys })
    }

    async fn ttl(&self, key: &str) -> Result<KeyTtl, ApplicationError> {
        self.check_available()?;
        let now = Instant::now();
        let inner = self.inner.lock();

        Ok(match inner.entries.get(key) {
            None => KeyTtl::Missing,
            Some(entry) if entry.is_expired(now) => KeyTtl::Missing,
            Some(Entry {
                expires_at: None, ..
            }) => KeyTtl::Persistent,
            Some(Entry {
                expires_at: Some(at),
                ..
            }) => KeyTtl::Expires(at.saturating_duration_since(now)),
        })
    }
}
