//! Negative (error-class) cache entry

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

/// A remembered failure from an upstream or repository call
///
/// Only 4xx/5xx outcomes may be stored. Entries shield the backing resource
/// from repeated failing calls during an outage or a rate-limit window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NegativeCacheEntry {
    status: u16,
    message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    retry_after_secs: Option<u64>,
    captured_at: DateTime<Utc>,
}

impl NegativeCacheEntry {
    /// Create a negative entry for an error status
    ///
    /// # Errors
    ///
    /// Returns `DomainError::NotAnErrorStatus` if `status` is outside 400..=599.
    pub fn new(status: u16, message: impl Into<String>) -> Result<Self, DomainError> {
        if !(400..=599).contains(&status) {
            return Err(DomainError::NotAnErrorStatus(status));
        }
        Ok(Self {
            status,
            message: message.into(),
            retry_after_secs: None,
            captured_at: Utc::now(),
        })
    }

    /// Attach a retry-after hint
    #[must_use]
    pub const fn with_retry_after(mut self, retry_after: Duration) -> Self {
        self.retry_after_secs = Some(retry_after.as_secs());
        self
    }

    pub const fn status(&self) -> u16 {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// The retry-after hint, if the upstream gave one
    pub fn retry_after(&self) -> Option<Duration> {
        self.retry_after_secs.map(Duration::from_secs)
    }

    pub const fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }
}
