//! Cached HTTP response with its validators

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A cached upstream HTTP response
///
/// Holds enough metadata to revalidate with the upstream (`ETag`,
/// `Last-Modified`) and to replay the response without refetching the body.
/// The body is base64-encoded when serialized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpCacheEntry {
    /// Response status code
    pub status: u16,
    /// Raw response body
    #[serde(with = "body_base64")]
    pub body: Vec<u8>,
    /// `ETag` validator
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
    /// `Last-Modified` validator
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<String>,
    /// `Cache-Control` as sent by the upstream
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_control: Option<String>,
    /// `Vary` as sent by the upstream
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vary: Option<String>,
    /// When the response was captured or last revalidated
    pub captured_at: DateTime<Utc>,
}

impl HttpCacheEntry {
    /// Create an entry captured now, without validators
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
            etag: None,
            last_modified: None,
            cache_control: None,
            vary: None,
            captured_at: Utc::now(),
        }
    }

    /// Whether the entry can be revalidated conditionally
    pub const fn has_validators(&self) -> bool {
        self.etag.is_some() || self.last_modified.is_some()
    }

    /// Mark the entry as revalidated now; the body is left untouched
    pub fn touch(&mut self) {
        self.captured_at = Utc::now();
    }
}

mod body_base64 {
    use base64::{Engine as _, engine::general_purpose::STANDARD};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(body: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(body))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded).map_err(serde::de::Error::custom)
    }
}
