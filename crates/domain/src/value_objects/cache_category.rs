//! Access categories that select a TTL and a key segment

use std::fmt;

use serde::{Deserialize, Serialize};

/// Access category of a cached value
///
/// Each category has its own TTL in the [`TtlPolicy`](super::TtlPolicy) and its
/// own segment in the cache key, so invalidation can target one category at a
/// time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheCategory {
    /// Single-item lookups by identifier
    Entity,
    /// Filtered collection reads
    List,
    /// Search results
    Search,
    /// Third-party upstream responses
    Upstream,
    /// Negative (error / not-found) results
    Negative,
}

impl CacheCategory {
    /// All categories, in key-segment order
    pub const ALL: [Self; 5] = [
        Self::Entity,
        Self::List,
        Self::Search,
        Self::Upstream,
        Self::Negative,
    ];

    /// The key segment used for this category
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Entity => "entity",
            Self::List => "list",
            Self::Search => "search",
            Self::Upstream => "upstream",
            Self::Negative => "negative",
        }
    }
}

impl fmt::Display for CacheCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CacheCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "entity" => Ok(Self::Entity),
            "list" => Ok(Self::List),
            "search" => Ok(Self::Search),
            "upstream" => Ok(Self::Upstream),
            "negative" => Ok(Self::Negative),
            _ => Err(format!("Unknown cache category: {s}")),
        }
    }
}
