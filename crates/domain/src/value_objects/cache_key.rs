//! Cache key value object and key builder
//!
//! Keys have the shape `{namespace}:{environment}:{schema}:{category}:{identifier}`.
//! Resource names and entity ids are embedded with `:` and `%` percent-encoded,
//! so every identifier occupies exactly its own segments and no resource
//! prefix covers another resource's keys.
//! Parameter sets are normalized (empty values dropped, keys sorted) and hashed
//! with blake3, so key length is bounded regardless of how many parameters a
//! request carries.
//!
//! # Examples
//!
//! ```
//! use domain::value_objects::KeyBuilder;
//!
//! let keys = KeyBuilder::new("stats", "production", "v3").expect("valid segments");
//! let a = keys.list_key("players", [("team", "NYY"), ("season", "1927")]);
//! let b = keys.list_key("players", [("season", "1927"), ("team", "NYY")]);
//! assert_eq!(a, b);
//! assert!(a.as_str().starts_with("stats:production:v3:list:players:"));
//! ```

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::CacheCategory;
use crate::errors::DomainError;

/// A fully qualified cache key
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheKey(String);

impl CacheKey {
    /// Wrap an already-qualified key (e.g. one returned by a store scan)
    pub fn from_raw(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// The key as stored
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<CacheKey> for String {
    fn from(key: CacheKey) -> Self {
        key.0
    }
}

/// Builds namespaced cache keys
///
/// The namespace, environment and schema version form a fixed prefix.
/// Bumping the schema version orphans every previously written key without
/// deleting anything; the store expires them on its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyBuilder {
    namespace: String,
    environment: String,
    prefix: String,
}

impl KeyBuilder {
    /// Create a key builder for the given namespace, environment and schema version
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidKeySegment` if a segment is empty or
    /// contains whitespace.
    pub fn new(
        namespace: &str,
        environment: &str,
        schema_version: &str,
    ) -> Result<Self, DomainError> {
        validate_segment("namespace", namespace)?;
        validate_segment("environment", environment)?;
        validate_segment("schema_version", schema_version)?;
        Ok(Self {
            namespace: namespace.to_owned(),
            environment: environment.to_owned(),
            prefix: format!("{namespace}:{environment}:{schema_version}"),
        })
    }

    /// Prefix shared by every schema version of this namespace and environment
    pub fn environment_prefix(&self) -> String {
        format!("{}:{}:", self.namespace, self.environment)
    }

    /// The `{namespace}:{environment}:{schema}` prefix shared by every key
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Build a key from a category and an identifier
    pub fn key(&self, category: CacheCategory, identifier: &str) -> CacheKey {
        CacheKey(format!("{}:{category}:{identifier}", self.prefix))
    }

    /// Prefix shared by every key of a category
    pub fn category_prefix(&self, category: CacheCategory) -> String {
        format!("{}:{category}:", self.prefix)
    }

    /// Prefix shared by every key of a category and resource
    pub fn resource_prefix(&self, category: CacheCategory, resource: &str) -> String {
        format!("{}:{category}:{}:", self.prefix, encode_segment(resource))
    }

    /// Key for a single-item lookup
    pub fn entity_key(&self, resource: &str, id: impl fmt::Display) -> CacheKey {
        let id = encode_segment(&id.to_string());
        self.key(
            CacheCategory::Entity,
            &format!("{}:{id}", encode_segment(resource)),
        )
    }

    /// Key for a filtered collection of a resource
    pub fn list_key<I, K, V>(&self, resource: &str, params: I) -> CacheKey
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let digest = hash_params(params);
        self.key(
            CacheCategory::List,
            &format!("{}:{digest}", encode_segment(resource)),
        )
    }

    /// Key for a search result set
    pub fn search_key<I, K, V>(&self, params: I) -> CacheKey
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        self.key(CacheCategory::Search, &hash_params(params))
    }

    /// Key for a third-party upstream call
    ///
    /// Method is case-insensitive and host is lowercased; the path and query
    /// are taken verbatim.
    pub fn upstream_key(&self, method: &str, host: &str, path_and_query: &str) -> CacheKey {
        let digest = digest_components(&[
            &method.to_ascii_uppercase(),
            &host.to_ascii_lowercase(),
            path_and_query,
        ]);
        self.key(CacheCategory::Upstream, &digest)
    }

    /// Key under which the negative result for `key` is stored
    pub fn negative_key(&self, key: &CacheKey) -> CacheKey {
        self.key(CacheCategory::Negative, &digest_components(&[key.as_str()]))
    }
}

fn validate_segment(name: &str, value: &str) -> Result<(), DomainError> {
    if value.is_empty() {
        return Err(DomainError::invalid_segment(name, "must not be empty"));
    }
    if value.chars().any(char::is_whitespace) {
        return Err(DomainError::invalid_segment(
            name,
            "must not contain whitespace",
        ));
    }
    Ok(())
}

/// Normalize a parameter set into its canonical `k=v&k=v` form
///
/// Empty values are dropped and keys are sorted. `%`, `&` and `=` are
/// percent-encoded so that a value containing a separator cannot alias a
/// different parameter set. When a key repeats, the last value wins.
pub fn normalize_params<I, K, V>(params: I) -> String
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    let sorted: BTreeMap<String, String> = params
        .into_iter()
        .filter(|(_, v)| !v.as_ref().is_empty())
        .map(|(k, v)| (encode_component(k.as_ref()), encode_component(v.as_ref())))
        .collect();

    sorted
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&")
}

/// blake3 digest (hex) of the normalized parameter set
pub fn hash_params<I, K, V>(params: I) -> String
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    blake3::hash(normalize_params(params).as_bytes())
        .to_hex()
        .to_string()
}

/// Escape store glob metacharacters so `s` matches literally in a pattern
pub fn escape_glob(s: &str) -> String {
    let mut escaped = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Percent-encode the key separator (and `%` itself) inside one segment
fn encode_segment(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '%' => out.push_str("%25"),
            ':' => out.push_str("%3A"),
            _ => out.push(c),
        }
    }
    out
}

fn encode_component(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '%' => out.push_str("%25"),
            '&' => out.push_str("%26"),
            '=' => out.push_str("%3D"),
            _ => out.push(c),
        }
    }
    out
}

fn digest_components(components: &[&str]) -> String {
    let mut hasher = blake3::Hasher::new();
    for component in components {
        hasher.update(component.as_bytes());
        hasher.update(b"|");
    }
    hasher.finalize().to_hex().to_string()
}
