//! Caching header parsing and the upstream TTL policy
//!
//! `Cache-Control` directive names match case-insensitively; unknown
//! directives such as `public`, `private` or `must-revalidate` are skipped.

use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::header::{CACHE_CONTROL, HeaderMap};

use crate::config::UpstreamCacheConfig;

/// Freshness lifetime from a `Cache-Control` value
///
/// `s-maxage` wins over `max-age` since this layer is a shared cache. Returns
/// zero when neither directive is present or parses.
pub fn parse_cache_control_max_age(header: &str) -> Duration {
    directive_seconds(header, "s-maxage")
        .or_else(|| directive_seconds(header, "max-age"))
        .map_or(Duration::ZERO, Duration::from_secs)
}

/// Whether the value carries `directive`, with or without an argument
pub fn has_directive(header: &str, directive: &str) -> bool {
    directives(header).any(|(name, _)| name.eq_ignore_ascii_case(directive))
}

fn directive_seconds(header: &str, directive: &str) -> Option<u64> {
    directives(header)
        .find(|(name, _)| name.eq_ignore_ascii_case(directive))
        .and_then(|(_, value)| value)
        .and_then(|value| value.trim_matches('"').parse().ok())
}

fn directives(header: &str) -> impl Iterator<Item = (&str, Option<&str>)> {
    header
        .split(',')
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(|d| match d.split_once('=') {
            Some((name, value)) => (name.trim(), Some(value.trim())),
            None => (d, None),
        })
}

/// Delay from a `Retry-After` value, either delta-seconds or an HTTP-date
///
/// A date in the past yields zero.
pub fn parse_retry_after(value: &str, now: DateTime<Utc>) -> Option<Duration> {
    let value = value.trim();
    if let Ok(seconds) = value.parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }

    let at = DateTime::parse_from_rfc2822(value).ok()?;
    Some(
        at.with_timezone(&Utc)
            .signed_duration_since(now)
            .to_std()
            .unwrap_or(Duration::ZERO),
    )
}

fn cache_control(headers: &HeaderMap) -> Option<&str> {
    headers.get(CACHE_CONTROL).and_then(|v| v.to_str().ok())
}

/// Decides how long a third-party response may be cached
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpstreamCachePolicy {
    respect_cache_control: bool,
    default_ttl: Duration,
    max_ttl: Duration,
}

impl UpstreamCachePolicy {
    #[must_use]
    pub const fn new(
        respect_cache_control: bool,
        default_ttl: Duration,
        max_ttl: Duration,
    ) -> Self {
        Self {
            respect_cache_control,
            default_ttl,
            max_ttl,
        }
    }

    #[must_use]
    pub const fn from_config(config: &UpstreamCacheConfig) -> Self {
        Self::new(
            config.respect_cache_control,
            config.default_ttl(),
            config.max_ttl(),
        )
    }

    pub const fn max_ttl(&self) -> Duration {
        self.max_ttl
    }

    /// TTL for a response with these headers
    ///
    /// When honoring upstream directives, a positive `max-age`/`s-maxage` is
    /// used, clamped to the ceiling. Otherwise, or when the directive is
    /// absent, the configured default applies.
    #[must_use]
    pub fn determine_ttl(&self, headers: &HeaderMap) -> Duration {
        self.ttl_for(cache_control(headers))
    }

    /// TTL for a raw `Cache-Control` value
    #[must_use]
    pub fn ttl_for(&self, cache_control: Option<&str>) -> Duration {
        if !self.respect_cache_control {
            return self.default_ttl;
        }

        match cache_control.map(parse_cache_control_max_age) {
            Some(max_age) if !max_age.is_zero() => max_age.min(self.max_ttl),
            _ => self.default_ttl,
        }
    }

    /// Whether a response with these headers may be stored at all
    ///
    /// `no-store` always forbids storage. When honoring upstream directives,
    /// an explicit zero lifetime does too.
    #[must_use]
    pub fn is_storable(&self, headers: &HeaderMap) -> bool {
        let Some(value) = cache_control(headers) else {
            return true;
        };
        if has_directive(value, "no-store") {
            return false;
        }
        if !self.respect_cache_control {
            return true;
        }

        let explicit =
            directive_seconds(value, "s-maxage").or_else(|| directive_seconds(value, "max-age"));
        explicit != Some(0)
    }
}

impl Default for UpstreamCachePolicy {
    fn default() -> Self {
        Self::from_config(&UpstreamCacheConfig::default())
    }
}
