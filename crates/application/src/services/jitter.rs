//! TTL jitter
//!
//! Keys written together would otherwise expire together and stampede the
//! source of truth at the same instant.

use std::time::Duration;

use rand::Rng;

/// Default spread applied to every TTL (±10%)
pub const DEFAULT_JITTER_FACTOR: f64 = 0.1;

const MIN_TTL: Duration = Duration::from_millis(1);

/// Randomize `ttl` uniformly within `[ttl * (1 - factor), ttl * (1 + factor)]`
///
/// A zero TTL means "no expiry" and is returned unchanged, as is any TTL when
/// `factor` is not positive. The result is never below one millisecond.
pub fn jittered_ttl(ttl: Duration, factor: f64) -> Duration {
    if ttl.is_zero() || factor <= 0.0 || !factor.is_finite() {
        return ttl;
    }

    let base = ttl.as_secs_f64();
    let spread = base * factor.min(1.0);
    let secs = rand::rng().random_range((base - spread)..=(base + spread));

    Duration::try_from_secs_f64(secs).map_or(ttl, |d| d.max(MIN_TTL))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stays_within_ten_percent() {
        let ttl = Duration::from_secs(30 * 60);
        let lower = Duration::from_secs(27 * 60);
        let upper = Duration::from_secs(33 * 60);
        for _ in 0..1_000 {
            let jittered = jittered_ttl(ttl, DEFAULT_JITTER_FACTOR);
            assert!(jittered >= lower && jittered <= upper, "{jittered:?}");
        }
    }

    #[test]
    fn actually_varies() {
        let ttl = Duration::from_secs(600);
        let first = jittered_ttl(ttl, DEFAULT_JITTER_FACTOR);
        let varied = (0..100).any(|_| jittered_ttl(ttl, DEFAULT_JITTER_FACTOR) != first);
        assert!(varied);
    }

    #[test]
    fn zero_ttl_is_untouched() {
        assert_eq!(jittered_ttl(Duration::ZERO, 0.1), Duration::ZERO);
    }

    #[test]
    fn zero_factor_is_identity() {
        let ttl = Duration::from_secs(42);
        assert_eq!(jittered_ttl(ttl, 0.0), ttl);
        assert_eq!(jittered_ttl(ttl, f64::NAN), ttl);
    }

    #[test]
    fn tiny_ttls_keep_a_floor() {
        for _ in 0..100 {
            assert!(jittered_ttl(Duration::from_nanos(1), 0.9) >= MIN_TTL);
        }
    }
}
