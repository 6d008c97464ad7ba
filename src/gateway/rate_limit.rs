//! Sliding-window rate limiting per caller identity (API key, or client IP
//! when `PEAC_TRUST_PROXY` is set — resolving the identity itself is a
//! gateway-binary concern, not this module's).

use std::sync::Mutex;
use std::time::Duration;

use dashmap::DashMap;

/// Default limit for anonymous (unkeyed) callers, per minute.
pub const ANONYMOUS_LIMIT_PER_MINUTE: u32 = 100;
/// Default limit for keyed (authenticated) callers, per minute.
pub const KEYED_LIMIT_PER_MINUTE: u32 = 1000;

const WINDOW: Duration = Duration::from_secs(60);

/// Outcome of a rate-limit check.
#[derive(Debug, PartialEq, Eq)]
pub enum RateLimitDecision {
    /// Caller is within their limit.
    Allowed,
    /// Caller exceeded their limit.
    Limited {
        /// Seconds until the caller may retry.
        retry_after_s: u32,
        /// Seconds until the window resets (`RateLimit-Reset`).
        reset_s: u32,
    },
}

/// A sliding-window counter per identity, backed by a bucketed timestamp
/// log rather than a fixed-window counter (avoids the boundary-burst
/// problem of naive fixed windows).
pub struct RateLimiter {
    limit_per_minute: u32,
    buckets: DashMap<String, Mutex<Vec<i64>>>,
}

impl RateLimiter {
    /// Construct a limiter allowing `limit_per_minute` requests per
    /// identity in any trailing 60-second window.
    #[must_use]
    pub fn new(limit_per_minute: u32) -> Self {
        Self { limit_per_minute, buckets: DashMap::new() }
    }

    /// Check and record one request from `identity` at the current time.
    pub fn check(&self, identity: &str) -> RateLimitDecision {
        self.check_at(identity, crate::time::unix_now())
    }

    fn check_at(&self, identity: &str, now: i64) -> RateLimitDecision {
        let bucket = self.buckets.entry(identity.to_string()).or_default();
        let mut timestamps = bucket.lock().expect("rate-limit bucket mutex poisoned");

        let window_start = now - WINDOW.as_secs() as i64;
        timestamps.retain(|&t| t > window_start);

        if timestamps.len() as u32 >= self.limit_per_minute {
            let oldest = timestamps.first().copied().unwrap_or(now);
            let reset_at = oldest + WINDOW.as_secs() as i64;
            let reset_s = (reset_at - now).max(0) as u32;
            return RateLimitDecision::Limited { retry_after_s: reset_s, reset_s };
        }

        timestamps.push(now);
        RateLimitDecision::Allowed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allows_requests_under_the_limit() {
        let limiter = RateLimiter::new(3);
        for _ in 0..3 {
            assert_eq!(limiter.check_at("id", 0), RateLimitDecision::Allowed);
        }
    }

    #[test]
    fn rejects_the_request_over_the_limit() {
        let limiter = RateLimiter::new(2);
        assert_eq!(limiter.check_at("id", 0), RateLimitDecision::Allowed);
        assert_eq!(limiter.check_at("id", 1), RateLimitDecision::Allowed);
        assert!(matches!(limiter.check_at("id", 2), RateLimitDecision::Limited { .. }));
    }

    #[test]
    fn window_slides_and_old_requests_fall_off() {
        let limiter = RateLimiter::new(1);
        assert_eq!(limiter.check_at("id", 0), RateLimitDecision::Allowed);
        assert!(matches!(limiter.check_at("id", 30), RateLimitDecision::Limited { .. }));
        assert_eq!(limiter.check_at("id", 61), RateLimitDecision::Allowed);
    }

    #[test]
    fn identities_are_independent() {
        let limiter = RateLimiter::new(1);
        assert_eq!(limiter.check_at("a", 0), RateLimitDecision::Allowed);
        assert_eq!(limiter.check_at("b", 0), RateLimitDecision::Allowed);
    }
}
