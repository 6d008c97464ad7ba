//! TTL + LRU cache for resolved JWKS entries, keyed by `(issuer, kid)`.

use dashmap::DashMap;

use crate::crypto::SignatureVerifier;

/// Default cache TTL when no `Cache-Control: max-age` is present.
pub const DEFAULT_TTL_SECONDS: i64 = 3600;
/// Minimum TTL a fetched `max-age` is clamped to.
pub const MIN_TTL_SECONDS: i64 = 60;
/// Maximum TTL a fetched `max-age` is clamped to.
pub const MAX_TTL_SECONDS: i64 = 86_400;
/// Default maximum number of cache entries before LRU eviction kicks in.
pub const DEFAULT_MAX_ENTRIES: usize = 10_000;
/// Default window, past expiry, a stale entry remains eligible for
/// stale-if-error use.
pub const DEFAULT_MAX_STALE_AGE_SECONDS: i64 = 48 * 3600;

/// Where a cache entry's key material was discovered.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeySource {
    /// `/.well-known/jwks`.
    WellKnownJwks,
    /// `/keys?keyID=<kid>`.
    KeysEndpoint,
    /// `/.well-known/jwks.json`.
    WellKnownJwksJson,
}

/// One cached, resolved key.
#[derive(Clone, Debug)]
pub struct CacheEntry {
    /// The resolved verifying key.
    pub verifier: SignatureVerifier,
    /// Unix-seconds expiry.
    pub expires_at: i64,
    /// `ETag` of the response this entry came from, if any.
    pub etag: Option<String>,
    /// Unix-seconds this entry was fetched.
    pub fetched_at: i64,
    /// Which discovery path produced this entry.
    pub source: KeySource,
    last_access: i64,
}

impl CacheEntry {
    /// Construct an entry. `last_access` is initialized to `fetched_at` and
    /// updated on every subsequent [`JwksCache::get`]/[`JwksCache::get_stale`].
    #[must_use]
    pub fn new(verifier: SignatureVerifier, expires_at: i64, etag: Option<String>, fetched_at: i64, source: KeySource) -> Self {
        Self { verifier, expires_at, etag, fetched_at, source, last_access: fetched_at }
    }
}

/// Clamp a `Cache-Control: max-age` value into `[MIN_TTL_SECONDS,
/// MAX_TTL_SECONDS]`, falling back to [`DEFAULT_TTL_SECONDS`] when absent.
#[must_use]
pub fn clamp_ttl(max_age: Option<i64>) -> i64 {
    max_age.unwrap_or(DEFAULT_TTL_SECONDS).clamp(MIN_TTL_SECONDS, MAX_TTL_SECONDS)
}

/// The `(issuer origin, kid)` cache key.
pub type CacheKey = (String, String);

/// TTL + LRU cache of resolved JWKS entries.
pub struct JwksCache {
    entries: DashMap<CacheKey, CacheEntry>,
    max_entries: usize,
    max_stale_age_seconds: i64,
}

impl JwksCache {
    /// Construct an empty cache bounded at `max_entries`.
    #[must_use]
    pub fn new(max_entries: usize) -> Self {
        Self { entries: DashMap::new(), max_entries, max_stale_age_seconds: DEFAULT_MAX_STALE_AGE_SECONDS }
    }

    /// Override the stale-if-error window (default
    /// [`DEFAULT_MAX_STALE_AGE_SECONDS`]).
    #[must_use]
    pub fn with_max_stale_age(mut self, seconds: i64) -> Self {
        self.max_stale_age_seconds = seconds;
        self
    }

    /// Insert or replace the entry for `key`, evicting the least-recently
    /// accessed entry if this insertion would exceed `max_entries`.
    pub fn put(&self, key: CacheKey, mut entry: CacheEntry, now: i64) {
        entry.last_access = now;
        self.entries.insert(key, entry);
        if self.entries.len() > self.max_entries {
            self.evict_lru();
        }
    }

    fn evict_lru(&self) {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|e| e.last_access)
            .map(|e| e.key().clone());
        if let Some(key) = oldest {
            self.entries.remove(&key);
        }
    }

    /// Return the live (non-expired) entry for `key`, if any, touching its
    /// LRU recency. Expired entries are left in place for
    /// [`JwksCache::get_stale`] — this never deletes.
    pub fn get(&self, key: &CacheKey, now: i64) -> Option<CacheEntry> {
        let mut entry = self.entries.get_mut(key)?;
        if entry.expires_at <= now {
            return None;
        }
        entry.last_access = now;
        Some(entry.clone())
    }

    /// Return `key`'s entry regardless of expiry, as long as it is within
    /// the stale-if-error window, touching its LRU recency.
    pub fn get_stale(&self, key: &CacheKey, now: i64) -> Option<CacheEntry> {
        let mut entry = self.entries.get_mut(key)?;
        if now - entry.expires_at > self.max_stale_age_seconds {
            return None;
        }
        entry.last_access = now;
        Some(entry.clone())
    }

    /// Number of entries currently cached (including expired-but-stale
    /// ones).
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
