//! # JWKS Cache & Resolver (C5)
//!
//! Multi-path discovery (`/.well-known/jwks`, `/keys?keyID=`,
//! `/.well-known/jwks.json`), a TTL+LRU cache, singleflight coalescing of
//! concurrent resolves, stale-if-error fallback, and the SSRF guard shared
//! with policy discovery (C9).

mod cache;
mod jwk;
mod resolver;
mod ssrf;

pub use cache::{CacheEntry, CacheKey, JwksCache, KeySource};
pub use jwk::{Jwk, JwkSet};
pub use resolver::{Resolver, ResolverConfig, FETCH_TIMEOUT, MAX_KEYS, MAX_RESPONSE_BYTES};
pub use ssrf::{check_url, AllowAll, HostAllowlist, SsrfGuardConfig};
