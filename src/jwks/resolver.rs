//! Multi-path JWKS discovery, singleflight coalescing, and stale-if-error.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::OnceCell;

use crate::error::VerifyError;
use crate::jwks::cache::{clamp_ttl, CacheEntry, CacheKey, JwksCache, KeySource};
use crate::jwks::jwk::JwkSet;
use crate::jwks::ssrf::{check_url, AllowAll, HostAllowlist, SsrfGuardConfig};
use crate::time::Deadline;

/// Response size limit for any JWKS fetch (`spec.md` §4.5).
pub const MAX_RESPONSE_BYTES: usize = 1024 * 1024;
/// Maximum number of keys accepted in a single JWKS document.
pub const MAX_KEYS: usize = 100;
/// Per-fetch network timeout.
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(5);

/// Resolver configuration.
pub struct ResolverConfig {
    /// SSRF guard settings.
    pub ssrf: SsrfGuardConfig,
    /// Whether stale cache entries may be served when every upstream error
    /// observed is transient.
    pub allow_stale: bool,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self { ssrf: SsrfGuardConfig::default(), allow_stale: true }
    }
}

/// Resolves `(issuer, kid)` pairs to [`crate::crypto::SignatureVerifier`]s,
/// backed by a [`JwksCache`] and an injected [`reqwest::Client`].
pub struct Resolver {
    client: reqwest::Client,
    cache: JwksCache,
    config: ResolverConfig,
    allowlist: Arc<dyn HostAllowlist>,
    inflight: DashMap<CacheKey, Arc<OnceCell<Result<CacheEntry, VerifyError>>>>,
}

impl Resolver {
    /// Construct a resolver over `client`, with its own cache.
    #[must_use]
    pub fn new(client: reqwest::Client, config: ResolverConfig) -> Self {
        Self {
            client,
            cache: JwksCache::new(crate::jwks::cache::DEFAULT_MAX_ENTRIES),
            config,
            allowlist: Arc::new(AllowAll),
            inflight: DashMap::new(),
        }
    }

    /// Override the host allowlist consulted by the SSRF guard.
    #[must_use]
    pub fn with_allowlist(mut self, allowlist: Arc<dyn HostAllowlist>) -> Self {
        self.allowlist = allowlist;
        self
    }

    /// Seed the cache directly with a known key, bypassing discovery and
    /// network I/O entirely. Used for statically configured trust anchors
    /// (`PEAC_VERIFY_KEYS`) and for tests.
    pub fn seed(&self, issuer: &str, verifier: crate::crypto::SignatureVerifier, ttl_seconds: i64) {
        let now = crate::time::unix_now();
        let kid = verifier.kid.clone();
        let entry = CacheEntry::new(verifier, now + ttl_seconds, None, now, KeySource::WellKnownJwks);
        self.cache.put((issuer.to_string(), kid), entry, now);
    }

    /// Resolve `kid` published by `issuer`.
    ///
    /// # Errors
    ///
    /// Returns [`VerifyError::KeyNotFound`] if no discovery path yields
    /// `kid`, [`VerifyError::SsrfBlocked`] if a candidate URL fails the SSRF
    /// guard, or [`VerifyError::UpstreamUnavailable`]/[`VerifyError::Timeout`]
    /// if every fetch fails and no (non-stale) cache entry can substitute.
    pub async fn resolve(&self, issuer: &str, kid: &str) -> Result<crate::crypto::SignatureVerifier, VerifyError> {
        let now = crate::time::unix_now();
        let key: CacheKey = (issuer.to_string(), kid.to_string());

        if let Some(entry) = self.cache.get(&key, now) {
            return Ok(entry.verifier);
        }

        let cell = self
            .inflight
            .entry(key.clone())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone();

        let result = cell
            .get_or_init(|| async { self.fetch_and_cache(issuer, kid, now).await })
            .await
            .clone();

        self.inflight.remove_if(&key, |_, v| Arc::ptr_eq(v, &cell));

        match result {
            Ok(entry) => Ok(entry.verifier),
            Err(err) => {
                if self.config.allow_stale && is_transient(&err) {
                    if let Some(stale) = self.cache.get_stale(&key, now) {
                        tracing::warn!(issuer, kid, "serving stale JWKS entry after upstream error");
                        return Ok(stale.verifier);
                    }
                }
                Err(err)
            }
        }
    }

    /// Like [`Resolver::resolve`], but bounded by a request-scoped
    /// [`Deadline`] in addition to this resolver's own per-fetch timeout —
    /// whichever is tighter governs. Used by callers (the gateway) that own
    /// a single budget shared across JWKS, policy, and pointer fetches for
    /// one request (`spec.md` §5).
    ///
    /// # Errors
    ///
    /// As [`Resolver::resolve`], plus [`VerifyError::Timeout`] if `deadline`
    /// elapses or is cancelled first.
    pub async fn resolve_with_deadline(
        &self, issuer: &str, kid: &str, deadline: &Deadline,
    ) -> Result<crate::crypto::SignatureVerifier, VerifyError> {
        deadline.race(self.resolve(issuer, kid)).await?
    }

    async fn fetch_and_cache(&self, issuer: &str, kid: &str, now: i64) -> Result<CacheEntry, VerifyError> {
        let candidates = discovery_candidates(issuer, kid)?;
        let mut last_err: Option<VerifyError> = None;

        for (url, source) in candidates {
            check_url(&url, self.config.ssrf, self.allowlist.as_ref())?;

            match self.fetch_one(&url, kid).await {
                Ok(Some((verifier, ttl, etag))) => {
                    let entry = CacheEntry::new(verifier.clone(), now + ttl, etag, now, source);
                    self.cache.put((issuer.to_string(), kid.to_string()), entry.clone(), now);
                    return Ok(entry);
                }
                Ok(None) => continue,
                Err(e) => last_err = Some(e),
            }
        }

        Err(last_err.unwrap_or_else(|| VerifyError::KeyNotFound {
            issuer: issuer.to_string(),
            kid: kid.to_string(),
        }))
    }

    async fn fetch_one(
        &self, url: &url::Url, kid: &str,
    ) -> Result<Option<(crate::crypto::SignatureVerifier, i64, Option<String>)>, VerifyError> {
        let resp = tokio::time::timeout(FETCH_TIMEOUT, self.client.get(url.clone()).send())
            .await
            .map_err(|_| VerifyError::Timeout)?
            .map_err(|e| VerifyError::UpstreamUnavailable(e.to_string()))?;

        if !resp.status().is_success() {
            return Ok(None);
        }

        let etag = resp.headers().get("etag").and_then(|v| v.to_str().ok()).map(str::to_string);
        let max_age = cache_control_max_age(resp.headers());
        let ttl = clamp_ttl(max_age);

        let bytes = resp.bytes().await.map_err(|e| VerifyError::UpstreamUnavailable(e.to_string()))?;
        if bytes.len() > MAX_RESPONSE_BYTES {
            return Err(VerifyError::JwksTooLarge);
        }

        if let Ok(single) = serde_json::from_slice::<crate::jwks::jwk::Jwk>(&bytes) {
            if single.kid == kid {
                let verifier = single
                    .to_verifier()
                    .map_err(|e| VerifyError::UpstreamUnavailable(e.to_string()))?;
                return Ok(Some((verifier, ttl, etag)));
            }
            return Ok(None);
        }

        let set: JwkSet = serde_json::from_slice(&bytes)
            .map_err(|e| VerifyError::UpstreamUnavailable(format!("invalid JWKS body: {e}")))?;
        if set.keys.len() > MAX_KEYS {
            return Err(VerifyError::JwksTooManyKeys);
        }
        let Some(jwk) = set.keys.iter().find(|k| k.kid == kid) else {
            return Ok(None);
        };
        let verifier = jwk.to_verifier().map_err(|e| VerifyError::UpstreamUnavailable(e.to_string()))?;
        Ok(Some((verifier, ttl, etag)))
    }
}

fn is_transient(err: &VerifyError) -> bool {
    matches!(err, VerifyError::UpstreamUnavailable(_) | VerifyError::Timeout)
}

fn cache_control_max_age(headers: &reqwest::header::HeaderMap) -> Option<i64> {
    let value = headers.get(reqwest::header::CACHE_CONTROL)?.to_str().ok()?;
    value.split(',').find_map(|directive| {
        let directive = directive.trim();
        directive.strip_prefix("max-age=").and_then(|v| v.parse::<i64>().ok())
    })
}

fn discovery_candidates(issuer: &str, kid: &str) -> Result<Vec<(url::Url, KeySource)>, VerifyError> {
    let base = url::Url::parse(issuer)
        .map_err(|e| VerifyError::InvalidTransport(format!("bad issuer origin {issuer}: {e}")))?;
    let join = |path: &str| {
        base.join(path).map_err(|e| VerifyError::InvalidTransport(format!("bad discovery path {path}: {e}")))
    };

    let mut keys_url = join("keys")?;
    keys_url.query_pairs_mut().append_pair("keyID", kid);

    Ok(vec![
        (join(".well-known/jwks")?, KeySource::WellKnownJwks),
        (keys_url, KeySource::KeysEndpoint),
        (join(".well-known/jwks.json")?, KeySource::WellKnownJwksJson),
    ])
}
