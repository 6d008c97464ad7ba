//! # Edge Verification Gateway (C10)
//!
//! A pure request finite-state-machine — bypass / verify / challenge /
//! forward — independent of any HTTP framework. A binary wiring this to
//! axum/tower only needs to translate [`GatewayDecision`] into a response.

mod problem;
mod rate_limit;

pub use problem::ProblemDetails;
pub use rate_limit::{RateLimitDecision, RateLimiter};

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::canon::digest;
use crate::error::{ErrorCode, VerifyError};
use crate::jwks::{check_url, AllowAll, HostAllowlist, SsrfGuardConfig};
use crate::time::Deadline;
use crate::transport::{self, ParsedReceipt, Profile, RequestCarriers, MAX_BODY_BYTES};
use crate::verifier::Verifier;

/// Default per-request time budget shared across every fetch `handle`
/// triggers (JWKS resolution, pointer dereferencing).
pub const DEFAULT_REQUEST_BUDGET: Duration = Duration::from_secs(5);

/// Configuration governing which requests skip verification entirely.
#[derive(Clone, Debug)]
pub struct GatewayConfig {
    /// Path prefixes that bypass verification outright.
    pub bypass_paths: Vec<String>,
    /// Total time budget for one request's downstream fetches — the JWKS
    /// resolution inside `verify_parsed` and, when present, the pointer
    /// dereference — propagated as a single [`Deadline`] (`spec.md` §5).
    pub request_budget: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self { bypass_paths: Vec::new(), request_budget: DEFAULT_REQUEST_BUDGET }
    }
}

impl GatewayConfig {
    fn is_bypassed(&self, path: &str) -> bool {
        self.bypass_paths.iter().any(|prefix| path.starts_with(prefix.as_str()))
    }
}

/// The gateway's decision for one request.
#[derive(Debug)]
pub enum GatewayDecision {
    /// Request matched a bypass path; skip verification.
    Pass,
    /// Receipt verified; forward upstream with these headers attached.
    Forward {
        /// Headers to add to the forwarded request (`PEAC-Verified`,
        /// `PEAC-Engine`).
        headers: HashMap<String, String>,
    },
    /// No receipt presented; challenge the caller for one.
    Challenge(ProblemDetails),
    /// Receipt was structurally or semantically invalid.
    Error(ProblemDetails),
    /// Caller exceeded the rate limit.
    RateLimited(ProblemDetails),
}

/// Runs the request FSM described in `spec.md` §4.10.
pub struct Gateway<'a> {
    config: GatewayConfig,
    verifier: &'a Verifier,
    rate_limiter: Option<&'a RateLimiter>,
    client: reqwest::Client,
    ssrf: SsrfGuardConfig,
    allowlist: Arc<dyn HostAllowlist>,
}

impl<'a> Gateway<'a> {
    /// Construct a gateway over `verifier`, optionally enforcing
    /// `rate_limiter`. Pointer-carrier dereferencing uses a default
    /// [`reqwest::Client`] and the built-in SSRF blocklist; use
    /// [`Gateway::with_client`]/[`Gateway::with_allowlist`] to override
    /// either.
    #[must_use]
    pub fn new(config: GatewayConfig, verifier: &'a Verifier, rate_limiter: Option<&'a RateLimiter>) -> Self {
        Self::with_client(config, verifier, rate_limiter, reqwest::Client::new())
    }

    /// Construct a gateway using an already-built client for pointer
    /// dereferencing, so a deployment can share one connection pool across
    /// the gateway, the JWKS resolver, and policy discovery.
    #[must_use]
    pub fn with_client(
        config: GatewayConfig, verifier: &'a Verifier, rate_limiter: Option<&'a RateLimiter>, client: reqwest::Client,
    ) -> Self {
        Self { config, verifier, rate_limiter, client, ssrf: SsrfGuardConfig::default(), allowlist: Arc::new(AllowAll) }
    }

    /// Override the host allowlist consulted when dereferencing a pointer
    /// carrier.
    #[must_use]
    pub fn with_allowlist(mut self, allowlist: Arc<dyn HostAllowlist>) -> Self {
        self.allowlist = allowlist;
        self
    }

    /// Override the SSRF guard settings consulted when dereferencing a
    /// pointer carrier (e.g. to allow loopback targets in local dev).
    #[must_use]
    pub fn with_ssrf(mut self, ssrf: SsrfGuardConfig) -> Self {
        self.ssrf = ssrf;
        self
    }

    /// Decide what to do with one request.
    pub async fn handle(&self, path: &str, identity: &str, carriers: &RequestCarriers<'_>) -> GatewayDecision {
        if self.config.is_bypassed(path) {
            return GatewayDecision::Pass;
        }

        if let Some(limiter) = self.rate_limiter {
            if let RateLimitDecision::Limited { retry_after_s, reset_s } = limiter.check(identity) {
                return GatewayDecision::RateLimited(ProblemDetails::rate_limited(retry_after_s, reset_s));
            }
        }

        let parsed = match transport::extract(carriers) {
            Ok(Some(parsed)) => parsed,
            Ok(None) => {
                return GatewayDecision::Challenge(ProblemDetails::from_code(ErrorCode::ReceiptMissing, "no receipt presented"));
            }
            Err(e) => return GatewayDecision::Error(ProblemDetails::from_error(&e)),
        };

        let deadline = Deadline::new(self.config.request_budget, CancellationToken::new());

        let parsed = if parsed.profile == Profile::Pointer {
            match self.dereference_pointer(&parsed, &deadline).await {
                Ok(resolved) => resolved,
                Err(e) => return GatewayDecision::Error(ProblemDetails::from_error(&e)),
            }
        } else {
            parsed
        };

        let outcome = self.verifier.verify_parsed_with_deadline(&parsed, &deadline).await;
        if outcome.valid {
            let mut headers = HashMap::new();
            headers.insert("PEAC-Verified".to_string(), "true".to_string());
            headers.insert("PEAC-Engine".to_string(), "receipt".to_string());
            GatewayDecision::Forward { headers }
        } else {
            let code = outcome.code.unwrap_or(ErrorCode::SchemaValidationFailed);
            let message = outcome.message.unwrap_or_default();
            GatewayDecision::Error(ProblemDetails::from_code(code, &message))
        }
    }

    /// Fetch the body a `PEAC-Receipt-Pointer` carrier points at, check it
    /// hashes to the declared digest, and reduce it to a [`Profile::Body`]
    /// receipt ready for [`Verifier::verify_parsed`]. The fetch goes
    /// through the same SSRF guard as JWKS discovery and policy fetches,
    /// and shares `deadline`'s budget with whatever JWKS resolution
    /// `verify_parsed_with_deadline` goes on to do for the same request.
    async fn dereference_pointer(&self, parsed: &ParsedReceipt, deadline: &Deadline) -> Result<ParsedReceipt, VerifyError> {
        let pointer = parsed
            .pointer
            .as_ref()
            .ok_or_else(|| VerifyError::InvalidTransport("pointer carrier missing its PointerRef".into()))?;

        let url = url::Url::parse(&pointer.url)
            .map_err(|e| VerifyError::InvalidTransport(format!("pointer url: {e}")))?;
        check_url(&url, self.ssrf, self.allowlist.as_ref())?;

        let resp = deadline
            .race(self.client.get(url).send())
            .await?
            .map_err(|e| VerifyError::UpstreamUnavailable(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(VerifyError::UpstreamUnavailable(format!("pointer fetch returned {}", resp.status())));
        }

        let body = deadline.race(resp.bytes()).await?.map_err(|e| VerifyError::UpstreamUnavailable(e.to_string()))?;
        if body.len() > MAX_BODY_BYTES {
            return Err(VerifyError::RequestTooLarge("pointer-fetched body".into()));
        }

        if digest::sha256_hex(&body) != pointer.sha256 {
            return Err(VerifyError::PointerDigestMismatch);
        }

        let jws = std::str::from_utf8(&body)
            .map_err(|e| VerifyError::InvalidTransport(format!("pointer body is not valid UTF-8: {e}")))?
            .to_string();

        Ok(ParsedReceipt { profile: Profile::Body, receipts: vec![jws], pointer: None })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bypass_paths_match_by_prefix() {
        let config = GatewayConfig { bypass_paths: vec!["/health".to_string()], ..GatewayConfig::default() };
        assert!(config.is_bypassed("/health/live"));
        assert!(!config.is_bypassed("/api/resource"));
    }

    #[tokio::test]
    async fn dereference_pointer_times_out_when_the_request_budget_elapses() {
        use crate::replay::InMemoryReplayStore;
        use crate::verifier::{Verifier, VerifyPolicy};
        use std::sync::Arc as StdArc;
        use wiremock::matchers::method;
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(200)))
            .mount(&server)
            .await;

        let resolver = crate::jwks::Resolver::new(reqwest::Client::new(), crate::jwks::ResolverConfig::default());
        let verifier = Verifier::new(resolver, StdArc::new(InMemoryReplayStore::new()), VerifyPolicy::default());

        let request_budget = Duration::from_millis(20);
        let config = GatewayConfig { request_budget, ..GatewayConfig::default() };
        let gateway = Gateway::new(config, &verifier, None).with_ssrf(SsrfGuardConfig { allow_loopback_http: true });

        let parsed = ParsedReceipt {
            profile: Profile::Pointer,
            receipts: vec![],
            pointer: Some(crate::transport::PointerRef {
                sha256: "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b85".to_string(),
                url: format!("{}/r", server.uri()),
                ext: HashMap::new(),
            }),
        };

        let deadline = Deadline::new(request_budget, CancellationToken::new());
        let err = gateway.dereference_pointer(&parsed, &deadline).await.unwrap_err();
        assert!(matches!(err, VerifyError::Timeout));
    }
}
