//! # Receipt Verifier (C8)
//!
//! The state machine every receipt passes through regardless of which
//! transport carried it: parse, authorize issuer, resolve key, verify
//! signature, validate claims, check replay, bind policy, check purpose.

mod policy_binding;

pub use policy_binding::PolicyBinding;

use std::sync::Arc;
use std::time::Instant;

use crate::crypto::{self, CompactJws};
use crate::error::{ErrorCode, VerifyError};
use crate::jwks::Resolver;
use crate::policy::{fingerprint_hash, PolicyFingerprint};
use crate::receipt::ReceiptClaims;
use crate::replay::{ReplayContext, ReplayStore};
use crate::time::Deadline;
use crate::transport::{ParsedReceipt, Profile};

/// Per-timing breakdown of a verify call, for observability.
#[derive(Clone, Copy, Debug, Default)]
pub struct Timing {
    /// Total wall-clock time for the verify call, in milliseconds.
    pub total_ms: u64,
    /// Time spent resolving the signing key, in milliseconds.
    pub fetch_ms: u64,
    /// Time spent on signature and claims verification, in milliseconds.
    pub verify_ms: u64,
}

/// The result of verifying one receipt. A verification failure is a
/// structured result, not a thrown error — callers inspect `valid`.
#[derive(Clone, Debug)]
pub struct VerifyOutcome {
    /// Whether the receipt passed every check.
    pub valid: bool,
    /// The verified claim set, present iff `valid`.
    pub claims: Option<ReceiptClaims>,
    /// The `kid` the receipt was signed under, when known.
    pub kid: Option<String>,
    /// The stable failure code, present iff `!valid`.
    pub code: Option<ErrorCode>,
    /// Redacted human-readable failure detail.
    pub message: Option<String>,
    /// Timing breakdown for this call.
    pub timing: Timing,
}

impl VerifyOutcome {
    fn failure(code: ErrorCode, detail: impl Into<String>, timing: Timing) -> Self {
        Self {
            valid: false,
            claims: None,
            kid: None,
            code: Some(code),
            message: Some(crate::redact::redact(&detail.into())),
            timing,
        }
    }

    fn from_error(err: &VerifyError, timing: Timing) -> Self {
        let (code, detail) = err.to_problem_fields();
        Self::failure(code, detail, timing)
    }
}

/// Verification policy applied to every receipt this verifier checks.
pub struct VerifyPolicy {
    /// Issuer origins allowed to present receipts, unless
    /// `unsafe_allow_any_issuer`.
    pub issuer_allowlist: Vec<String>,
    /// Bypass the issuer allowlist entirely. Defaults false (fail-closed).
    pub unsafe_allow_any_issuer: bool,
    /// Expected audience origin, if the caller wants it enforced.
    pub audience: Option<String>,
    /// Maximum allowed clock skew for `iat`, in seconds (≤ 3600).
    pub max_clock_skew: i64,
    /// Whether a nonce (and thus replay protection) is required.
    pub require_replay_protection: bool,
    /// Expected `purpose_declared`/`purpose_enforced` value, if any.
    pub expected_purpose: Option<String>,
    /// Policy fingerprint to bind `policy_hash` against, if any.
    pub policy_binding: Option<PolicyBinding>,
}

impl Default for VerifyPolicy {
    fn default() -> Self {
        Self {
            issuer_allowlist: Vec::new(),
            unsafe_allow_any_issuer: false,
            audience: None,
            max_clock_skew: 300,
            require_replay_protection: false,
            expected_purpose: None,
            policy_binding: None,
        }
    }
}

/// Verifies receipts per `spec.md` §4.8.
pub struct Verifier {
    resolver: Resolver,
    replay_store: Arc<dyn ReplayStore>,
    policy: VerifyPolicy,
}

impl Verifier {
    /// Construct a verifier over `resolver` and `replay_store`, applying
    /// `policy`.
    #[must_use]
    pub fn new(resolver: Resolver, replay_store: Arc<dyn ReplayStore>, policy: VerifyPolicy) -> Self {
        Self { resolver, replay_store, policy }
    }

    /// Verify a single compact JWS string, bypassing transport parsing.
    pub async fn verify(&self, compact_jws: &str) -> VerifyOutcome {
        let start = Instant::now();
        self.verify_inner(compact_jws, start, None).await
    }

    /// As [`Verifier::verify`], but the JWKS fetch and replay-store
    /// read-modify-write share `deadline`'s budget instead of their own
    /// independent timeouts — for a caller (the gateway) that owns a single
    /// per-request budget (`spec.md` §5).
    pub async fn verify_with_deadline(&self, compact_jws: &str, deadline: &Deadline) -> VerifyOutcome {
        let start = Instant::now();
        self.verify_inner(compact_jws, start, Some(deadline)).await
    }

    /// Verify a [`ParsedReceipt`] extracted by C4. Pointer carriers are not
    /// resolved here — callers presenting a pointer carrier are expected to
    /// have already dereferenced it to a compact JWS via the same HTTPS
    /// fetch + digest check the JWKS resolver's SSRF guard uses; the
    /// [`crate::transport::PointerRef`] digest MUST be checked by that
    /// caller before this method sees a JWS.
    pub async fn verify_parsed(&self, parsed: &ParsedReceipt) -> VerifyOutcome {
        self.verify_parsed_inner(parsed, None).await
    }

    /// As [`Verifier::verify_parsed`], sharing `deadline`'s budget per
    /// [`Verifier::verify_with_deadline`].
    pub async fn verify_parsed_with_deadline(&self, parsed: &ParsedReceipt, deadline: &Deadline) -> VerifyOutcome {
        self.verify_parsed_inner(parsed, Some(deadline)).await
    }

    async fn verify_parsed_inner(&self, parsed: &ParsedReceipt, deadline: Option<&Deadline>) -> VerifyOutcome {
        let start = Instant::now();
        if parsed.profile == Profile::Pointer {
            return VerifyOutcome::failure(
                ErrorCode::InvalidTransport,
                "pointer receipts must be dereferenced before verify_parsed",
                Timing { total_ms: elapsed_ms(start), ..Timing::default() },
            );
        }
        let Some(jws) = parsed.receipts.first() else {
            return VerifyOutcome::failure(
                ErrorCode::ReceiptMissing,
                "no receipt presented",
                Timing { total_ms: elapsed_ms(start), ..Timing::default() },
            );
        };
        self.verify_inner(jws, start, deadline).await
    }

    async fn verify_inner(&self, compact_jws: &str, start: Instant, deadline: Option<&Deadline>) -> VerifyOutcome {
        let mut timing = Timing::default();

        // 1. Parse.
        let parsed = match CompactJws::parse(compact_jws) {
            Ok(p) => p,
            Err(e) => {
                timing.total_ms = elapsed_ms(start);
                return VerifyOutcome::failure(ErrorCode::InvalidJwsFormat, e.to_string(), timing);
            }
        };

        let payload = match parsed.payload_bytes() {
            Ok(p) => p,
            Err(e) => {
                timing.total_ms = elapsed_ms(start);
                return VerifyOutcome::failure(ErrorCode::InvalidJwsFormat, e.to_string(), timing);
            }
        };
        let claims: ReceiptClaims = match ReceiptClaims::from_strict_json(&payload) {
            Ok(c) => c,
            Err(e) => {
                timing.total_ms = elapsed_ms(start);
                return VerifyOutcome::from_error(&e, timing);
            }
        };

        // 2. Authorize issuer.
        if !self.policy.unsafe_allow_any_issuer && !self.policy.issuer_allowlist.iter().any(|i| i == &claims.iss) {
            timing.total_ms = elapsed_ms(start);
            return VerifyOutcome::failure(ErrorCode::IssuerNotAllowed, claims.iss.clone(), timing);
        }
        if let Some(aud) = &self.policy.audience {
            if aud != &claims.aud {
                timing.total_ms = elapsed_ms(start);
                return VerifyOutcome::failure(ErrorCode::SchemaValidationFailed, "audience mismatch", timing);
            }
        }

        // 3. Resolve key.
        let fetch_start = Instant::now();
        let resolved = match deadline {
            Some(d) => self.resolver.resolve_with_deadline(&claims.iss, &parsed.kid, d).await,
            None => self.resolver.resolve(&claims.iss, &parsed.kid).await,
        };
        let verifier = match resolved {
            Ok(v) => v,
            Err(e) => {
                timing.fetch_ms = elapsed_ms(fetch_start);
                timing.total_ms = elapsed_ms(start);
                return VerifyOutcome::from_error(&e, timing);
            }
        };
        timing.fetch_ms = elapsed_ms(fetch_start);

        // 4. Verify signature.
        let verify_start = Instant::now();
        if let Err(e) = crypto::verify_compact(&parsed, &verifier) {
            timing.verify_ms = elapsed_ms(verify_start);
            timing.total_ms = elapsed_ms(start);
            return VerifyOutcome::failure(ErrorCode::SignatureInvalid, e.to_string(), timing);
        }

        // 5. Claims: time checks (strict schema already ran above).
        let now = crate::time::unix_now();
        if let Err(e) = claims.check_time_bounds(now, self.policy.max_clock_skew) {
            timing.verify_ms = elapsed_ms(verify_start);
            timing.total_ms = elapsed_ms(start);
            return VerifyOutcome::from_error(&e, timing);
        }

        // 6. Replay.
        match &claims.nonce {
            Some(nonce) => {
                let ttl = (claims.exp - claims.iat).max(1);
                let ctx = ReplayContext { issuer: claims.iss.clone(), kid: parsed.kid.clone(), nonce: nonce.clone(), ttl_seconds: ttl };
                let seen = match deadline {
                    Some(d) => match d.race(self.replay_store.seen(&ctx)).await {
                        Ok(seen) => seen,
                        Err(e) => {
                            timing.total_ms = elapsed_ms(start);
                            return VerifyOutcome::from_error(&e, timing);
                        }
                    },
                    None => self.replay_store.seen(&ctx).await,
                };
                if seen {
                    timing.total_ms = elapsed_ms(start);
                    return VerifyOutcome::failure(ErrorCode::NonceReplay, "nonce already seen", timing);
                }
            }
            None if self.policy.require_replay_protection => {
                timing.total_ms = elapsed_ms(start);
                return VerifyOutcome::failure(
                    ErrorCode::ReplayProtectionRequired,
                    "deployment requires a nonce but none was presented",
                    timing,
                );
            }
            None => {}
        }

        // 7. Policy binding.
        if let Some(binding) = &self.policy.policy_binding {
            match binding.check(&claims) {
                Ok(()) => {}
                Err(e) => {
                    timing.total_ms = elapsed_ms(start);
                    return VerifyOutcome::from_error(&e, timing);
                }
            }
        }

        // 8. Purpose.
        if let Some(expected) = &self.policy.expected_purpose {
            if !claims.satisfies_purpose(expected) {
                timing.total_ms = elapsed_ms(start);
                return VerifyOutcome::failure(ErrorCode::PurposeInvalid, "expected purpose not satisfied", timing);
            }
        }

        timing.verify_ms = elapsed_ms(verify_start);
        timing.total_ms = elapsed_ms(start);
        VerifyOutcome {
            valid: true,
            claims: Some(claims),
            kid: Some(parsed.kid.clone()),
            code: None,
            message: None,
            timing,
        }
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}

/// Recompute `fingerprint`'s hash for comparison against a receipt's
/// `policy_hash`.
///
/// # Errors
///
/// Propagates [`fingerprint_hash`]'s errors.
pub fn recompute_policy_hash(fingerprint: &PolicyFingerprint) -> Result<String, VerifyError> {
    fingerprint_hash(fingerprint)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::Ed25519KeyPair;
    use crate::jwks::ResolverConfig;
    use crate::receipt::jws_envelope::ReceiptHeader;
    use crate::replay::InMemoryReplayStore;
    use std::collections::HashMap;

    fn sign_claims(key: &Ed25519KeyPair, kid: &str, claims: &ReceiptClaims) -> String {
        let header = ReceiptHeader::new(kid);
        let header_json = crate::canon::jcs::canonicalize(&header).unwrap();
        let payload_json = crate::canon::jcs::canonicalize(claims).unwrap();
        crypto::sign_compact(key, &header_json, &payload_json).unwrap()
    }

    fn base_claims(iat: i64, exp: i64) -> ReceiptClaims {
        ReceiptClaims {
            iss: "https://issuer.example".into(),
            aud: "https://aud.example".into(),
            iat,
            exp,
            rid: "01H000000000000000000000".into(),
            sub: None,
            amt: None,
            cur: None,
            payment: None,
            policy_hash: None,
            purpose_declared: Default::default(),
            purpose_enforced: None,
            purpose_reason: None,
            nonce: None,
            ext: HashMap::new(),
        }
    }

    fn seeded_verifier(key: &Ed25519KeyPair, kid: &str, policy: VerifyPolicy) -> Verifier {
        let resolver = Resolver::new(reqwest::Client::new(), ResolverConfig::default());
        let sig_verifier = crate::crypto::SignatureVerifier::new(kid, &key.public_bytes()).unwrap();
        resolver.seed("https://issuer.example", sig_verifier, 3600);
        Verifier::new(resolver, Arc::new(InMemoryReplayStore::new()), policy)
    }

    fn allow_issuer_policy() -> VerifyPolicy {
        VerifyPolicy { issuer_allowlist: vec!["https://issuer.example".to_string()], ..VerifyPolicy::default() }
    }

    #[tokio::test]
    async fn valid_receipt_verifies() {
        let key = Ed25519KeyPair::generate();
        let now = crate::time::unix_now();
        let claims = base_claims(now, now + 300);
        let jws = sign_claims(&key, "k1", &claims);
        let verifier = seeded_verifier(&key, "k1", allow_issuer_policy());

        let outcome = verifier.verify(&jws).await;
        assert!(outcome.valid);
        assert_eq!(outcome.claims.unwrap().iss, "https://issuer.example");
    }

    #[tokio::test]
    async fn expired_receipt_is_rejected() {
        let key = Ed25519KeyPair::generate();
        let now = crate::time::unix_now();
        let claims = base_claims(now - 1000, now - 500);
        let jws = sign_claims(&key, "k1", &claims);
        let verifier = seeded_verifier(&key, "k1", allow_issuer_policy());

        let outcome = verifier.verify(&jws).await;
        assert!(!outcome.valid);
        assert_eq!(outcome.code, Some(ErrorCode::ExpiredReceipt));
    }

    #[tokio::test]
    async fn unknown_issuer_is_rejected() {
        let key = Ed25519KeyPair::generate();
        let now = crate::time::unix_now();
        let claims = base_claims(now, now + 300);
        let jws = sign_claims(&key, "k1", &claims);
        let policy = VerifyPolicy { issuer_allowlist: vec!["https://other.example".to_string()], ..VerifyPolicy::default() };
        let verifier = seeded_verifier(&key, "k1", policy);

        let outcome = verifier.verify(&jws).await;
        assert!(!outcome.valid);
        assert_eq!(outcome.code, Some(ErrorCode::IssuerNotAllowed));
    }

    #[tokio::test]
    async fn tampered_signature_is_rejected() {
        let key = Ed25519KeyPair::generate();
        let other_key = Ed25519KeyPair::generate();
        let now = crate::time::unix_now();
        let claims = base_claims(now, now + 300);
        let jws = sign_claims(&other_key, "k1", &claims);
        let verifier = seeded_verifier(&key, "k1", allow_issuer_policy());

        let outcome = verifier.verify(&jws).await;
        assert!(!outcome.valid);
        assert_eq!(outcome.code, Some(ErrorCode::SignatureInvalid));
    }

    #[tokio::test]
    async fn replayed_nonce_is_rejected_on_second_presentation() {
        let key = Ed25519KeyPair::generate();
        let now = crate::time::unix_now();
        let mut claims = base_claims(now, now + 300);
        claims.nonce = Some("n1".to_string());
        let jws = sign_claims(&key, "k1", &claims);
        let verifier = seeded_verifier(&key, "k1", allow_issuer_policy());

        assert!(verifier.verify(&jws).await.valid);
        let second = verifier.verify(&jws).await;
        assert!(!second.valid);
        assert_eq!(second.code, Some(ErrorCode::NonceReplay));
    }

    #[tokio::test]
    async fn missing_nonce_rejected_when_replay_protection_required() {
        let key = Ed25519KeyPair::generate();
        let now = crate::time::unix_now();
        let claims = base_claims(now, now + 300);
        let jws = sign_claims(&key, "k1", &claims);
        let policy = VerifyPolicy { require_replay_protection: true, ..allow_issuer_policy() };
        let verifier = seeded_verifier(&key, "k1", policy);

        let outcome = verifier.verify(&jws).await;
        assert!(!outcome.valid);
        assert_eq!(outcome.code, Some(ErrorCode::ReplayProtectionRequired));
    }

    #[tokio::test]
    async fn purpose_mismatch_is_rejected() {
        let key = Ed25519KeyPair::generate();
        let now = crate::time::unix_now();
        let mut claims = base_claims(now, now + 300);
        claims.purpose_enforced = Some("ai-training".to_string());
        let jws = sign_claims(&key, "k1", &claims);
        let policy = VerifyPolicy { expected_purpose: Some("summarization".to_string()), ..allow_issuer_policy() };
        let verifier = seeded_verifier(&key, "k1", policy);

        let outcome = verifier.verify(&jws).await;
        assert!(!outcome.valid);
        assert_eq!(outcome.code, Some(ErrorCode::PurposeInvalid));
    }

    #[test]
    fn elapsed_ms_never_panics_on_zero_duration() {
        let start = Instant::now();
        assert!(elapsed_ms(start) < 1000);
    }

    #[tokio::test]
    async fn verify_with_deadline_times_out_on_a_slow_jwks_fetch() {
        use crate::jwks::{ResolverConfig, SsrfGuardConfig};
        use crate::time::Deadline;
        use std::time::Duration;
        use tokio_util::sync::CancellationToken;
        use wiremock::matchers::method;
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(200)))
            .mount(&server)
            .await;

        let config = ResolverConfig { ssrf: SsrfGuardConfig { allow_loopback_http: true }, allow_stale: false };
        let resolver = Resolver::new(reqwest::Client::new(), config);
        let policy = VerifyPolicy { issuer_allowlist: vec![server.uri()], ..VerifyPolicy::default() };
        let verifier = Verifier::new(resolver, Arc::new(InMemoryReplayStore::new()), policy);

        let key = Ed25519KeyPair::generate();
        let now = crate::time::unix_now();
        let claims = ReceiptClaims {
            iss: server.uri(),
            aud: "https://aud.example".into(),
            iat: now,
            exp: now + 300,
            rid: "01H000000000000000000001".into(),
            sub: None,
            amt: None,
            cur: None,
            payment: None,
            policy_hash: None,
            purpose_declared: Default::default(),
            purpose_enforced: None,
            purpose_reason: None,
            nonce: None,
            ext: HashMap::new(),
        };
        let jws = sign_claims(&key, "k1", &claims);

        let deadline = Deadline::new(Duration::from_millis(20), CancellationToken::new());
        let outcome = verifier.verify_with_deadline(&jws, &deadline).await;
        assert!(!outcome.valid);
        assert_eq!(outcome.code, Some(ErrorCode::Timeout));
    }
}
