//! # Error Taxonomy
//!
//! Every error the core can surface carries a stable, machine-readable
//! [`ErrorCode`] in addition to a human-readable message, so that a verifier
//! and a gateway sitting in front of it agree on exactly what happened
//! without parsing prose. [`VerifyError`] is the concrete error type
//! returned by the schema, transport, crypto, JWKS, replay, and policy
//! layers; [`VerifyError::code`] and [`VerifyError::http_status`] are what
//! the gateway (C10) uses to build a problem-details response.

use thiserror::Error;

/// Stable, machine-readable error code.
///
/// Serializes as the exact `E_*` token named in the specification so it can
/// be compared byte-for-byte against another implementation's conformance
/// fixtures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(clippy::enum_variant_names)]
pub enum ErrorCode {
    /// Transport carrier was structurally invalid (bad header, malformed
    /// pointer, empty body array).
    InvalidTransport,
    /// The JWS did not have three non-empty base64url segments.
    InvalidJwsFormat,
    /// Pointer-fetched body did not hash to the declared digest.
    PointerDigestMismatch,
    /// Signature verification failed.
    SignatureInvalid,
    /// No key matching `(issuer, kid)` could be resolved.
    KeyNotFound,
    /// `iat`/`exp` failed the time-bound check.
    TimeInvalid,
    /// A nonce was required but absent.
    ReplayProtectionRequired,
    /// No receipt was presented at all.
    ReceiptMissing,
    /// A receipt was presented but payment is still required by policy.
    PaymentRequired,
    /// `iss` is not present in the issuer allowlist.
    IssuerNotAllowed,
    /// A fetch target resolved to a disallowed (private/loopback/metadata)
    /// address.
    SsrfBlocked,
    /// The same `(issuer, kid, nonce)` triple was already observed.
    NonceReplay,
    /// Request or header exceeded the configured size limit.
    RequestTooLarge,
    /// The receipt's `exp` has passed.
    ExpiredReceipt,
    /// The receipt's `iat` is in the future beyond allowed clock skew.
    FutureIat,
    /// Strict claim-schema validation failed.
    SchemaValidationFailed,
    /// A claim outside the strict schema was present.
    UnknownClaim,
    /// A required claim was missing.
    MissingClaim,
    /// `purpose_enforced`/`purpose_declared` did not satisfy the expected
    /// purpose.
    PurposeInvalid,
    /// Recomputed policy hash did not match the receipt's `policy_hash`.
    PolicyHashMismatch,
    /// The verifier was misconfigured (e.g. replay store required but
    /// absent).
    MisconfiguredVerifier,
    /// Caller exceeded the sliding-window rate limit.
    RateLimited,
    /// JWKS fetch failed or timed out upstream.
    UpstreamUnavailable,
    /// An I/O deadline elapsed before the operation completed.
    Timeout,
    /// JWKS response body exceeded the 1 MiB limit.
    JwksTooLarge,
    /// JWKS `keys[]` exceeded the 100-entry limit.
    JwksTooManyKeys,
}

impl ErrorCode {
    /// The wire-stable `E_*` token for this code.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InvalidTransport => "E_INVALID_TRANSPORT",
            Self::InvalidJwsFormat => "E_INVALID_JWS_FORMAT",
            Self::PointerDigestMismatch => "E_POINTER_DIGEST_MISMATCH",
            Self::SignatureInvalid => "E_SIGNATURE_INVALID",
            Self::KeyNotFound => "E_KEY_NOT_FOUND",
            Self::TimeInvalid => "E_TIME_INVALID",
            Self::ReplayProtectionRequired => "E_REPLAY_PROTECTION_REQUIRED",
            Self::ReceiptMissing => "E_RECEIPT_MISSING",
            Self::PaymentRequired => "E_PAYMENT_REQUIRED",
            Self::IssuerNotAllowed => "E_ISSUER_NOT_ALLOWED",
            Self::SsrfBlocked => "E_SSRF_BLOCKED",
            Self::NonceReplay => "E_NONCE_REPLAY",
            Self::RequestTooLarge => "E_REQUEST_TOO_LARGE",
            Self::ExpiredReceipt => "E_EXPIRED_RECEIPT",
            Self::FutureIat => "E_FUTURE_IAT",
            Self::SchemaValidationFailed => "E_SCHEMA_VALIDATION_FAILED",
            Self::UnknownClaim => "E_UNKNOWN_CLAIM",
            Self::MissingClaim => "E_MISSING_CLAIM",
            Self::PurposeInvalid => "E_PURPOSE_INVALID",
            Self::PolicyHashMismatch => "E_POLICY_HASH_MISMATCH",
            Self::MisconfiguredVerifier => "E_MISCONFIGURED_VERIFIER",
            Self::RateLimited => "E_RATE_LIMITED",
            Self::UpstreamUnavailable => "E_UPSTREAM_UNAVAILABLE",
            Self::Timeout => "E_TIMEOUT",
            Self::JwksTooLarge => "E_JWKS_TOO_LARGE",
            Self::JwksTooManyKeys => "E_JWKS_TOO_MANY_KEYS",
        }
    }

    /// The HTTP status a gateway should answer with for this code, per the
    /// status-mapping table.
    #[must_use]
    pub const fn http_status(self) -> u16 {
        match self {
            Self::InvalidTransport | Self::InvalidJwsFormat | Self::PointerDigestMismatch => 400,
            Self::SignatureInvalid
            | Self::KeyNotFound
            | Self::TimeInvalid
            | Self::ReplayProtectionRequired => 401,
            Self::ReceiptMissing | Self::PaymentRequired => 402,
            Self::IssuerNotAllowed | Self::SsrfBlocked => 403,
            Self::NonceReplay => 409,
            Self::RequestTooLarge => 413,
            Self::ExpiredReceipt
            | Self::FutureIat
            | Self::SchemaValidationFailed
            | Self::PolicyHashMismatch
            | Self::MisconfiguredVerifier
            | Self::UnknownClaim
            | Self::MissingClaim
            | Self::PurposeInvalid => 422,
            Self::RateLimited => 429,
            Self::UpstreamUnavailable => 502,
            Self::Timeout | Self::JwksTooLarge | Self::JwksTooManyKeys => 504,
        }
    }

    /// Whether a caller may retry the operation that produced this code
    /// without changing anything (transient upstream conditions only).
    #[must_use]
    pub const fn retriable(self) -> bool {
        matches!(self, Self::UpstreamUnavailable | Self::Timeout | Self::RateLimited)
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A verification or issuance failure, carrying a stable [`ErrorCode`].
#[derive(Error, Debug, Clone)]
pub enum VerifyError {
    /// See [`ErrorCode::InvalidTransport`].
    #[error("invalid transport: {0}")]
    InvalidTransport(String),
    /// See [`ErrorCode::InvalidJwsFormat`].
    #[error("invalid JWS format: {0}")]
    InvalidJwsFormat(String),
    /// See [`ErrorCode::PointerDigestMismatch`].
    #[error("pointer digest mismatch")]
    PointerDigestMismatch,
    /// See [`ErrorCode::SignatureInvalid`].
    #[error("signature invalid")]
    SignatureInvalid,
    /// See [`ErrorCode::KeyNotFound`].
    #[error("key not found: issuer={issuer} kid={kid}")]
    KeyNotFound {
        /// Issuer origin the key was requested for.
        issuer: String,
        /// Key id the issuer's JWKS did not contain.
        kid: String,
    },
    /// See [`ErrorCode::TimeInvalid`].
    #[error("time invalid: {0}")]
    TimeInvalid(String),
    /// See [`ErrorCode::ReplayProtectionRequired`].
    #[error("replay protection required but no nonce present")]
    ReplayProtectionRequired,
    /// See [`ErrorCode::ReceiptMissing`].
    #[error("no receipt presented")]
    ReceiptMissing,
    /// See [`ErrorCode::PaymentRequired`].
    #[error("payment required")]
    PaymentRequired,
    /// See [`ErrorCode::IssuerNotAllowed`].
    #[error("issuer not allowed: {0}")]
    IssuerNotAllowed(String),
    /// See [`ErrorCode::SsrfBlocked`].
    #[error("blocked possible SSRF target: {0}")]
    SsrfBlocked(String),
    /// See [`ErrorCode::NonceReplay`].
    #[error("nonce already seen")]
    NonceReplay,
    /// See [`ErrorCode::RequestTooLarge`].
    #[error("request too large: {0}")]
    RequestTooLarge(String),
    /// See [`ErrorCode::ExpiredReceipt`].
    #[error("receipt expired")]
    ExpiredReceipt,
    /// See [`ErrorCode::FutureIat`].
    #[error("receipt `iat` is in the future")]
    FutureIat,
    /// See [`ErrorCode::SchemaValidationFailed`].
    #[error("schema validation failed: {0}")]
    SchemaValidationFailed(String),
    /// See [`ErrorCode::UnknownClaim`].
    #[error("unknown claim: {0}")]
    UnknownClaim(String),
    /// See [`ErrorCode::MissingClaim`].
    #[error("missing claim: {0}")]
    MissingClaim(String),
    /// See [`ErrorCode::PurposeInvalid`].
    #[error("purpose invalid")]
    PurposeInvalid,
    /// See [`ErrorCode::PolicyHashMismatch`].
    #[error("policy hash mismatch")]
    PolicyHashMismatch,
    /// See [`ErrorCode::MisconfiguredVerifier`].
    #[error("verifier misconfigured: {0}")]
    MisconfiguredVerifier(String),
    /// See [`ErrorCode::RateLimited`].
    #[error("rate limited")]
    RateLimited,
    /// See [`ErrorCode::UpstreamUnavailable`].
    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),
    /// See [`ErrorCode::Timeout`].
    #[error("operation timed out")]
    Timeout,
    /// See [`ErrorCode::JwksTooLarge`].
    #[error("JWKS response too large")]
    JwksTooLarge,
    /// See [`ErrorCode::JwksTooManyKeys`].
    #[error("JWKS has too many keys")]
    JwksTooManyKeys,
}

impl VerifyError {
    /// The stable [`ErrorCode`] for this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidTransport(_) => ErrorCode::InvalidTransport,
            Self::InvalidJwsFormat(_) => ErrorCode::InvalidJwsFormat,
            Self::PointerDigestMismatch => ErrorCode::PointerDigestMismatch,
            Self::SignatureInvalid => ErrorCode::SignatureInvalid,
            Self::KeyNotFound { .. } => ErrorCode::KeyNotFound,
            Self::TimeInvalid(_) => ErrorCode::TimeInvalid,
            Self::ReplayProtectionRequired => ErrorCode::ReplayProtectionRequired,
            Self::ReceiptMissing => ErrorCode::ReceiptMissing,
            Self::PaymentRequired => ErrorCode::PaymentRequired,
            Self::IssuerNotAllowed(_) => ErrorCode::IssuerNotAllowed,
            Self::SsrfBlocked(_) => ErrorCode::SsrfBlocked,
            Self::NonceReplay => ErrorCode::NonceReplay,
            Self::RequestTooLarge(_) => ErrorCode::RequestTooLarge,
            Self::ExpiredReceipt => ErrorCode::ExpiredReceipt,
            Self::FutureIat => ErrorCode::FutureIat,
            Self::SchemaValidationFailed(_) => ErrorCode::SchemaValidationFailed,
            Self::UnknownClaim(_) => ErrorCode::UnknownClaim,
            Self::MissingClaim(_) => ErrorCode::MissingClaim,
            Self::PurposeInvalid => ErrorCode::PurposeInvalid,
            Self::PolicyHashMismatch => ErrorCode::PolicyHashMismatch,
            Self::MisconfiguredVerifier(_) => ErrorCode::MisconfiguredVerifier,
            Self::RateLimited => ErrorCode::RateLimited,
            Self::UpstreamUnavailable(_) => ErrorCode::UpstreamUnavailable,
            Self::Timeout => ErrorCode::Timeout,
            Self::JwksTooLarge => ErrorCode::JwksTooLarge,
            Self::JwksTooManyKeys => ErrorCode::JwksTooManyKeys,
        }
    }

    /// The HTTP status a gateway should answer with for this error.
    #[must_use]
    pub const fn http_status(&self) -> u16 {
        self.code().http_status()
    }

    /// Redact signature/key material from the message and return a
    /// `{ code, message }` pair suitable for crossing an API boundary.
    #[must_use]
    pub fn to_problem_fields(&self) -> (ErrorCode, String) {
        (self.code(), crate::redact::redact(&self.to_string()))
    }
}

/// Construct a [`VerifyError::SchemaValidationFailed`] from a format string.
#[macro_export]
macro_rules! schema_invalid {
    ($fmt:expr $(, $arg:expr)*) => {
        $crate::error::VerifyError::SchemaValidationFailed(format!($fmt $(, $arg)*))
    };
}
