//! RFC 9457 problem+json bodies, carrying the stable `code` extension.

use serde::Serialize;

use crate::error::{ErrorCode, VerifyError};

/// The `type` URI root every problem-details response is rooted at.
pub const PROBLEM_TYPE_BASE: &str = "https://www.peacprotocol.org/problems/";

/// An RFC 9457 problem-details body.
#[derive(Clone, Debug, Serialize)]
pub struct ProblemDetails {
    /// `https://www.peacprotocol.org/problems/<slug>`.
    #[serde(rename = "type")]
    pub type_uri: String,
    /// Short, human-readable summary.
    pub title: String,
    /// HTTP status this problem maps to.
    pub status: u16,
    /// Redacted human-readable detail.
    pub detail: String,
    /// The stable machine-readable error code (extension member).
    pub code: String,
    /// Seconds the caller should wait before retrying, when rate limited.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_s: Option<u32>,
}

impl ProblemDetails {
    /// Build a problem-details body for `code`, with `detail` already
    /// redacted.
    #[must_use]
    pub fn from_code(code: ErrorCode, detail: &str) -> Self {
        Self {
            type_uri: format!("{PROBLEM_TYPE_BASE}{}", slug(code)),
            title: title(code).to_string(),
            status: code.http_status(),
            detail: crate::redact::redact(detail),
            code: code.as_str().to_string(),
            retry_after_s: None,
        }
    }

    /// Build a problem-details body from a [`VerifyError`], redacting its
    /// message.
    #[must_use]
    pub fn from_error(err: &VerifyError) -> Self {
        let (code, detail) = err.to_problem_fields();
        Self::from_code(code, &detail)
    }

    /// Build the 429 rate-limited problem-details body.
    #[must_use]
    pub fn rate_limited(retry_after_s: u32, _reset_s: u32) -> Self {
        let mut problem = Self::from_code(ErrorCode::RateLimited, "too many requests");
        problem.retry_after_s = Some(retry_after_s);
        problem
    }
}

fn slug(code: ErrorCode) -> &'static str {
    match code {
        ErrorCode::InvalidTransport => "invalid-transport",
        ErrorCode::InvalidJwsFormat => "invalid-jws-format",
        ErrorCode::PointerDigestMismatch => "pointer-digest-mismatch",
        ErrorCode::SignatureInvalid => "signature-invalid",
        ErrorCode::KeyNotFound => "key-not-found",
        ErrorCode::TimeInvalid => "time-invalid",
        ErrorCode::ReplayProtectionRequired => "replay-protection-required",
        ErrorCode::ReceiptMissing => "receipt-missing",
        ErrorCode::PaymentRequired => "payment-required",
        ErrorCode::IssuerNotAllowed => "issuer-not-allowed",
        ErrorCode::SsrfBlocked => "ssrf-blocked",
        ErrorCode::NonceReplay => "nonce-replay",
        ErrorCode::RequestTooLarge => "request-too-large",
        ErrorCode::ExpiredReceipt => "expired-receipt",
        ErrorCode::FutureIat => "future-iat",
        ErrorCode::SchemaValidationFailed => "schema-validation-failed",
        ErrorCode::UnknownClaim => "unknown-claim",
        ErrorCode::MissingClaim => "missing-claim",
        ErrorCode::PurposeInvalid => "purpose-invalid",
        ErrorCode::PolicyHashMismatch => "policy-hash-mismatch",
        ErrorCode::MisconfiguredVerifier => "misconfigured-verifier",
        ErrorCode::RateLimited => "rate-limited",
        ErrorCode::UpstreamUnavailable => "upstream-unavailable",
        ErrorCode::Timeout => "timeout",
        ErrorCode::JwksTooLarge => "jwks-too-large",
        ErrorCode::JwksTooManyKeys => "jwks-too-many-keys",
    }
}

fn title(code: ErrorCode) -> &'static str {
    match code {
        ErrorCode::InvalidTransport => "Invalid transport carrier",
        ErrorCode::InvalidJwsFormat => "Invalid JWS format",
        ErrorCode::PointerDigestMismatch => "Pointer digest mismatch",
        ErrorCode::SignatureInvalid => "Signature invalid",
        ErrorCode::KeyNotFound => "Key not found",
        ErrorCode::TimeInvalid => "Time invalid",
        ErrorCode::ReplayProtectionRequired => "Replay protection required",
        ErrorCode::ReceiptMissing => "Receipt missing",
        ErrorCode::PaymentRequired => "Payment required",
        ErrorCode::IssuerNotAllowed => "Issuer not allowed",
        ErrorCode::SsrfBlocked => "Blocked possible SSRF target",
        ErrorCode::NonceReplay => "Nonce already seen",
        ErrorCode::RequestTooLarge => "Request too large",
        ErrorCode::ExpiredReceipt => "Receipt expired",
        ErrorCode::FutureIat => "Receipt issued in the future",
        ErrorCode::SchemaValidationFailed => "Schema validation failed",
        ErrorCode::UnknownClaim => "Unknown claim",
        ErrorCode::MissingClaim => "Missing claim",
        ErrorCode::PurposeInvalid => "Purpose invalid",
        ErrorCode::PolicyHashMismatch => "Policy hash mismatch",
        ErrorCode::MisconfiguredVerifier => "Verifier misconfigured",
        ErrorCode::RateLimited => "Rate limited",
        ErrorCode::UpstreamUnavailable => "Upstream unavailable",
        ErrorCode::Timeout => "Operation timed out",
        ErrorCode::JwksTooLarge => "JWKS response too large",
        ErrorCode::JwksTooManyKeys => "JWKS has too many keys",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn carries_stable_code_and_status() {
        let problem = ProblemDetails::from_code(ErrorCode::NonceReplay, "duplicate nonce");
        assert_eq!(problem.code, "E_NONCE_REPLAY");
        assert_eq!(problem.status, 409);
        assert_eq!(problem.type_uri, "https://www.peacprotocol.org/problems/nonce-replay");
    }

    #[test]
    fn rate_limited_carries_retry_after() {
        let problem = ProblemDetails::rate_limited(30, 60);
        assert_eq!(problem.retry_after_s, Some(30));
        assert_eq!(problem.status, 429);
    }
}
