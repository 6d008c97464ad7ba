//! The partial claim set a caller hands to [`super::Issuer::issue`].

use std::collections::{HashMap, HashSet};

use crate::core::ExtValue;
use crate::policy::PolicyFingerprint;
use crate::receipt::claims::PaymentClaim;

/// Everything the issuer needs beyond what it fills in itself
/// (`iss`/`iat`/`exp`/`rid`).
#[derive(Clone, Debug, Default)]
pub struct IssueRequest {
    /// Audience origin the receipt is scoped to.
    pub aud: String,
    /// Optional subject (agent or user URI).
    pub sub: Option<String>,
    /// Amount, required iff `payment` is set.
    pub amt: Option<String>,
    /// Currency, required iff `payment` is set.
    pub cur: Option<String>,
    /// Payment-rail evidence envelope.
    pub payment: Option<PaymentClaim>,
    /// Purposes declared for this receipt.
    pub purpose_declared: HashSet<String>,
    /// The single purpose actually enforced.
    pub purpose_enforced: Option<String>,
    /// Free-text rationale for `purpose_enforced`.
    pub purpose_reason: Option<String>,
    /// Replay-detection nonce. Callers that need replay protection must
    /// supply one; the issuer does not generate nonces itself since their
    /// entropy/uniqueness domain is a caller concern (per-session, per
    /// request, …).
    pub nonce: Option<String>,
    /// Versioned extension payloads.
    pub ext: HashMap<String, ExtValue>,
    /// Receipt lifetime in seconds. Defaults to
    /// [`crate::receipt::jws_envelope::DEFAULT_TTL_SECONDS`] and must not
    /// exceed [`crate::receipt::jws_envelope::RECEIPT_MAX_TTL_SECONDS`].
    pub expires_in: Option<i64>,
    /// The policy set this receipt should bind to, if any.
    pub policy_fingerprint: Option<PolicyFingerprint>,
}
