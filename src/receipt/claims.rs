//! Typed receipt claim set and strict schema validation.

use std::collections::{HashMap, HashSet};

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

use crate::core::ExtValue;
use crate::error::VerifyError;
use crate::receipt::jws_envelope::RECEIPT_MAX_TTL_SECONDS;
use crate::receipt::purpose;

/// Rail-scoped payment evidence attached to a receipt.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct PaymentClaim {
    /// Payment rail identifier (e.g. `"x402"`, `"l402"`, `"stripe"`).
    pub rail: String,
    /// Rail-specific reference for this payment (invoice id, tx hash, …).
    pub reference: String,
    /// Amount, if the rail reports one independently of the receipt-level
    /// `amt`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<String>,
    /// Currency, if the rail reports one independently of the receipt-level
    /// `cur`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    /// Rail-reported settlement status (e.g. `"settled"`, `"pending"`).
    pub status: String,
    /// Opaque, rail-scoped evidence map (webhook payload fields, on-chain
    /// references, …).
    #[serde(default)]
    pub evidence: HashMap<String, serde_json::Value>,
}

/// The signed claim set carried by a PEAC receipt (`spec.md` §3).
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ReceiptClaims {
    /// Issuer origin.
    pub iss: String,
    /// Audience origin.
    pub aud: String,
    /// Issued-at, Unix seconds.
    pub iat: i64,
    /// Expiry, Unix seconds.
    pub exp: i64,
    /// Receipt id (time-ordered, unique per issuer).
    pub rid: String,
    /// Optional subject (agent or user URI).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    /// Amount (decimal string). Present iff `payment` is.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amt: Option<String>,
    /// ISO 4217 currency code. Present iff `payment` is.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cur: Option<String>,
    /// Payment-rail evidence envelope.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment: Option<PaymentClaim>,
    /// Canonical hash binding this receipt to a policy set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy_hash: Option<String>,
    /// Purposes the issuer declares this receipt was granted for.
    #[serde(default, skip_serializing_if = "HashSet::is_empty")]
    pub purpose_declared: HashSet<String>,
    /// The single purpose actually enforced for this access.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purpose_enforced: Option<String>,
    /// Free-text rationale for `purpose_enforced`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purpose_reason: Option<String>,
    /// Replay-detection nonce.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
    /// Versioned extension payloads, keyed by `org.example/name@version`.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub ext: HashMap<String, ExtValue>,
}

static EXT_KEY_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9.-]+/[a-zA-Z0-9_-]+@[0-9]+\.[0-9]+$").unwrap());

impl ReceiptClaims {
    /// Parse and strictly validate a claim set from JCS-canonicalized (or
    /// any equivalent) JSON bytes, rejecting unknown top-level claims.
    ///
    /// # Errors
    ///
    /// Returns [`VerifyError::SchemaValidationFailed`] if the bytes are not
    /// valid JSON or contain a field this schema does not recognize
    /// (`serde`'s `deny_unknown_fields` surfaces as a parse error, which we
    /// fold into [`VerifyError::UnknownClaim`] when the message names an
    /// unexpected field), or any of the invariant violations described by
    /// [`ReceiptClaims::validate`].
    pub fn from_strict_json(bytes: &[u8]) -> Result<Self, VerifyError> {
        let claims: Self = serde_json::from_slice(bytes).map_err(|e| {
            let msg = e.to_string();
            if msg.contains("unknown field") {
                VerifyError::UnknownClaim(msg)
            } else if msg.contains("missing field") {
                VerifyError::MissingClaim(msg)
            } else {
                VerifyError::SchemaValidationFailed(msg)
            }
        })?;
        claims.validate()?;
        Ok(claims)
    }

    /// Validate the structural invariants from `spec.md` §3: `exp > iat`,
    /// TTL bound, `amt`/`cur` present iff `payment` is, and extension keys
    /// match the versioned `name@version` shape.
    ///
    /// # Errors
    ///
    /// Returns [`VerifyError::SchemaValidationFailed`] on the first
    /// violated invariant.
    pub fn validate(&self) -> Result<(), VerifyError> {
        if self.exp <= self.iat {
            return Err(crate::schema_invalid!("`exp` ({}) must be greater than `iat` ({})", self.exp, self.iat));
        }
        if self.exp - self.iat > RECEIPT_MAX_TTL_SECONDS {
            return Err(crate::schema_invalid!(
                "receipt TTL {}s exceeds maximum {}s",
                self.exp - self.iat,
                RECEIPT_MAX_TTL_SECONDS
            ));
        }
        if self.payment.is_none() && (self.amt.is_some() || self.cur.is_some()) {
            return Err(crate::schema_invalid!("`amt`/`cur` present without `payment`"));
        }
        if self.payment.is_some() && (self.amt.is_none() || self.cur.is_none()) {
            return Err(crate::schema_invalid!("`payment` present without `amt`/`cur`"));
        }
        for key in self.ext.keys() {
            if !EXT_KEY_PATTERN.is_match(key) {
                return Err(crate::schema_invalid!(
                    "extension key `{key}` is not versioned as `name/ext@major.minor`"
                ));
            }
        }
        if let Some(enforced) = &self.purpose_enforced {
            if !purpose::is_registered(enforced) {
                return Err(VerifyError::PurposeInvalid);
            }
        }
        for declared in &self.purpose_declared {
            if !purpose::is_registered(declared) {
                return Err(VerifyError::PurposeInvalid);
            }
        }
        Ok(())
    }

    /// Check `iat`/`exp` against `now`, allowing up to `max_clock_skew`
    /// seconds of future `iat`.
    ///
    /// # Errors
    ///
    /// Returns [`VerifyError::FutureIat`] if `iat > now + max_clock_skew`,
    /// or [`VerifyError::ExpiredReceipt`] if `now > exp`.
    pub fn check_time_bounds(&self, now: i64, max_clock_skew: i64) -> Result<(), VerifyError> {
        if self.iat > now + max_clock_skew {
            return Err(VerifyError::FutureIat);
        }
        if now > self.exp {
            return Err(VerifyError::ExpiredReceipt);
        }
        Ok(())
    }

    /// Whether `purpose` is satisfied by this claim set: either it equals
    /// `purpose_enforced`, or it is a member of `purpose_declared`.
    #[must_use]
    pub fn satisfies_purpose(&self, purpose: &str) -> bool {
        self.purpose_enforced.as_deref() == Some(purpose) || self.purpose_declared.contains(purpose)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_claims() -> ReceiptClaims {
        ReceiptClaims {
            iss: "https://p.example".into(),
            aud: "https://a.example".into(),
            iat: 1_700_000_000,
            exp: 1_700_000_300,
            rid: "01H000000000000000000000".into(),
            sub: None,
            amt: None,
            cur: None,
            payment: None,
            policy_hash: None,
            purpose_declared: HashSet::new(),
            purpose_enforced: None,
            purpose_reason: None,
            nonce: None,
            ext: HashMap::new(),
        }
    }

    #[test]
    fn rejects_exp_before_iat() {
        let mut c = base_claims();
        c.exp = c.iat - 1;
        assert!(matches!(c.validate(), Err(VerifyError::SchemaValidationFailed(_))));
    }

    #[test]
    fn rejects_ttl_over_24h() {
        let mut c = base_claims();
        c.exp = c.iat + RECEIPT_MAX_TTL_SECONDS + 1;
        assert!(c.validate().is_err());
    }

    #[test]
    fn rejects_amt_without_payment() {
        let mut c = base_claims();
        c.amt = Some("100".into());
        assert!(c.validate().is_err());
    }

    #[test]
    fn rejects_payment_without_amt() {
        let mut c = base_claims();
        c.payment = Some(PaymentClaim {
            rail: "x402".into(),
            reference: "ref-1".into(),
            amount: None,
            currency: None,
            status: "settled".into(),
            evidence: HashMap::new(),
        });
        assert!(c.validate().is_err());
    }

    #[test]
    fn accepts_matched_payment_and_amount() {
        let mut c = base_claims();
        c.amt = Some("100".into());
        c.cur = Some("USD".into());
        c.payment = Some(PaymentClaim {
            rail: "x402".into(),
            reference: "ref-1".into(),
            amount: None,
            currency: None,
            status: "settled".into(),
            evidence: HashMap::new(),
        });
        assert!(c.validate().is_ok());
    }

    #[test]
    fn rejects_unversioned_extension_key() {
        let mut c = base_claims();
        c.ext.insert("interaction".into(), ExtValue::String("x".into()));
        assert!(c.validate().is_err());
    }

    #[test]
    fn accepts_versioned_extension_key() {
        let mut c = base_claims();
        c.ext.insert(
            "org.peacprotocol/interaction@0.1".into(),
            ExtValue::String("human-click".into()),
        );
        assert!(c.validate().is_ok());
    }

    #[test]
    fn time_bounds_reject_future_iat() {
        let c = base_claims();
        assert!(matches!(c.check_time_bounds(c.iat - 100, 10), Err(VerifyError::FutureIat)));
    }

    #[test]
    fn time_bounds_reject_expired() {
        let c = base_claims();
        assert!(matches!(c.check_time_bounds(c.exp + 1, 10), Err(VerifyError::ExpiredReceipt)));
    }

    #[test]
    fn time_bounds_accept_within_window() {
        let c = base_claims();
        assert!(c.check_time_bounds(c.iat + 100, 10).is_ok());
    }

    #[test]
    fn unknown_top_level_claim_is_rejected() {
        let json = br#"{"iss":"https://p.example","aud":"https://a.example","iat":1,"exp":2,"rid":"r","bogus":true}"#;
        let err = ReceiptClaims::from_strict_json(json).unwrap_err();
        assert!(matches!(err, VerifyError::UnknownClaim(_)));
    }

    #[test]
    fn missing_required_claim_is_rejected() {
        let json = br#"{"iss":"https://p.example","aud":"https://a.example","iat":1,"exp":2}"#;
        let err = ReceiptClaims::from_strict_json(json).unwrap_err();
        assert!(matches!(err, VerifyError::MissingClaim(_)));
    }

    #[test]
    fn purpose_enforced_must_be_registered() {
        let mut c = base_claims();
        c.purpose_enforced = Some("not-a-real-purpose".into());
        assert!(matches!(c.validate(), Err(VerifyError::PurposeInvalid)));
    }

    #[test]
    fn satisfies_purpose_checks_enforced_and_declared() {
        let mut c = base_claims();
        c.purpose_enforced = Some("ai-training".into());
        c.purpose_declared = ["rag-indexing".into()].into_iter().collect();
        assert!(c.satisfies_purpose("ai-training"));
        assert!(c.satisfies_purpose("rag-indexing"));
        assert!(!c.satisfies_purpose("summarization"));
    }
}
