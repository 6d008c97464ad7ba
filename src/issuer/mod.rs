//! # Receipt Issuer (C7)
//!
//! Turns a partial claim set into a signed, transport-ready receipt: fills
//! `iat`/`exp`/`rid`, optionally binds a [`PolicyFingerprint`], validates
//! against the strict schema, signs, and picks a wire carrier.

mod request;
mod uploader;

pub use request::IssueRequest;
pub use uploader::PointerUploader;

use std::time::Instant;

use crate::canon::{digest, jcs};
use crate::core::{normalize_origin, ExtValue};
use crate::crypto::{sign_compact, Ed25519KeyPair};
use crate::error::VerifyError;
use crate::receipt::claims::ReceiptClaims;
use crate::receipt::jws_envelope::{ReceiptHeader, DEFAULT_TTL_SECONDS, RECEIPT_MAX_TTL_SECONDS};
use crate::time::unix_now;
use crate::transport::{Profile, MAX_HEADER_BYTES};

/// How the issuer should carry the signed receipt on the wire.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TransportChoice {
    /// Header if the JWS fits within [`MAX_HEADER_BYTES`], pointer
    /// otherwise.
    #[default]
    Auto,
    /// Force the header carrier, even if it would exceed the size limit a
    /// gateway enforces on decode (the issuer does not itself enforce that
    /// limit — it only picks the carrier the caller asked for).
    Header,
    /// Force the pointer carrier: the JWS is uploaded via the configured
    /// [`PointerUploader`] and the returned URL/digest are surfaced to the
    /// caller to set as the `PEAC-Receipt-Pointer` header.
    Pointer,
    /// Force the in-body carrier: the caller wraps the returned JWS into
    /// `peac_receipt`/`peac_receipts` themselves.
    Body,
}

/// A freshly issued receipt: the signed compact JWS, the claims that went
/// into it, and which wire carrier the issuer picked.
#[derive(Clone, Debug)]
pub struct IssuedReceipt {
    /// The signed compact JWS.
    pub jws: String,
    /// The claim set that was signed, after normalization.
    pub claims: ReceiptClaims,
    /// Which carrier this receipt should be sent with.
    pub profile: Profile,
    /// Set only when `profile` is [`Profile::Pointer`]: the digest and URL
    /// the caller should render into `PEAC-Receipt-Pointer`.
    pub pointer: Option<crate::transport::PointerRef>,
}

/// Signs receipts on behalf of one issuer origin.
pub struct Issuer {
    key: Ed25519KeyPair,
    kid: String,
    iss: String,
    uploader: Option<std::sync::Arc<dyn PointerUploader>>,
}

impl Issuer {
    /// Construct an issuer signing under `iss` with `key`/`kid`. A pointer
    /// uploader is only required if receipts are ever issued with
    /// [`TransportChoice::Pointer`] or an auto-selected pointer carrier.
    ///
    /// # Errors
    ///
    /// Returns [`VerifyError::SchemaValidationFailed`] if `iss` does not
    /// normalize to a valid absolute origin.
    pub fn new(
        iss: &str, key: Ed25519KeyPair, kid: impl Into<String>,
        uploader: Option<std::sync::Arc<dyn PointerUploader>>,
    ) -> Result<Self, VerifyError> {
        Ok(Self { key, kid: kid.into(), iss: normalize_origin(iss)?, uploader })
    }

    /// Issue a receipt for `request`, carried per `transport`.
    ///
    /// # Errors
    ///
    /// Returns [`VerifyError::SchemaValidationFailed`] if `request` does not
    /// normalize to valid claims, any [`ReceiptClaims::validate`] failure,
    /// or [`VerifyError::MisconfiguredVerifier`] if a pointer carrier is
    /// required but no [`PointerUploader`] was configured.
    pub async fn issue(
        &self, request: IssueRequest, transport: TransportChoice,
    ) -> Result<IssuedReceipt, VerifyError> {
        let claims = self.build_claims(request)?;
        claims.validate()?;

        let header = ReceiptHeader::new(self.kid.clone());
        let header_json = jcs::canonicalize(&header)
            .map_err(|e| VerifyError::SchemaValidationFailed(format!("header: {e}")))?;
        let payload_json = jcs::canonicalize(&claims)
            .map_err(|e| VerifyError::SchemaValidationFailed(format!("claims: {e}")))?;

        let jws = sign_compact(&self.key, &header_json, &payload_json)
            .map_err(|e| VerifyError::SchemaValidationFailed(e.to_string()))?;

        let (profile, pointer) = self.select_transport(&jws, transport).await?;

        Ok(IssuedReceipt { jws, claims, profile, pointer })
    }

    fn build_claims(&self, request: IssueRequest) -> Result<ReceiptClaims, VerifyError> {
        let aud = normalize_origin(&request.aud)?;
        let iat = unix_now();
        let ttl = request.expires_in.unwrap_or(DEFAULT_TTL_SECONDS);
        if ttl <= 0 || ttl > RECEIPT_MAX_TTL_SECONDS {
            return Err(crate::schema_invalid!(
                "expires_in {ttl}s out of bounds (0, {RECEIPT_MAX_TTL_SECONDS}]"
            ));
        }
        let exp = iat + ttl;
        let rid = uuid::Uuid::now_v7().to_string();

        let policy_hash = match &request.policy_fingerprint {
            Some(fp) => Some(crate::policy::fingerprint_hash(fp)?),
            None => None,
        };

        Ok(ReceiptClaims {
            iss: self.iss.clone(),
            aud,
            iat,
            exp,
            rid,
            sub: request.sub,
            amt: request.amt,
            cur: request.cur,
            payment: request.payment,
            policy_hash,
            purpose_declared: request.purpose_declared,
            purpose_enforced: request.purpose_enforced,
            purpose_reason: request.purpose_reason,
            nonce: request.nonce,
            ext: request.ext,
        })
    }

    async fn select_transport(
        &self, jws: &str, transport: TransportChoice,
    ) -> Result<(Profile, Option<crate::transport::PointerRef>), VerifyError> {
        let resolved = match transport {
            TransportChoice::Auto if jws.len() <= MAX_HEADER_BYTES => TransportChoice::Header,
            TransportChoice::Auto => TransportChoice::Pointer,
            other => other,
        };

        match resolved {
            TransportChoice::Auto => unreachable!("resolved above to Header or Pointer"),
            TransportChoice::Header => Ok((Profile::Header, None)),
            TransportChoice::Body => Ok((Profile::Body, None)),
            TransportChoice::Pointer => {
                let uploader = self.uploader.as_ref().ok_or_else(|| {
                    VerifyError::MisconfiguredVerifier("pointer transport requested but no uploader configured".into())
                })?;
                let start = Instant::now();
                let url = uploader.upload(jws).await?;
                tracing::debug!(elapsed_ms = start.elapsed().as_millis(), "uploaded receipt for pointer carrier");
                let sha256 = digest::sha256_hex(jws.as_bytes());
                Ok((Profile::Pointer, Some(crate::transport::PointerRef { sha256, url: url.to_string(), ext: Default::default() })))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn issuer() -> Issuer {
        Issuer::new("https://issuer.example", Ed25519KeyPair::generate(), "k1", None).unwrap()
    }

    fn request() -> IssueRequest {
        IssueRequest {
            aud: "https://aud.example".into(),
            sub: None,
            amt: None,
            cur: None,
            payment: None,
            purpose_declared: Default::default(),
            purpose_enforced: None,
            purpose_reason: None,
            nonce: Some("n-1".into()),
            ext: HashMap::new(),
            expires_in: None,
            policy_fingerprint: None,
        }
    }

    #[tokio::test]
    async fn issues_a_header_carried_receipt_by_default() {
        let receipt = issuer().issue(request(), TransportChoice::Auto).await.unwrap();
        assert_eq!(receipt.profile, Profile::Header);
        assert!(receipt.pointer.is_none());
        assert_eq!(receipt.claims.iss, "https://issuer.example");
        assert_eq!(receipt.claims.exp - receipt.claims.iat, DEFAULT_TTL_SECONDS);
    }

    #[tokio::test]
    async fn rejects_expires_in_beyond_max_ttl() {
        let mut req = request();
        req.expires_in = Some(RECEIPT_MAX_TTL_SECONDS + 1);
        let err = issuer().issue(req, TransportChoice::Auto).await.unwrap_err();
        assert!(matches!(err, VerifyError::SchemaValidationFailed(_)));
    }

    #[tokio::test]
    async fn forced_pointer_transport_without_uploader_is_rejected() {
        let err = issuer().issue(request(), TransportChoice::Pointer).await.unwrap_err();
        assert!(matches!(err, VerifyError::MisconfiguredVerifier(_)));
    }

    #[tokio::test]
    async fn issued_jws_round_trips_through_verification() {
        let i = issuer();
        let receipt = i.issue(request(), TransportChoice::Auto).await.unwrap();
        let parsed = crate::crypto::CompactJws::parse(&receipt.jws).unwrap();
        assert_eq!(parsed.kid, "k1");
        assert_eq!(parsed.alg, "EdDSA");
    }

    #[test]
    fn ext_value_is_reachable_from_issue_request() {
        let mut ext = HashMap::new();
        ext.insert("org.peacprotocol/interaction@0.1".to_string(), ExtValue::String("human-click".into()));
        let mut req = request();
        req.ext = ext;
        assert_eq!(req.ext.len(), 1);
    }
}
