//! Binds a verifier's expected policy set to a receipt's `policy_hash`.

use crate::error::VerifyError;
use crate::policy::{fingerprint_hash, PolicyFingerprint};
use crate::receipt::ReceiptClaims;

/// A policy fingerprint a receipt's `policy_hash` claim is expected to
/// match.
pub struct PolicyBinding {
    expected_hash: String,
}

impl PolicyBinding {
    /// Precompute the expected hash from `fingerprint`.
    ///
    /// # Errors
    ///
    /// Propagates [`fingerprint_hash`]'s errors.
    pub fn new(fingerprint: &PolicyFingerprint) -> Result<Self, VerifyError> {
        Ok(Self { expected_hash: fingerprint_hash(fingerprint)? })
    }

    /// Verify `claims.policy_hash` matches this binding's expected hash.
    ///
    /// # Errors
    ///
    /// Returns [`VerifyError::PolicyHashMismatch`] if `claims.policy_hash`
    /// is absent or does not match.
    pub fn check(&self, claims: &ReceiptClaims) -> Result<(), VerifyError> {
        match &claims.policy_hash {
            Some(hash) if hash == &self.expected_hash => Ok(()),
            _ => Err(VerifyError::PolicyHashMismatch),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::descriptor::{DescriptorKind, PolicyDescriptor};
    use std::collections::HashMap;

    fn fingerprint() -> PolicyFingerprint {
        PolicyFingerprint::new(vec![PolicyDescriptor {
            kind: DescriptorKind::PeacTxt,
            url: "https://p.example/peac.txt".to_string(),
            etag: None,
            body: None,
        }])
    }

    fn claims() -> ReceiptClaims {
        ReceiptClaims {
            iss: "https://issuer.example".into(),
            aud: "https://aud.example".into(),
            iat: 1_700_000_000,
            exp: 1_700_000_300,
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

    #[test]
    fn matching_hash_passes() {
        let fp = fingerprint();
        let binding = PolicyBinding::new(&fp).unwrap();
        let mut c = claims();
        c.policy_hash = Some(fingerprint_hash(&fp).unwrap());
        assert!(binding.check(&c).is_ok());
    }

    #[test]
    fn missing_hash_fails() {
        let fp = fingerprint();
        let binding = PolicyBinding::new(&fp).unwrap();
        assert!(binding.check(&claims()).is_err());
    }

    #[test]
    fn mismatched_hash_fails() {
        let fp = fingerprint();
        let binding = PolicyBinding::new(&fp).unwrap();
        let mut c = claims();
        c.policy_hash = Some("wrong".to_string());
        assert!(binding.check(&c).is_err());
    }
}
