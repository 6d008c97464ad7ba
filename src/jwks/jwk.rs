//! Wire shape of a JWK/JWKS document, and conversion into
//! [`SignatureVerifier`]s.

use serde::{Deserialize, Serialize};

use crate::crypto::{CryptoError, SignatureVerifier};

/// A single JSON Web Key, restricted to the OKP/Ed25519 shape this core
/// supports.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Jwk {
    /// Key type; MUST be `"OKP"`.
    pub kty: String,
    /// Curve; MUST be `"Ed25519"`.
    pub crv: String,
    /// Base64url-encoded 32-byte public key.
    pub x: String,
    /// Key id.
    pub kid: String,
    /// Intended use, typically `"sig"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_use: Option<String>,
}

/// A JSON Web Key Set document.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct JwkSet {
    /// The keys in this set.
    pub keys: Vec<Jwk>,
}

impl Jwk {
    /// Convert this JWK into a [`SignatureVerifier`].
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::UnsupportedAlgorithm`] if `kty`/`crv` are not
    /// `OKP`/`Ed25519`, or a decode error if `x` is malformed.
    pub fn to_verifier(&self) -> Result<SignatureVerifier, CryptoError> {
        if self.kty != "OKP" || self.crv != "Ed25519" {
            return Err(CryptoError::UnsupportedAlgorithm(format!("{}/{}", self.kty, self.crv)));
        }
        let bytes = crate::canon::base64url::decode(&self.x)
            .map_err(|e| CryptoError::MalformedKey(format!("x: {e}")))?;
        SignatureVerifier::new(self.kid.clone(), &bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::Ed25519KeyPair;

    #[test]
    fn converts_valid_okp_jwk() {
        let key = Ed25519KeyPair::generate();
        let jwk = Jwk {
            kty: "OKP".into(),
            crv: "Ed25519".into(),
            x: crate::canon::base64url::encode(&key.public_bytes()),
            kid: "k1".into(),
            key_use: Some("sig".into()),
        };
        let verifier = jwk.to_verifier().unwrap();
        assert_eq!(verifier.kid, "k1");
        assert_eq!(verifier.public_key, key.public_bytes());
    }

    #[test]
    fn rejects_non_okp_kty() {
        let jwk = Jwk { kty: "RSA".into(), crv: "Ed25519".into(), x: "AA".into(), kid: "k1".into(), key_use: None };
        assert!(jwk.to_verifier().is_err());
    }

    #[test]
    fn parses_jwks_document() {
        let doc = r#"{"keys":[{"kty":"OKP","crv":"Ed25519","x":"AAAA","kid":"k1"}]}"#;
        let set: JwkSet = serde_json::from_str(doc).unwrap();
        assert_eq!(set.keys.len(), 1);
    }
}
