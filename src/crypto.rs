//! # Crypto (C2)
//!
//! Ed25519 signing and verification only — `alg=EdDSA`, `crv=Ed25519`,
//! `kty=OKP`. No JWKS fetch happens in this module; it operates purely on
//! key material handed to it by the caller.

use ed25519_dalek::{Signature, Signer as _, SigningKey, Verifier as _, VerifyingKey};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::canon::base64url;

/// Errors from signing or verifying with Ed25519 key material.
#[derive(Error, Debug)]
pub enum CryptoError {
    /// Key material was the wrong length for Ed25519 (32 bytes).
    #[error("invalid key length: expected 32 bytes, got {0}")]
    InvalidKeyLength(usize),
    /// The JOSE `alg` header was not `EdDSA`.
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),
    /// The signature did not verify against the claimed payload and key.
    #[error("signature verification failed")]
    InvalidSignature,
    /// Key bytes were not a valid Ed25519 point/scalar.
    #[error("malformed key material: {0}")]
    MalformedKey(String),
}

/// An Ed25519 key pair used to sign receipts.
pub struct Ed25519KeyPair {
    signing_key: SigningKey,
}

impl Ed25519KeyPair {
    /// Generate a new random key pair.
    #[must_use]
    pub fn generate() -> Self {
        let mut csprng = rand::rngs::OsRng;
        Self { signing_key: SigningKey::generate(&mut csprng) }
    }

    /// Construct a key pair from a 32-byte seed (the Ed25519 private scalar
    /// seed, not a 64-byte expanded key).
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::InvalidKeyLength`] if `seed` is not 32 bytes.
    pub fn from_seed(seed: &[u8]) -> Result<Self, CryptoError> {
        let bytes: [u8; 32] =
            seed.try_into().map_err(|_| CryptoError::InvalidKeyLength(seed.len()))?;
        Ok(Self { signing_key: SigningKey::from_bytes(&bytes) })
    }

    /// The 32-byte public key (JWK `x` parameter, prior to base64url
    /// encoding).
    #[must_use]
    pub fn public_bytes(&self) -> [u8; 32] {
        self.signing_key.verifying_key().to_bytes()
    }

    /// Sign `payload`, returning the raw 64-byte Ed25519 signature.
    #[must_use]
    pub fn sign(&self, payload: &[u8]) -> [u8; 64] {
        self.signing_key.sign(payload).to_bytes()
    }

    /// This key pair's [`VerifyingKey`].
    #[must_use]
    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }
}

/// A public key used to verify receipts, together with the `kid` it was
/// resolved under.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SignatureVerifier {
    /// Key id this key was published under.
    pub kid: String,
    /// 32-byte Ed25519 public key.
    #[serde(with = "bytes32")]
    pub public_key: [u8; 32],
}

impl SignatureVerifier {
    /// Construct a verifier from a 32-byte Ed25519 public key.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::InvalidKeyLength`] if `public_key` is not 32
    /// bytes.
    pub fn new(kid: impl Into<String>, public_key: &[u8]) -> Result<Self, CryptoError> {
        let bytes: [u8; 32] =
            public_key.try_into().map_err(|_| CryptoError::InvalidKeyLength(public_key.len()))?;
        Ok(Self { kid: kid.into(), public_key: bytes })
    }

    fn verifying_key(&self) -> Result<VerifyingKey, CryptoError> {
        VerifyingKey::from_bytes(&self.public_key)
            .map_err(|e| CryptoError::MalformedKey(e.to_string()))
    }
}

mod bytes32 {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    use crate::canon::base64url;

    pub fn serialize<S: Serializer>(bytes: &[u8; 32], s: S) -> Result<S::Ok, S::Error> {
        base64url::encode(bytes).serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<[u8; 32], D::Error> {
        let s = String::deserialize(d)?;
        let bytes = base64url::decode(&s).map_err(serde::de::Error::custom)?;
        bytes.try_into().map_err(|v: Vec<u8>| {
            serde::de::Error::custom(format!("expected 32 bytes, got {}", v.len()))
        })
    }
}

/// A parsed, but not yet verified, compact JWS.
#[derive(Clone, Debug)]
pub struct CompactJws {
    /// The decoded JOSE header (must contain `alg` and `kid`).
    pub header: serde_json::Value,
    /// The raw (still base64url-encoded) header segment, needed to
    /// reconstruct the exact signing input.
    pub header_b64: String,
    /// The raw (still base64url-encoded) payload segment.
    pub payload_b64: String,
    /// The decoded signature bytes.
    pub signature: Vec<u8>,
    /// `kid` extracted from the header, for convenience.
    pub kid: String,
    /// `alg` extracted from the header, for convenience.
    pub alg: String,
}

impl CompactJws {
    /// Split a compact `header.payload.signature` string into its parts and
    /// decode the header enough to read `alg`/`kid`.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError`] variants if the input is not exactly three
    /// non-empty base64url segments, if the header does not decode as JSON,
    /// or if `alg`/`kid` are missing or `alg != "EdDSA"`.
    pub fn parse(compact: &str) -> Result<Self, CryptoError> {
        let parts: Vec<&str> = compact.split('.').collect();
        let [header_b64, payload_b64, sig_b64] = parts.as_slice() else {
            return Err(CryptoError::MalformedKey(format!(
                "expected 3 JWS segments, got {}",
                parts.len()
            )));
        };
        if header_b64.is_empty() || payload_b64.is_empty() || sig_b64.is_empty() {
            return Err(CryptoError::MalformedKey("empty JWS segment".into()));
        }

        let header_bytes = base64url::decode(header_b64)
            .map_err(|e| CryptoError::MalformedKey(format!("header: {e}")))?;
        let header: serde_json::Value = serde_json::from_slice(&header_bytes)
            .map_err(|e| CryptoError::MalformedKey(format!("header JSON: {e}")))?;

        let alg = header
            .get("alg")
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| CryptoError::MalformedKey("missing `alg`".into()))?
            .to_string();
        if alg != "EdDSA" {
            return Err(CryptoError::UnsupportedAlgorithm(alg));
        }
        let kid = header
            .get("kid")
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| CryptoError::MalformedKey("missing `kid`".into()))?
            .to_string();

        let signature = base64url::decode(sig_b64)
            .map_err(|e| CryptoError::MalformedKey(format!("signature: {e}")))?;

        Ok(Self {
            header,
            header_b64: (*header_b64).to_string(),
            payload_b64: (*payload_b64).to_string(),
            signature,
            kid,
            alg,
        })
    }

    fn signing_input(&self) -> Vec<u8> {
        format!("{}.{}", self.header_b64, self.payload_b64).into_bytes()
    }

    /// Decode and return the JCS-canonicalized payload bytes.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError`] if the payload segment is not valid
    /// base64url.
    pub fn payload_bytes(&self) -> Result<Vec<u8>, CryptoError> {
        base64url::decode(&self.payload_b64)
            .map_err(|e| CryptoError::MalformedKey(format!("payload: {e}")))
    }
}

/// Sign `header_json` and `payload_json` (both already JCS-canonicalized)
/// with `key`, producing a compact JWS string.
///
/// # Errors
///
/// Never actually fails today (Ed25519 signing is infallible given valid key
/// material) but returns `Result` so a future algorithm can fail without
/// breaking callers.
pub fn sign_compact(
    key: &Ed25519KeyPair, header_json: &str, payload_json: &str,
) -> Result<String, CryptoError> {
    let header_b64 = base64url::encode(header_json.as_bytes());
    let payload_b64 = base64url::encode(payload_json.as_bytes());
    let signing_input = format!("{header_b64}.{payload_b64}");
    let signature = key.sign(signing_input.as_bytes());
    let sig_b64 = base64url::encode(&signature);
    Ok(format!("{signing_input}.{sig_b64}"))
}

/// Verify `jws` against `verifier`, returning the decoded payload bytes on
/// success.
///
/// # Errors
///
/// Returns [`CryptoError::UnsupportedAlgorithm`] if `alg != "EdDSA"`, or
/// [`CryptoError::InvalidSignature`] if the signature does not verify.
pub fn verify_compact(jws: &CompactJws, verifier: &SignatureVerifier) -> Result<Vec<u8>, CryptoError> {
    if jws.alg != "EdDSA" {
        return Err(CryptoError::UnsupportedAlgorithm(jws.alg.clone()));
    }
    let signature_bytes: [u8; 64] = jws
        .signature
        .as_slice()
        .try_into()
        .map_err(|_| CryptoError::MalformedKey("signature not 64 bytes".into()))?;
    let signature = Signature::from_bytes(&signature_bytes);

    let verifying_key = verifier.verifying_key()?;
    verifying_key
        .verify(&jws.signing_input(), &signature)
        .map_err(|_| CryptoError::InvalidSignature)?;
    jws.payload_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_then_verify_round_trips() {
        let key = Ed25519KeyPair::generate();
        let header = r#"{"alg":"EdDSA","kid":"k1","typ":"application/peac-receipt+jws"}"#;
        let payload = r#"{"iss":"https://p.example"}"#;
        let compact = sign_compact(&key, header, payload).unwrap();

        let parsed = CompactJws::parse(&compact).unwrap();
        let verifier = SignatureVerifier::new("k1", &key.public_bytes()).unwrap();
        let out = verify_compact(&parsed, &verifier).unwrap();
        assert_eq!(out, payload.as_bytes());
    }

    #[test]
    fn rejects_non_eddsa_algorithm() {
        let header = base64url::encode(br#"{"alg":"RS256","kid":"k1"}"#);
        let payload = base64url::encode(b"{}");
        let compact = format!("{header}.{payload}.c2ln");
        let err = CompactJws::parse(&compact).unwrap_err();
        assert!(matches!(err, CryptoError::UnsupportedAlgorithm(a) if a == "RS256"));
    }

    #[test]
    fn rejects_wrong_key_length() {
        assert!(Ed25519KeyPair::from_seed(&[0u8; 31]).is_err());
        assert!(SignatureVerifier::new("k1", &[0u8; 16]).is_err());
    }

    #[test]
    fn tampered_payload_fails_verification() {
        let key = Ed25519KeyPair::generate();
        let header = r#"{"alg":"EdDSA","kid":"k1"}"#;
        let payload = r#"{"iss":"https://p.example"}"#;
        let compact = sign_compact(&key, header, payload).unwrap();

        let mut parts: Vec<&str> = compact.split('.').collect();
        let tampered_payload = base64url::encode(b"{\"iss\":\"https://evil.example\"}");
        parts[1] = &tampered_payload;
        let tampered = parts.join(".");

        let parsed = CompactJws::parse(&tampered).unwrap();
        let verifier = SignatureVerifier::new("k1", &key.public_bytes()).unwrap();
        assert!(verify_compact(&parsed, &verifier).is_err());
    }

    #[test]
    fn rejects_malformed_jws_shape() {
        assert!(CompactJws::parse("only.two").is_err());
        assert!(CompactJws::parse("a..b").is_err());
    }
}
