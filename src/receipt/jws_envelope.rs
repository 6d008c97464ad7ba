//! The JWS envelope a receipt is carried in: `typ=application/peac-receipt+jws`,
//! `alg=EdDSA`, `kid` drawn from the issuer's JWKS.

use serde::{Deserialize, Serialize};

/// The JOSE `typ` header value every receipt JWS carries.
pub const JWS_TYPE: &str = "application/peac-receipt+jws";

/// Maximum allowed `exp - iat`, in seconds (`spec.md` §3, §8).
pub const RECEIPT_MAX_TTL_SECONDS: i64 = 86_400;

/// Default receipt lifetime used by the issuer when the caller does not
/// specify one.
pub const DEFAULT_TTL_SECONDS: i64 = 300;

/// The JOSE header of a receipt JWS.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReceiptHeader {
    /// Always `"EdDSA"`.
    pub alg: String,
    /// Always [`JWS_TYPE`].
    pub typ: String,
    /// Key id, matching an entry in the issuer's JWKS.
    pub kid: String,
}

impl ReceiptHeader {
    /// Build the header for a receipt signed with `kid`.
    #[must_use]
    pub fn new(kid: impl Into<String>) -> Self {
        Self { alg: "EdDSA".to_string(), typ: JWS_TYPE.to_string(), kid: kid.into() }
    }
}
