//! # Canonicalization (C1)
//!
//! JSON Canonicalization Scheme ([RFC 8785]) serialization, unpadded
//! base64url, and SHA-256 digests — the bit-exact primitives every signed or
//! hashed artifact in this crate is built from.
//!
//! [RFC 8785]: https://www.rfc-editor.org/rfc/rfc8785

pub mod base64url;
pub mod digest;
pub mod jcs;

pub use base64url::{decode, encode};
pub use digest::sha256;
pub use jcs::{CanonError, canonicalize, canonicalize_value};
