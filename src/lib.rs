//! An implementation of the [PEAC](https://peacprotocol.org) receipt protocol:
//! short-lived, cryptographically signed attestations that a request was
//! authorized under some policy and, where applicable, a payment rail.
//!
//! # Feature Flags
//!
//! There is no default behavior gated away from the base library. The
//! following features narrow the surface for crates that only play one
//! role:
//!
//! * `issuer` - Enables the receipt issuance API.
//! * `verifier` - Enables the receipt verification API.

#[cfg(feature = "issuer")]
pub mod issuer;

#[cfg(feature = "verifier")]
pub mod verifier;

pub mod canon;
pub mod config;
pub mod conformance;
pub mod core;
pub mod crypto;
pub mod error;
pub mod gateway;
pub mod jwks;
pub mod policy;
pub mod rail;
pub mod receipt;
pub mod redact;
pub mod replay;
pub mod time;
pub mod transport;

pub use crate::error::{ErrorCode, VerifyError};
pub use crate::receipt::claims::ReceiptClaims;
