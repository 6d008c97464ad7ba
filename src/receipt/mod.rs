//! # Receipt Schema & Claims (C3)
//!
//! The typed claim set a receipt carries, strict validation before signing
//! and after verification, and the time-bound checks every verifier applies
//! regardless of transport or rail.

pub mod claims;
pub mod jws_envelope;
pub mod purpose;

pub use claims::{PaymentClaim, ReceiptClaims};
pub use jws_envelope::{JWS_TYPE, RECEIPT_MAX_TTL_SECONDS};
