//! # Rail Adapter Interface (C11)
//!
//! A uniform `initiate/confirm/refund?` contract every payment rail
//! plug-in implements, plus a [`RailRegistry`] for selecting one with
//! deterministic fallback. Concrete rail SDKs (Stripe, x402, L402, …) are
//! out of scope for this core — [`MockRail`] is the reference
//! implementation conformance fixtures exercise.

mod mock;

pub use mock::MockRail;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::VerifyError;
use crate::receipt::claims::PaymentClaim;

/// A rail-agnostic handle to an initiated payment.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PaymentIntent {
    /// Rail-scoped intent id.
    pub id: String,
    /// Amount requested, decimal string.
    pub amount: String,
    /// ISO 4217 currency code.
    pub currency: String,
}

/// Amount + currency requested from [`RailAdapter::initiate`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Money {
    /// Decimal amount string.
    pub amount: String,
    /// ISO 4217 currency code.
    pub currency: String,
}

/// Caller-supplied context for `initiate`/`idempotency_key`.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RailContext {
    /// The resource being paid for.
    pub resource: Option<String>,
    /// Declared purpose, if any.
    pub purpose: Option<String>,
    /// Paying user or agent identifier.
    pub user: Option<String>,
}

/// Outcome of [`RailAdapter::confirm`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PaymentResult {
    /// Whether the rail reports this payment as settled.
    pub ok: bool,
    /// Rail-scoped settlement reference.
    pub reference: String,
    /// Settled amount, if the rail reports one independently.
    pub amount: Option<String>,
    /// Suggested retry delay, for a transient decline.
    pub retry_after_s: Option<u32>,
    /// Rail-reported error detail, when `ok` is false.
    pub error: Option<String>,
}

/// A decoded payment-rail webhook event.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WebhookEvent {
    /// Rail-scoped event type (e.g. `"payment.settled"`).
    pub event_type: String,
    /// Rail-scoped reference the event concerns.
    pub reference: String,
    /// The raw, rail-specific event payload.
    pub raw: serde_json::Value,
}

/// Implemented by every payment-rail plug-in.
#[async_trait]
pub trait RailAdapter: Send + Sync {
    /// This rail's registry key (e.g. `"x402"`, `"l402"`, `"stripe"`).
    fn name(&self) -> &str;

    /// Begin a payment for `amount` in `ctx`.
    async fn initiate(&self, amount: Money, ctx: &RailContext) -> Result<PaymentIntent, VerifyError>;

    /// Check (and, for synchronous rails, complete) settlement of `intent`.
    async fn confirm(&self, intent: &PaymentIntent, ctx: Option<&RailContext>) -> Result<PaymentResult, VerifyError>;

    /// Refund a previously settled payment, if this rail supports it.
    async fn refund(&self, _reference: &str, _amount: Option<&str>) -> Result<bool, VerifyError> {
        Err(VerifyError::MisconfiguredVerifier(format!("{} does not support refunds", self.name())))
    }

    /// Derive a stable idempotency key for a request against `ctx`, so a
    /// retried `initiate` doesn't double-charge.
    fn idempotency_key(&self, ctx: &RailContext) -> String;

    /// Verify `signature_header` over `payload_bytes` using `secret` with a
    /// constant-time comparison, returning the decoded event on success.
    fn verify_webhook(&self, payload_bytes: &[u8], signature_header: &str, secret: &[u8]) -> Result<WebhookEvent, VerifyError>;

    /// Normalize a decoded webhook event into the `payment.evidence` slot
    /// of a receipt.
    fn map_event(&self, event: &WebhookEvent) -> PaymentClaim;
}

/// Selects a [`RailAdapter`] by name, with deterministic fallback to the
/// first registered rail when no preference is given or available.
#[derive(Default)]
pub struct RailRegistry {
    rails: HashMap<String, Arc<dyn RailAdapter>>,
    order: Vec<String>,
}

impl RailRegistry {
    /// Construct an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `rail`, appending to the fallback order.
    pub fn register(&mut self, rail: Arc<dyn RailAdapter>) {
        let name = rail.name().to_string();
        self.order.push(name.clone());
        self.rails.insert(name, rail);
    }

    /// Select a rail: `preferred` if registered, otherwise the first
    /// registered rail in insertion order.
    ///
    /// # Errors
    ///
    /// Returns [`VerifyError::MisconfiguredVerifier`] if no rail is
    /// registered at all, or `preferred` names a rail that isn't.
    pub fn select(&self, preferred: Option<&str>) -> Result<Arc<dyn RailAdapter>, VerifyError> {
        if let Some(name) = preferred {
            return self
                .rails
                .get(name)
                .cloned()
                .ok_or_else(|| VerifyError::MisconfiguredVerifier(format!("rail `{name}` not registered")));
        }
        let first = self.order.first().ok_or_else(|| {
            VerifyError::MisconfiguredVerifier("no payment rail registered".into())
        })?;
        Ok(self.rails[first].clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn select_falls_back_to_first_registered() {
        let mut registry = RailRegistry::new();
        registry.register(Arc::new(MockRail::new("rail-a")));
        registry.register(Arc::new(MockRail::new("rail-b")));
        let selected = registry.select(None).unwrap();
        assert_eq!(selected.name(), "rail-a");
    }

    #[test]
    fn select_honors_explicit_preference() {
        let mut registry = RailRegistry::new();
        registry.register(Arc::new(MockRail::new("rail-a")));
        registry.register(Arc::new(MockRail::new("rail-b")));
        let selected = registry.select(Some("rail-b")).unwrap();
        assert_eq!(selected.name(), "rail-b");
    }

    #[test]
    fn select_rejects_unregistered_preference() {
        let mut registry = RailRegistry::new();
        registry.register(Arc::new(MockRail::new("rail-a")));
        assert!(registry.select(Some("rail-z")).is_err());
    }

    #[test]
    fn select_with_nothing_registered_is_misconfigured() {
        let registry = RailRegistry::new();
        assert!(registry.select(None).is_err());
    }
}
