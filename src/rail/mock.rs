//! A reference `RailAdapter` used by conformance fixtures and demos: settles
//! every payment immediately and signs webhooks with HMAC-SHA256.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::VerifyError;
use crate::rail::{Money, PaymentIntent, PaymentResult, RailAdapter, RailContext, WebhookEvent};
use crate::receipt::claims::PaymentClaim;

type HmacSha256 = Hmac<Sha256>;

/// An in-memory rail that settles synchronously, for tests and demos.
pub struct MockRail {
    name: String,
    counter: AtomicU64,
}

impl MockRail {
    /// Construct a mock rail registered under `name`.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), counter: AtomicU64::new(0) }
    }
}

#[async_trait]
impl RailAdapter for MockRail {
    fn name(&self) -> &str {
        &self.name
    }

    async fn initiate(&self, amount: Money, _ctx: &RailContext) -> Result<PaymentIntent, VerifyError> {
        let id = self.counter.fetch_add(1, Ordering::SeqCst);
        Ok(PaymentIntent { id: format!("{}-{id}", self.name), amount: amount.amount, currency: amount.currency })
    }

    async fn confirm(&self, intent: &PaymentIntent, _ctx: Option<&RailContext>) -> Result<PaymentResult, VerifyError> {
        Ok(PaymentResult {
            ok: true,
            reference: intent.id.clone(),
            amount: Some(intent.amount.clone()),
            retry_after_s: None,
            error: None,
        })
    }

    fn idempotency_key(&self, ctx: &RailContext) -> String {
        let resource = ctx.resource.as_deref().unwrap_or("");
        let purpose = ctx.purpose.as_deref().unwrap_or("");
        let user = ctx.user.as_deref().unwrap_or("");
        let bytes = crate::canon::digest::sha256(format!("{resource}\0{purpose}\0{user}").as_bytes());
        crate::canon::base64url::encode(&bytes)
    }

    fn verify_webhook(&self, payload_bytes: &[u8], signature_header: &str, secret: &[u8]) -> Result<WebhookEvent, VerifyError> {
        let expected = compute_hmac(secret, payload_bytes);
        let provided = hex_decode(signature_header)
            .ok_or_else(|| VerifyError::InvalidTransport("webhook signature is not valid hex".into()))?;
        if !constant_time_eq(&expected, &provided) {
            return Err(VerifyError::SignatureInvalid);
        }
        let raw: serde_json::Value = serde_json::from_slice(payload_bytes)
            .map_err(|e| VerifyError::InvalidTransport(format!("webhook payload: {e}")))?;
        let event_type = raw.get("type").and_then(|v| v.as_str()).unwrap_or("unknown").to_string();
        let reference = raw.get("reference").and_then(|v| v.as_str()).unwrap_or("").to_string();
        Ok(WebhookEvent { event_type, reference, raw })
    }

    fn map_event(&self, event: &WebhookEvent) -> PaymentClaim {
        let status = if event.event_type == "payment.settled" { "settled" } else { "pending" };
        PaymentClaim {
            rail: self.name.clone(),
            reference: event.reference.clone(),
            amount: event.raw.get("amount").and_then(|v| v.as_str()).map(str::to_string),
            currency: event.raw.get("currency").and_then(|v| v.as_str()).map(str::to_string),
            status: status.to_string(),
            evidence: event
                .raw
                .as_object()
                .cloned()
                .unwrap_or_default()
                .into_iter()
                .collect::<HashMap<_, _>>(),
        }
    }
}

fn compute_hmac(secret: &[u8], payload: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC accepts any key length");
    mac.update(payload);
    mac.finalize().into_bytes().to_vec()
}

fn hex_decode(s: &str) -> Option<Vec<u8>> {
    if s.len() % 2 != 0 {
        return None;
    }
    (0..s.len()).step_by(2).map(|i| u8::from_str_radix(&s[i..i + 2], 16).ok()).collect()
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn initiate_then_confirm_settles() {
        let rail = MockRail::new("mock");
        let intent =
            rail.initiate(Money { amount: "100".into(), currency: "USD".into() }, &RailContext::default()).await.unwrap();
        let result = rail.confirm(&intent, None).await.unwrap();
        assert!(result.ok);
        assert_eq!(result.reference, intent.id);
    }

    #[test]
    fn idempotency_key_is_stable_for_same_context() {
        let rail = MockRail::new("mock");
        let ctx = RailContext { resource: Some("r".into()), purpose: Some("p".into()), user: Some("u".into()) };
        assert_eq!(rail.idempotency_key(&ctx), rail.idempotency_key(&ctx));
    }

    #[test]
    fn webhook_signature_round_trips() {
        let rail = MockRail::new("mock");
        let secret = b"shh";
        let payload = br#"{"type":"payment.settled","reference":"ref-1","amount":"100","currency":"USD"}"#;
        let sig = compute_hmac(secret, payload);
        let sig_hex: String = sig.iter().map(|b| format!("{b:02x}")).collect();
        let event = rail.verify_webhook(payload, &sig_hex, secret).unwrap();
        assert_eq!(event.event_type, "payment.settled");
    }

    #[test]
    fn tampered_webhook_signature_is_rejected() {
        let rail = MockRail::new("mock");
        let secret = b"shh";
        let payload = br#"{"type":"payment.settled","reference":"ref-1"}"#;
        let wrong_sig = "00".repeat(32);
        assert!(rail.verify_webhook(payload, &wrong_sig, secret).is_err());
    }

    #[test]
    fn map_event_normalizes_to_payment_claim() {
        let rail = MockRail::new("mock");
        let event = WebhookEvent {
            event_type: "payment.settled".into(),
            reference: "ref-1".into(),
            raw: serde_json::json!({"amount": "100", "currency": "USD"}),
        };
        let claim = rail.map_event(&event);
        assert_eq!(claim.status, "settled");
        assert_eq!(claim.amount.as_deref(), Some("100"));
    }
}
