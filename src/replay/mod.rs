//! # Replay Store (C6)
//!
//! The `(issuer, kid, nonce)` uniqueness contract every verifier deployment
//! relies on to stop a captured receipt from being replayed: `seen` returns
//! `true` iff this triple was already observed inside its TTL window,
//! otherwise it records the triple and returns `false`. Exactly one caller
//! may ever observe `false` for a given triple.

mod durable;
mod memory;
mod noop;

pub use durable::DurableReplayStore;
pub use memory::InMemoryReplayStore;
pub use noop::NoopReplayStore;

use async_trait::async_trait;

/// The triple a replay check is keyed on, plus the window it should be
/// remembered for.
#[derive(Clone, Debug)]
pub struct ReplayContext {
    /// Issuer origin.
    pub issuer: String,
    /// Key id the receipt was signed under.
    pub kid: String,
    /// The receipt's replay-detection nonce.
    pub nonce: String,
    /// How long, in seconds, this triple should be remembered.
    pub ttl_seconds: i64,
}

/// A backend that remembers which `(issuer, kid, nonce)` triples have
/// already been presented.
///
/// Implementations MUST be atomic per-triple: of any concurrent `seen`
/// calls for the same triple, at most one may return `false`.
#[async_trait]
pub trait ReplayStore: Send + Sync {
    /// Record `ctx`'s triple if unseen, returning whether it was already
    /// present.
    async fn seen(&self, ctx: &ReplayContext) -> bool;
}
