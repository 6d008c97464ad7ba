//! A replay store that remembers nothing. Only wired in when a deployment
//! explicitly opts into `UNSAFE_ALLOW_NO_REPLAY` (`spec.md` §6).

use async_trait::async_trait;

use crate::replay::{ReplayContext, ReplayStore};

/// Always reports a triple as unseen. Exists so the verifier can run with
/// `nonce` checks disabled without special-casing `Option<dyn ReplayStore>`
/// everywhere.
pub struct NoopReplayStore;

#[async_trait]
impl ReplayStore for NoopReplayStore {
    async fn seen(&self, _ctx: &ReplayContext) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn never_reports_replay() {
        let store = NoopReplayStore;
        let ctx = ReplayContext { issuer: "i".into(), kid: "k".into(), nonce: "n".into(), ttl_seconds: 1 };
        assert!(!store.seen(&ctx).await);
        assert!(!store.seen(&ctx).await);
    }
}
