//! Single-process replay store: a map plus an ordered expiry index.

use std::collections::BTreeSet;
use std::sync::Mutex;

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::replay::{ReplayContext, ReplayStore};

type Triple = (String, String, String);

/// An in-process replay store, correct for a single node. Not shareable
/// across instances — use a durable backend for multi-instance deployments
/// (`spec.md` §4.6).
pub struct InMemoryReplayStore {
    seen_at: DashMap<Triple, i64>,
    expiry_index: Mutex<BTreeSet<(i64, Triple)>>,
}

impl InMemoryReplayStore {
    /// Construct an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self { seen_at: DashMap::new(), expiry_index: Mutex::new(BTreeSet::new()) }
    }

    /// Drop every triple whose expiry has passed `now`. Callers with a
    /// background task can call this periodically to bound memory use;
    /// `seen` is correct without it, since expired entries are treated as
    /// unseen.
    pub fn sweep_expired(&self, now: i64) {
        let mut index = self.expiry_index.lock().expect("replay index mutex poisoned");
        while let Some(&(expires_at, ref triple)) = index.iter().next() {
            if expires_at > now {
                break;
            }
            let triple = triple.clone();
            index.pop_first();
            self.seen_at.remove(&triple);
        }
    }
}

impl Default for InMemoryReplayStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ReplayStore for InMemoryReplayStore {
    async fn seen(&self, ctx: &ReplayContext) -> bool {
        let now = crate::time::unix_now();
        let triple = (ctx.issuer.clone(), ctx.kid.clone(), ctx.nonce.clone());
        let expires_at = now + ctx.ttl_seconds;

        // `entry()` holds the shard lock across the read-then-write, so two
        // concurrent callers for the same triple can't both observe "not
        // seen" the way separate `get`/`insert` calls could.
        let already_seen = match self.seen_at.entry(triple.clone()) {
            Entry::Occupied(mut entry) => {
                let seen = *entry.get() > now;
                if !seen {
                    entry.insert(expires_at);
                }
                seen
            }
            Entry::Vacant(entry) => {
                entry.insert(expires_at);
                false
            }
        };

        if already_seen {
            return true;
        }

        self.expiry_index.lock().expect("replay index mutex poisoned").insert((expires_at, triple));
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(nonce: &str) -> ReplayContext {
        ReplayContext { issuer: "https://p.example".into(), kid: "k1".into(), nonce: nonce.into(), ttl_seconds: 300 }
    }

    #[tokio::test]
    async fn first_call_is_unseen_second_is_replay() {
        let store = InMemoryReplayStore::new();
        assert!(!store.seen(&ctx("n1")).await);
        assert!(store.seen(&ctx("n1")).await);
    }

    #[tokio::test]
    async fn distinct_nonces_are_independent() {
        let store = InMemoryReplayStore::new();
        assert!(!store.seen(&ctx("n1")).await);
        assert!(!store.seen(&ctx("n2")).await);
    }

    #[tokio::test]
    async fn sweep_expired_forgets_old_entries() {
        let store = InMemoryReplayStore::new();
        let mut c = ctx("n1");
        c.ttl_seconds = -100;
        assert!(!store.seen(&c).await);
        store.sweep_expired(crate::time::unix_now());
        assert!(!store.seen(&ctx("n1")).await);
    }
}
