//! Reference seam for a durable, multi-instance-shared replay backend.
//!
//! [`InMemoryReplayStore`](super::InMemoryReplayStore) is correct only for a
//! single process; a deployment running more than one verifier instance
//! needs a backend every instance can see, e.g. `INSERT ... ON CONFLICT DO
//! NOTHING RETURNING` against a shared table, or `SET key NX`. This module
//! doesn't ship that backend (a real RDBMS/KV client is the caller's to
//! plug in), but it does ship the atomic check-and-set contract such a
//! backend must satisfy, plus an in-process `Arc<Mutex<...>>` reference
//! implementation standing in for it in tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::replay::{ReplayContext, ReplayStore};

type Triple = (String, String, String);

/// A replay store backed by a single mutex-guarded table, modeling the
/// check-and-set a durable backend (RDBMS unique constraint, Redis `SET
/// NX`) would provide atomically in one round trip. Unlike
/// [`InMemoryReplayStore`](super::InMemoryReplayStore) this never sweeps —
/// a real backend expires rows with its own TTL mechanism (Postgres
/// partitioning, Redis `EXPIRE`); this reference keeps every triple for the
/// process lifetime, which is fine for the short runs tests need.
pub struct DurableReplayStore {
    table: Mutex<HashMap<Triple, i64>>,
}

impl DurableReplayStore {
    /// Construct an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self { table: Mutex::new(HashMap::new()) }
    }
}

impl Default for DurableReplayStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ReplayStore for DurableReplayStore {
    async fn seen(&self, ctx: &ReplayContext) -> bool {
        let now = crate::time::unix_now();
        let triple = (ctx.issuer.clone(), ctx.kid.clone(), ctx.nonce.clone());
        let expires_at = now + ctx.ttl_seconds;

        let mut table = self.table.lock().expect("replay table mutex poisoned");
        match table.get(&triple).copied() {
            Some(existing_expiry) if existing_expiry > now => true,
            _ => {
                table.insert(triple, expires_at);
                false
            }
        }
    }
}
