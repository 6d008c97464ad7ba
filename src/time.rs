//! # Time & Deadlines
//!
//! Unix-seconds helpers plus the [`Deadline`] type that propagates a
//! request's remaining time budget through JWKS, policy, replay, and
//! pointer fetches (`spec.md` §5).

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio_util::sync::CancellationToken;

use crate::error::VerifyError;

/// Current Unix time in seconds.
///
/// # Panics
///
/// Panics if the system clock is set before the Unix epoch.
#[must_use]
pub fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before Unix epoch")
        .as_secs() as i64
}

/// A request-scoped time budget and cancellation handle, threaded through
/// every downstream I/O point so a slow upstream can't hold a verify call
/// open indefinitely.
#[derive(Clone)]
pub struct Deadline {
    expires_at: std::time::Instant,
    cancel: CancellationToken,
}

impl Deadline {
    /// Build a deadline `budget` from now, linked to `cancel` (typically the
    /// request's own cancellation token, so a client disconnect cancels
    /// every in-flight fetch derived from this deadline).
    #[must_use]
    pub fn new(budget: Duration, cancel: CancellationToken) -> Self {
        Self { expires_at: std::time::Instant::now() + budget, cancel }
    }

    /// Time remaining before this deadline elapses, or `Duration::ZERO` if
    /// it already has.
    #[must_use]
    pub fn remaining(&self) -> Duration {
        self.expires_at.saturating_duration_since(std::time::Instant::now())
    }

    /// This deadline's cancellation token, for wiring into downstream
    /// futures via `tokio::select!`.
    #[must_use]
    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Race `fut` against this deadline and cancellation, mapping either
    /// into [`VerifyError::Timeout`].
    ///
    /// # Errors
    ///
    /// Returns [`VerifyError::Timeout`] if the deadline elapses or the
    /// token is cancelled before `fut` resolves.
    pub async fn race<T>(&self, fut: impl std::future::Future<Output = T>) -> Result<T, VerifyError> {
        tokio::select! {
            result = tokio::time::timeout(self.remaining(), fut) => {
                result.map_err(|_| VerifyError::Timeout)
            }
            () = self.cancel.cancelled() => Err(VerifyError::Timeout),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unix_now_is_plausible() {
        assert!(unix_now() > 1_700_000_000);
    }

    #[tokio::test]
    async fn race_returns_value_when_fut_finishes_first() {
        let deadline = Deadline::new(Duration::from_secs(1), CancellationToken::new());
        let out = deadline.race(async { 42 }).await.unwrap();
        assert_eq!(out, 42);
    }

    #[tokio::test]
    async fn race_times_out_when_budget_elapses() {
        let deadline = Deadline::new(Duration::from_millis(10), CancellationToken::new());
        let out = deadline.race(async {
            tokio::time::sleep(Duration::from_secs(5)).await;
        }).await;
        assert!(matches!(out, Err(VerifyError::Timeout)));
    }

    #[tokio::test]
    async fn race_is_cancellable() {
        let cancel = CancellationToken::new();
        let deadline = Deadline::new(Duration::from_secs(5), cancel.clone());
        cancel.cancel();
        let out = deadline.race(async {
            tokio::time::sleep(Duration::from_secs(5)).await;
        }).await;
        assert!(matches!(out, Err(VerifyError::Timeout)));
    }
}
