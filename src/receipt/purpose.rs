//! Registered purpose tokens for `purpose_declared`/`purpose_enforced`.
//!
//! The core does not define a purpose taxonomy (that is a policy-layer
//! concern) but it does enforce that tokens come from a registered set, so a
//! typo in a purpose string fails loudly at issuance rather than silently
//! mismatching at verification time.

use std::collections::HashSet;
use std::sync::LazyLock;

/// The set of purpose tokens this core recognizes.
///
/// Deployments extend this by composing their own allowlist on top of
/// [`is_registered`]; the core ships the common cross-publisher set used by
/// the conformance fixtures.
pub static REGISTERED_PURPOSES: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    [
        "search-indexing",
        "ai-training",
        "rag-indexing",
        "agent-browsing",
        "summarization",
        "translation",
        "accessibility",
        "archival",
    ]
    .into_iter()
    .collect()
});

/// Whether `token` is a registered purpose.
#[must_use]
pub fn is_registered(token: &str) -> bool {
    REGISTERED_PURPOSES.contains(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_known_purposes() {
        assert!(is_registered("ai-training"));
    }

    #[test]
    fn rejects_unknown_purposes() {
        assert!(!is_registered("definitely-not-a-purpose"));
    }
}
