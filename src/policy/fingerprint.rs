//! Canonical policy fingerprint and its `policy_hash`.

use serde::Serialize;

use crate::canon::{base64url, digest, jcs};
use crate::error::VerifyError;
use crate::policy::descriptor::PolicyDescriptor;

/// The ordered, hashable descriptor list a receipt's `policy_hash` binds to.
#[derive(Clone, Debug, Serialize)]
pub struct PolicyFingerprint {
    descriptors: Vec<PolicyDescriptor>,
}

impl PolicyFingerprint {
    /// Build a fingerprint from `descriptors`, sorting by `(type, url)` so
    /// two discoverers that fetch the same descriptors in a different
    /// order produce the same hash.
    #[must_use]
    pub fn new(mut descriptors: Vec<PolicyDescriptor>) -> Self {
        descriptors.sort_by(|a, b| a.kind.cmp(&b.kind).then_with(|| a.url.cmp(&b.url)));
        Self { descriptors }
    }

    /// This fingerprint's descriptors, in canonical order.
    #[must_use]
    pub fn descriptors(&self) -> &[PolicyDescriptor] {
        &self.descriptors
    }
}

/// Compute `policy_hash = base64url(SHA-256(JCS(fingerprint)))`.
///
/// # Errors
///
/// Returns [`VerifyError::SchemaValidationFailed`] if the fingerprint does
/// not canonicalize (practically unreachable, since every field is a plain
/// string).
pub fn fingerprint_hash(fingerprint: &PolicyFingerprint) -> Result<String, VerifyError> {
    let canonical = jcs::canonicalize(fingerprint)
        .map_err(|e| VerifyError::SchemaValidationFailed(format!("policy fingerprint: {e}")))?;
    Ok(base64url::encode(&digest::sha256(canonical.as_bytes())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::descriptor::DescriptorKind;

    fn descriptor(kind: DescriptorKind, url: &str) -> PolicyDescriptor {
        PolicyDescriptor { kind, url: url.to_string(), etag: None, body: None }
    }

    #[test]
    fn ordering_is_independent_of_input_order() {
        let a = PolicyFingerprint::new(vec![
            descriptor(DescriptorKind::AgentPermissions, "https://p.example/ap"),
            descriptor(DescriptorKind::PeacTxt, "https://p.example/peac.txt"),
        ]);
        let b = PolicyFingerprint::new(vec![
            descriptor(DescriptorKind::PeacTxt, "https://p.example/peac.txt"),
            descriptor(DescriptorKind::AgentPermissions, "https://p.example/ap"),
        ]);
        assert_eq!(fingerprint_hash(&a).unwrap(), fingerprint_hash(&b).unwrap());
    }

    #[test]
    fn different_descriptors_hash_differently() {
        let a = PolicyFingerprint::new(vec![descriptor(DescriptorKind::PeacTxt, "https://p.example/peac.txt")]);
        let b = PolicyFingerprint::new(vec![descriptor(DescriptorKind::PeacTxt, "https://q.example/peac.txt")]);
        assert_ne!(fingerprint_hash(&a).unwrap(), fingerprint_hash(&b).unwrap());
    }
}
