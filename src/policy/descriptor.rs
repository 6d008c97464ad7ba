//! The three policy-descriptor kinds a resource can publish.

use serde::{Deserialize, Serialize};

/// Which policy surface a [`PolicyDescriptor`] was discovered from.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "kebab-case")]
pub enum DescriptorKind {
    /// `/.well-known/peac.txt`, line-based publisher policy.
    PeacTxt,
    /// Signalled via request/response headers rather than a fetch.
    Aipref,
    /// Referenced from a resource's HTML as
    /// `<link rel="agent-permissions" href>`.
    AgentPermissions,
}

/// One discovered policy descriptor.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct PolicyDescriptor {
    /// Which surface this came from.
    pub kind: DescriptorKind,
    /// The URL this descriptor was read from (or derived from, for
    /// header-signalled `aipref`).
    pub url: String,
    /// `ETag` of the fetched resource, if any.
    pub etag: Option<String>,
    /// The descriptor body, when the surface carries one (absent for a bare
    /// `agent-permissions` link reference until its target is fetched).
    pub body: Option<String>,
}

/// The well-known `aipref` request/response header name.
pub const AIPREF_HEADER: &str = "content-usage";

/// Build an `aipref` descriptor from a header value observed on the
/// request or response for `resource_url`, if present.
#[must_use]
pub fn aipref_from_header(resource_url: &str, header_value: Option<&str>) -> Option<PolicyDescriptor> {
    let value = header_value?;
    Some(PolicyDescriptor {
        kind: DescriptorKind::Aipref,
        url: resource_url.to_string(),
        etag: None,
        body: Some(value.to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_aipref_descriptor_from_header() {
        let d = aipref_from_header("https://p.example/a", Some("train=n")).unwrap();
        assert_eq!(d.kind, DescriptorKind::Aipref);
        assert_eq!(d.body.as_deref(), Some("train=n"));
    }

    #[test]
    fn absent_header_yields_no_descriptor() {
        assert!(aipref_from_header("https://p.example/a", None).is_none());
    }
}
