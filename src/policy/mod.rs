//! # Policy Discovery & Hash (C9)
//!
//! Discovers the three policy descriptor kinds a resource can publish
//! (`peac.txt`, `aipref`, `agent-permissions`), and folds them into a
//! canonical `policy_hash` a receipt can bind to.

pub mod descriptor;
mod fingerprint;

pub use descriptor::{DescriptorKind, PolicyDescriptor};
pub use fingerprint::{fingerprint_hash, PolicyFingerprint};

use std::time::Duration;

use crate::error::VerifyError;
use crate::jwks::{check_url, HostAllowlist, SsrfGuardConfig};
use crate::time::Deadline;

/// Total time budget for discovering every descriptor of one resource.
pub const TOTAL_BUDGET: Duration = Duration::from_millis(250);
/// Per-descriptor fetch budget.
pub const PER_FETCH_BUDGET: Duration = Duration::from_millis(150);
/// TTL for the fingerprint cache keyed on concatenated `ETag`s.
pub const FINGERPRINT_CACHE_TTL_SECONDS: i64 = 300;

/// Fetches policy descriptors for a resource URL and folds them into a
/// [`PolicyFingerprint`].
pub struct PolicyDiscoverer<'a> {
    client: &'a reqwest::Client,
    ssrf: SsrfGuardConfig,
    allowlist: &'a dyn HostAllowlist,
}

impl<'a> PolicyDiscoverer<'a> {
    /// Construct a discoverer over `client`, applying the same SSRF guard
    /// as the JWKS resolver.
    #[must_use]
    pub fn new(client: &'a reqwest::Client, ssrf: SsrfGuardConfig, allowlist: &'a dyn HostAllowlist) -> Self {
        Self { client, ssrf, allowlist }
    }

    /// Discover every descriptor for `resource_url`, respecting
    /// [`TOTAL_BUDGET`] across all fetches.
    ///
    /// # Errors
    ///
    /// Returns [`VerifyError::SsrfBlocked`] if `resource_url` or a derived
    /// descriptor URL fails the SSRF guard. Individual descriptor fetch
    /// failures are not fatal — a descriptor that can't be fetched within
    /// [`PER_FETCH_BUDGET`] is simply omitted from the result.
    pub async fn discover(&self, resource_url: &url::Url) -> Result<Vec<PolicyDescriptor>, VerifyError> {
        check_url(resource_url, self.ssrf, self.allowlist)?;

        let deadline = tokio::time::Instant::now() + TOTAL_BUDGET;
        let mut descriptors = Vec::new();

        if tokio::time::Instant::now() < deadline {
            if let Some(d) = self.fetch_peac_txt(resource_url).await {
                descriptors.push(d);
            }
        }
        if tokio::time::Instant::now() < deadline {
            if let Some(d) = self.fetch_agent_permissions(resource_url).await {
                descriptors.push(d);
            }
        }

        Ok(descriptors)
    }

    /// Like [`PolicyDiscoverer::discover`], but bounded by a request-scoped
    /// [`Deadline`] instead of (in addition to) [`TOTAL_BUDGET`]. A caller
    /// discovering policy as part of handling one request — rather than the
    /// standalone `dir get` CLI path, which has no such context — should
    /// use this so policy discovery shares the same budget as the JWKS and
    /// pointer fetches for that request.
    ///
    /// # Errors
    ///
    /// As [`PolicyDiscoverer::discover`], plus [`VerifyError::Timeout`] if
    /// `deadline` elapses or is cancelled first.
    pub async fn discover_with_deadline(
        &self, resource_url: &url::Url, deadline: &Deadline,
    ) -> Result<Vec<PolicyDescriptor>, VerifyError> {
        deadline.race(self.discover(resource_url)).await?
    }

    async fn fetch_peac_txt(&self, resource_url: &url::Url) -> Option<PolicyDescriptor> {
        let url = resource_url.join("/.well-known/peac.txt").ok()?;
        check_url(&url, self.ssrf, self.allowlist).ok()?;
        let resp = tokio::time::timeout(PER_FETCH_BUDGET, self.client.get(url.clone()).send())
            .await
            .ok()?
            .ok()?;
        if !resp.status().is_success() {
            return None;
        }
        let etag = resp.headers().get("etag").and_then(|v| v.to_str().ok()).map(str::to_string);
        let body = resp.text().await.ok()?;
        Some(PolicyDescriptor { kind: DescriptorKind::PeacTxt, url: url.to_string(), etag, body: Some(body) })
    }

    async fn fetch_agent_permissions(&self, resource_url: &url::Url) -> Option<PolicyDescriptor> {
        let resp = tokio::time::timeout(PER_FETCH_BUDGET, self.client.get(resource_url.clone()).send())
            .await
            .ok()?
            .ok()?;
        if !resp.status().is_success() {
            return None;
        }
        let html = resp.text().await.ok()?;
        let href = extract_agent_permissions_link(&html)?;
        let url = resource_url.join(&href).ok()?;
        check_url(&url, self.ssrf, self.allowlist).ok()?;
        Some(PolicyDescriptor { kind: DescriptorKind::AgentPermissions, url: url.to_string(), etag: None, body: None })
    }
}

fn extract_agent_permissions_link(html: &str) -> Option<String> {
    let needle = r#"rel="agent-permissions""#;
    let tag_start = html.find(needle)?;
    let tag = &html[..tag_start];
    let tag_open = tag.rfind("<link")?;
    let tag_close_rel = html[tag_start..].find('>').map(|i| tag_start + i)?;
    let full_tag = &html[tag_open..tag_close_rel];
    let href_start = full_tag.find("href=\"")? + "href=\"".len();
    let href_end = full_tag[href_start..].find('"')? + href_start;
    Some(full_tag[href_start..href_end].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_agent_permissions_href() {
        let html = r#"<html><head><link rel="agent-permissions" href="/ap.json"></head></html>"#;
        assert_eq!(extract_agent_permissions_link(html), Some("/ap.json".to_string()));
    }

    #[test]
    fn returns_none_when_link_absent() {
        let html = r#"<html><head></head></html>"#;
        assert_eq!(extract_agent_permissions_link(html), None);
    }
}
