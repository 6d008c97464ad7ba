//! The SSRF guard shared by the JWKS resolver (C5) and policy discovery
//! (C9): every fetch target is validated before the network call and again
//! before following any URL the first response points at.

use std::net::IpAddr;

use url::Url;

use crate::error::VerifyError;

/// Whether loopback HTTP targets are permitted (local development only).
#[derive(Clone, Copy, Debug, Default)]
pub struct SsrfGuardConfig {
    /// When true, `http://localhost` and `http://127.0.0.1` are allowed.
    pub allow_loopback_http: bool,
}

/// A caller-supplied hook for enterprise allowlists. Consulted only after
/// the built-in blocklist passes.
pub trait HostAllowlist: Send + Sync {
    /// Whether `host` may be fetched.
    fn is_allowed(&self, host: &str) -> bool;
}

/// An allowlist that accepts every host that clears the built-in blocklist.
pub struct AllowAll;

impl HostAllowlist for AllowAll {
    fn is_allowed(&self, _host: &str) -> bool {
        true
    }
}

const METADATA_IP: &str = "169.254.169.254";

/// Validate `url` against the built-in SSRF blocklist and `allowlist`.
///
/// # Errors
///
/// Returns [`VerifyError::SsrfBlocked`] if the scheme is not `https` (unless
/// `config.allow_loopback_http` permits plain `http` to a loopback host), the
/// host is a literal IP address, a loopback/metadata hostname, within
/// `169.254.0.0/16`, or rejected by `allowlist`.
pub fn check_url(
    url: &Url, config: SsrfGuardConfig, allowlist: &dyn HostAllowlist,
) -> Result<(), VerifyError> {
    let host = url
        .host_str()
        .ok_or_else(|| VerifyError::SsrfBlocked(format!("no host in {url}")))?
        .to_ascii_lowercase();

    let is_loopback_name = host == "localhost" || host == "127.0.0.1" || host == "[::1]" || host == "::1";
    if url.scheme() != "https" {
        if !(config.allow_loopback_http && url.scheme() == "http" && is_loopback_name) {
            return Err(VerifyError::SsrfBlocked(format!("non-https scheme: {}", url.scheme())));
        }
    }

    if let Ok(ip) = host.parse::<IpAddr>() {
        if !(config.allow_loopback_http && ip.is_loopback()) {
            return Err(VerifyError::SsrfBlocked(format!("literal IP address: {ip}")));
        }
    }

    if is_loopback_name && !config.allow_loopback_http {
        return Err(VerifyError::SsrfBlocked(format!("loopback host: {host}")));
    }

    if host == METADATA_IP || host.starts_with("169.254.") {
        return Err(VerifyError::SsrfBlocked(format!("link-local metadata address: {host}")));
    }

    if !allowlist.is_allowed(&host) {
        return Err(VerifyError::SsrfBlocked(format!("host not in allowlist: {host}")));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> SsrfGuardConfig {
        SsrfGuardConfig::default()
    }

    #[test]
    fn allows_plain_https_host() {
        let url = Url::parse("https://issuer.example/.well-known/jwks").unwrap();
        assert!(check_url(&url, cfg(), &AllowAll).is_ok());
    }

    #[test]
    fn rejects_http_by_default() {
        let url = Url::parse("http://issuer.example/.well-known/jwks").unwrap();
        assert!(check_url(&url, cfg(), &AllowAll).is_err());
    }

    #[test]
    fn allows_loopback_http_in_dev_mode() {
        let url = Url::parse("http://127.0.0.1:8080/.well-known/jwks").unwrap();
        let dev = SsrfGuardConfig { allow_loopback_http: true };
        assert!(check_url(&url, dev, &AllowAll).is_ok());
    }

    #[test]
    fn rejects_literal_ip() {
        let url = Url::parse("https://93.184.216.34/.well-known/jwks").unwrap();
        assert!(check_url(&url, cfg(), &AllowAll).is_err());
    }

    #[test]
    fn rejects_metadata_address() {
        let url = Url::parse("https://169.254.169.254/latest/meta-data").unwrap();
        assert!(check_url(&url, cfg(), &AllowAll).is_err());
    }

    #[test]
    fn rejects_link_local_range() {
        let url = Url::parse("https://169.254.1.1/x").unwrap();
        assert!(check_url(&url, cfg(), &AllowAll).is_err());
    }

    struct DenyAll;
    impl HostAllowlist for DenyAll {
        fn is_allowed(&self, _host: &str) -> bool {
            false
        }
    }

    #[test]
    fn honors_custom_allowlist() {
        let url = Url::parse("https://issuer.example/.well-known/jwks").unwrap();
        assert!(check_url(&url, cfg(), &DenyAll).is_err());
    }
}
