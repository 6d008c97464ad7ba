//! The `PEAC-Receipt-Pointer: sha256="…", url="…"` carrier: the receipt JWS
//! itself is too large for a header, so the header instead points at an
//! HTTPS URL whose body must hash to the declared digest.

use std::collections::HashMap;

use regex::Regex;
use std::sync::LazyLock;

use crate::error::VerifyError;

/// A parsed `PEAC-Receipt-Pointer` header value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PointerRef {
    /// Declared SHA-256 digest of the fetched body, lowercase hex.
    pub sha256: String,
    /// HTTPS URL to fetch the JWS from.
    pub url: String,
    /// Forward-compatible `ext_*` parameters, key with the `ext_` prefix
    /// stripped.
    pub ext: HashMap<String, String>,
}

static HEX64: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[0-9a-f]{64}$").unwrap());

/// Lets a pointer header name a loopback `http://` target structurally; the
/// actual SSRF guard still rejects it unless the caller opted into
/// `allow_loopback_http` (off by default), so this never loosens production
/// behavior, only what a local test server can point at.
fn is_loopback_http(url: &str) -> bool {
    url.starts_with("http://127.0.0.1") || url.starts_with("http://localhost") || url.starts_with("http://[::1]")
}

/// Parse a `PEAC-Receipt-Pointer` header value into a [`PointerRef`].
///
/// # Errors
///
/// Returns [`VerifyError::InvalidTransport`] if a parameter is duplicated,
/// an unknown non-`ext_*` parameter is present, `sha256` is not 64 lowercase
/// hex characters, `url` is missing, or `url` is neither `https` nor a
/// loopback `http` target (the latter is still subject to the SSRF guard at
/// dereference time).
pub fn parse_pointer(raw: &str) -> Result<PointerRef, VerifyError> {
    let mut seen: HashMap<String, String> = HashMap::new();
    for part in split_params(raw) {
        let (key, value) = split_param(&part)?;
        if seen.insert(key.clone(), value).is_some() {
            return Err(VerifyError::InvalidTransport(format!("duplicate pointer parameter `{key}`")));
        }
    }

    let sha256 = seen
        .remove("sha256")
        .ok_or_else(|| VerifyError::InvalidTransport("pointer missing `sha256`".into()))?;
    if !HEX64.is_match(&sha256) {
        return Err(VerifyError::InvalidTransport("pointer `sha256` is not 64 lowercase hex chars".into()));
    }

    let url = seen.remove("url").ok_or_else(|| VerifyError::InvalidTransport("pointer missing `url`".into()))?;
    if !url.starts_with("https://") && !is_loopback_http(&url) {
        return Err(VerifyError::InvalidTransport("pointer `url` must be https".into()));
    }

    let mut ext = HashMap::new();
    for (key, value) in seen {
        if let Some(stripped) = key.strip_prefix("ext_") {
            ext.insert(stripped.to_string(), value);
        } else {
            return Err(VerifyError::InvalidTransport(format!("unknown pointer parameter `{key}`")));
        }
    }

    Ok(PointerRef { sha256, url, ext })
}

fn split_params(raw: &str) -> Vec<String> {
    // Parameters are comma-separated, but commas can appear inside quoted
    // values, so we track quote state rather than doing a naive split.
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    for c in raw.chars() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
                current.push(c);
            }
            ',' if !in_quotes => {
                parts.push(current.trim().to_string());
                current = String::new();
            }
            _ => current.push(c),
        }
    }
    if !current.trim().is_empty() {
        parts.push(current.trim().to_string());
    }
    parts
}

fn split_param(part: &str) -> Result<(String, String), VerifyError> {
    let (key, value) = part
        .split_once('=')
        .ok_or_else(|| VerifyError::InvalidTransport(format!("malformed pointer parameter `{part}`")))?;
    let key = key.trim().to_ascii_lowercase();
    let value = value.trim();
    let unquoted = value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .ok_or_else(|| VerifyError::InvalidTransport(format!("pointer parameter `{key}` must be quoted")))?;
    Ok((key, unquoted.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const DIGEST: &str = "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b85";

    #[test]
    fn parses_minimal_pointer() {
        let raw = format!(r#"sha256="{DIGEST}", url="https://p.example/r""#);
        let p = parse_pointer(&raw).unwrap();
        assert_eq!(p.sha256, DIGEST);
        assert_eq!(p.url, "https://p.example/r");
        assert!(p.ext.is_empty());
    }

    #[test]
    fn captures_ext_parameters() {
        let raw = format!(r#"sha256="{DIGEST}", url="https://p.example/r", ext_region="us""#);
        let p = parse_pointer(&raw).unwrap();
        assert_eq!(p.ext.get("region"), Some(&"us".to_string()));
    }

    #[test]
    fn rejects_duplicate_parameter() {
        let raw = format!(r#"sha256="{DIGEST}", sha256="{DIGEST}", url="https://p.example/r""#);
        assert!(parse_pointer(&raw).is_err());
    }

    #[test]
    fn rejects_unknown_non_ext_parameter() {
        let raw = format!(r#"sha256="{DIGEST}", url="https://p.example/r", bogus="x""#);
        assert!(parse_pointer(&raw).is_err());
    }

    #[test]
    fn rejects_non_https_url() {
        let raw = format!(r#"sha256="{DIGEST}", url="http://p.example/r""#);
        assert!(parse_pointer(&raw).is_err());
    }

    #[test]
    fn accepts_loopback_http_url() {
        let raw = format!(r#"sha256="{DIGEST}", url="http://127.0.0.1:8080/r""#);
        let p = parse_pointer(&raw).unwrap();
        assert_eq!(p.url, "http://127.0.0.1:8080/r");
    }

    #[test]
    fn rejects_malformed_digest() {
        let raw = r#"sha256="not-hex", url="https://p.example/r""#;
        assert!(parse_pointer(raw).is_err());
    }
}
