//! # Core Utilities
//!
//! Small, dependency-light helpers shared across every other module:
//! absolute-origin normalization and a permissive JSON value wrapper used by
//! the `ext` claim slot.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::VerifyError;

/// An extension payload: either a bare string or a structured object.
///
/// Receipts are free to attach versioned extensions (e.g.
/// `org.peacprotocol/interaction@0.1`) whose payload shape is opaque to the
/// core; `ExtValue` lets serde round-trip either representation without the
/// core needing to know the schema.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum ExtValue {
    /// Simple string payload.
    String(String),

    /// Structured object payload.
    Object(serde_json::Map<String, serde_json::Value>),
}

/// Normalize an issuer/audience origin: lowercase host, strip a trailing
/// slash, and require `https`.
///
/// # Errors
///
/// Returns [`VerifyError::SchemaValidationFailed`] if `raw` is not an
/// absolute URI with scheme and host, or if the scheme is not `https`
/// (`http` is tolerated only for `localhost`/`127.0.0.1`, to support local
/// development issuers).
pub fn normalize_origin(raw: &str) -> Result<String, VerifyError> {
    let trimmed = raw.trim_end_matches('/');
    let url = Url::parse(trimmed)
        .map_err(|e| VerifyError::SchemaValidationFailed(format!("invalid origin {raw}: {e}")))?;

    let host = url
        .host_str()
        .ok_or_else(|| VerifyError::SchemaValidationFailed(format!("origin missing host: {raw}")))?
        .to_ascii_lowercase();

    let is_loopback = host == "localhost" || host == "127.0.0.1" || host == "[::1]";
    if url.scheme() != "https" && !(url.scheme() == "http" && is_loopback) {
        return Err(VerifyError::SchemaValidationFailed(format!(
            "origin must use https: {raw}"
        )));
    }
    if url.path() != "/" && !url.path().is_empty() {
        return Err(VerifyError::SchemaValidationFailed(format!(
            "origin must not carry a path: {raw}"
        )));
    }

    let mut out = format!("{}://{host}", url.scheme());
    if let Some(port) = url.port() {
        out.push_str(&format!(":{port}"));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_trailing_slash_and_case() {
        assert_eq!(normalize_origin("https://P.Example/").unwrap(), "https://p.example");
    }

    #[test]
    fn rejects_path_component() {
        assert!(normalize_origin("https://p.example/foo").is_err());
    }

    #[test]
    fn rejects_plain_http_for_non_loopback() {
        assert!(normalize_origin("http://p.example").is_err());
    }

    #[test]
    fn allows_http_loopback() {
        assert_eq!(normalize_origin("http://localhost:8080").unwrap(), "http://localhost:8080");
    }
}
