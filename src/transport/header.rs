//! The `PEAC-Receipt: <compact JWS>` header carrier.

use crate::error::VerifyError;

/// Validate and return the compact JWS carried in a `PEAC-Receipt` header
/// value.
///
/// # Errors
///
/// Returns [`VerifyError::InvalidJwsFormat`] if `raw` does not split into
/// exactly three non-empty, base64url-shaped segments.
pub fn parse_header(raw: &str) -> Result<String, VerifyError> {
    let trimmed = raw.trim();
    let segments: Vec<&str> = trimmed.split('.').collect();
    if segments.len() != 3 {
        return Err(VerifyError::InvalidJwsFormat(format!(
            "expected 3 JWS segments, got {}",
            segments.len()
        )));
    }
    if segments.iter().any(|s| s.is_empty()) {
        return Err(VerifyError::InvalidJwsFormat("empty JWS segment".into()));
    }
    if segments.iter().any(|s| !s.bytes().all(is_base64url_byte)) {
        return Err(VerifyError::InvalidJwsFormat("non-base64url character in JWS".into()));
    }
    Ok(trimmed.to_string())
}

fn is_base64url_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'-' || b == b'_'
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_well_formed_jws() {
        assert_eq!(parse_header("aaaa.bbbb.cccc").unwrap(), "aaaa.bbbb.cccc");
    }

    #[test]
    fn rejects_wrong_segment_count() {
        assert!(parse_header("aaaa.bbbb").is_err());
    }

    #[test]
    fn rejects_empty_segment() {
        assert!(parse_header("aaaa..cccc").is_err());
    }

    #[test]
    fn rejects_non_base64url_character() {
        assert!(parse_header("aaaa.b bb.cccc").is_err());
    }
}
