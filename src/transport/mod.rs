//! # Transport Profiles (C4)
//!
//! Three wire carriers for a receipt JWS — header, pointer, and in-body —
//! auto-detected in fixed precedence (header > pointer > body) and reduced
//! to a single [`ParsedReceipt`] shape so C8 never has to branch on how the
//! receipt arrived.

mod header;
mod pointer;

pub use header::parse_header;
pub use pointer::{parse_pointer, PointerRef};

use std::collections::HashMap;

use serde::Deserialize;

use crate::error::VerifyError;

/// Which carrier a [`ParsedReceipt`] was extracted from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Profile {
    /// `PEAC-Receipt` header.
    Header,
    /// `PEAC-Receipt-Pointer` header plus a fetched body.
    Pointer,
    /// `peac_receipt`/`peac_receipts` JSON body field.
    Body,
}

/// Maximum accepted header value length (`spec.md` §4.10, 413 mapping).
pub const MAX_HEADER_BYTES: usize = 4 * 1024;

/// Maximum accepted body length.
pub const MAX_BODY_BYTES: usize = 256 * 1024;

/// The uniform carrier shape every transport profile reduces to.
#[derive(Clone, Debug)]
pub struct ParsedReceipt {
    /// Which carrier this receipt was read from.
    pub profile: Profile,
    /// One compact JWS (header/body-single) or several (body array).
    pub receipts: Vec<String>,
    /// Present only for [`Profile::Pointer`].
    pub pointer: Option<PointerRef>,
}

/// The subset of a JSON request/response body this module understands.
#[derive(Deserialize)]
struct ReceiptBody {
    #[serde(default)]
    peac_receipt: Option<String>,
    #[serde(default)]
    peac_receipts: Option<Vec<String>>,
}

/// The inputs a caller has available to hand to [`extract`]: a header map
/// view (already lower-cased keys) and an optional raw JSON body.
pub struct RequestCarriers<'a> {
    /// Request/response headers, keyed in lowercase.
    pub headers: &'a HashMap<String, String>,
    /// Raw JSON request body, if any.
    pub body: Option<&'a [u8]>,
}

/// Extract a [`ParsedReceipt`] from `carriers`, honoring header > pointer >
/// body precedence.
///
/// # Errors
///
/// Returns [`VerifyError::RequestTooLarge`] if the header or body exceeds
/// its size limit, or [`VerifyError::InvalidTransport`] if a carrier is
/// present but structurally malformed. Returns `Ok(None)` when no carrier
/// is present at all.
pub fn extract(carriers: &RequestCarriers<'_>) -> Result<Option<ParsedReceipt>, VerifyError> {
    if let Some(raw) = carriers.headers.get("peac-receipt") {
        if raw.len() > MAX_HEADER_BYTES {
            return Err(VerifyError::RequestTooLarge("PEAC-Receipt header".into()));
        }
        let jws = parse_header(raw)?;
        return Ok(Some(ParsedReceipt { profile: Profile::Header, receipts: vec![jws], pointer: None }));
    }

    if let Some(raw) = carriers.headers.get("peac-receipt-pointer") {
        if raw.len() > MAX_HEADER_BYTES {
            return Err(VerifyError::RequestTooLarge("PEAC-Receipt-Pointer header".into()));
        }
        let pointer = parse_pointer(raw)?;
        return Ok(Some(ParsedReceipt { profile: Profile::Pointer, receipts: Vec::new(), pointer: Some(pointer) }));
    }

    if let Some(body) = carriers.body {
        if body.len() > MAX_BODY_BYTES {
            return Err(VerifyError::RequestTooLarge("request body".into()));
        }
        let parsed: ReceiptBody = serde_json::from_slice(body)
            .map_err(|e| VerifyError::InvalidTransport(format!("body: {e}")))?;
        let receipts = match (parsed.peac_receipts, parsed.peac_receipt) {
            (Some(many), _) => {
                if many.is_empty() {
                    return Err(VerifyError::InvalidTransport("peac_receipts is empty".into()));
                }
                many
            }
            (None, Some(one)) => vec![one],
            (None, None) => return Ok(None),
        };
        return Ok(Some(ParsedReceipt { profile: Profile::Body, receipts, pointer: None }));
    }

    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| ((*k).to_string(), (*v).to_string())).collect()
    }

    #[test]
    fn header_wins_over_pointer_and_body() {
        let hdrs = headers(&[
            ("peac-receipt", "aaaa.bbbb.cccc"),
            ("peac-receipt-pointer", r#"sha256="ab", url="https://p.example/r""#),
        ]);
        let carriers = RequestCarriers { headers: &hdrs, body: Some(br#"{"peac_receipt":"xxxx.yyyy.zzzz"}"#) };
        let parsed = extract(&carriers).unwrap().unwrap();
        assert_eq!(parsed.profile, Profile::Header);
    }

    #[test]
    fn pointer_wins_over_body() {
        let hdrs = headers(&[(
            "peac-receipt-pointer",
            r#"sha256="0000000000000000000000000000000000000000000000000000000000000000", url="https://p.example/r""#,
        )]);
        let carriers = RequestCarriers { headers: &hdrs, body: Some(br#"{"peac_receipt":"xxxx.yyyy.zzzz"}"#) };
        let parsed = extract(&carriers).unwrap().unwrap();
        assert_eq!(parsed.profile, Profile::Pointer);
    }

    #[test]
    fn body_array_wins_over_single_field() {
        let hdrs = headers(&[]);
        let body = br#"{"peac_receipt":"single","peac_receipts":["a.b.c","d.e.f"]}"#;
        let carriers = RequestCarriers { headers: &hdrs, body: Some(body) };
        let parsed = extract(&carriers).unwrap().unwrap();
        assert_eq!(parsed.receipts, vec!["a.b.c".to_string(), "d.e.f".to_string()]);
    }

    #[test]
    fn empty_body_array_is_rejected() {
        let hdrs = headers(&[]);
        let body = br#"{"peac_receipts":[]}"#;
        let carriers = RequestCarriers { headers: &hdrs, body: Some(body) };
        assert!(extract(&carriers).is_err());
    }

    #[test]
    fn no_carrier_present_yields_none() {
        let hdrs = headers(&[]);
        let carriers = RequestCarriers { headers: &hdrs, body: None };
        assert!(extract(&carriers).unwrap().is_none());
    }

    #[test]
    fn oversized_header_is_rejected() {
        let huge = "a".repeat(MAX_HEADER_BYTES + 1);
        let hdrs = headers(&[("peac-receipt", huge.as_str())]);
        let carriers = RequestCarriers { headers: &hdrs, body: None };
        assert!(matches!(extract(&carriers), Err(VerifyError::RequestTooLarge(_))));
    }
}
