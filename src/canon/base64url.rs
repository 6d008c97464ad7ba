//! Unpadded base64url codec ([RFC 4648] §5).
//!
//! Encoding always emits the unpadded form; decoding accepts both padded and
//! unpadded input so that receipts produced by implementations with looser
//! padding discipline still verify.
//!
//! [RFC 4648]: https://www.rfc-editor.org/rfc/rfc4648#section-5

use base64ct::{Base64UrlUnpadded, Encoding};
use thiserror::Error;

/// Errors returned by [`decode`].
#[derive(Error, Debug)]
#[error("invalid base64url: {0}")]
pub struct DecodeError(String);

/// Encode `bytes` as unpadded base64url.
#[must_use]
pub fn encode(bytes: &[u8]) -> String {
    Base64UrlUnpadded::encode_string(bytes)
}

/// Decode `input`, accepting either padded or unpadded base64url.
///
/// # Errors
///
/// Returns [`DecodeError`] if `input` is valid in neither form.
pub fn decode(input: &str) -> Result<Vec<u8>, DecodeError> {
    if let Ok(bytes) = Base64UrlUnpadded::decode_vec(input) {
        return Ok(bytes);
    }
    let trimmed = input.trim_end_matches('=');
    Base64UrlUnpadded::decode_vec(trimmed)
        .map_err(|e| DecodeError(format!("{e} (input length {})", input.len())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_emits_no_padding() {
        let out = encode(b"any carnal pleasure.");
        assert!(!out.contains('='));
    }

    #[test]
    fn round_trips_arbitrary_bytes() {
        let data = b"\x00\x01\x02\xff\xfe\xfd hello world";
        let encoded = encode(data);
        assert_eq!(decode(&encoded).unwrap(), data);
    }

    #[test]
    fn decodes_padded_input() {
        let unpadded = encode(b"f");
        let padded = format!("{unpadded}===");
        assert_eq!(decode(&padded).unwrap(), decode(&unpadded).unwrap());
    }

    #[test]
    fn rejects_invalid_alphabet() {
        assert!(decode("not base64url!!!").is_err());
    }
}
