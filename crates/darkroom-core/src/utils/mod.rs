//! Utility functions

use percent_encoding::percent_decode_str;

use crate::{Error, Result};

/// Decode an object key as it appears in blob-store notifications.
///
/// Keys arrive URL-encoded and may contain spaces or non-ASCII characters.
/// `+` must be normalized to a space before percent-decoding.
pub fn decode_object_key(raw: &str) -> Result<String> {
    let spaced = raw.replace('+', " ");
    let decoded = percent_decode_str(&spaced)
        .decode_utf8()
        .map_err(|e| Error::KeyDecode(e.to_string()))?
        .into_owned();

    if decoded.is_empty() {
        return Err(Error::EmptyObjectKey);
    }

    Ok(decoded)
}

/// Render the store path for an object ("s3://bucket/key")
pub fn store_uri(bucket: &str, key: &str) -> String {
    format!("s3://{}/{}", bucket, key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_plus_and_percent() {
        assert_eq!(decode_object_key("summer+holiday.png").unwrap(), "summer holiday.png");
        assert_eq!(decode_object_key("summer%20holiday.png").unwrap(), "summer holiday.png");
        assert_eq!(decode_object_key("caf%C3%A9.jpeg").unwrap(), "café.jpeg");
    }

    #[test]
    fn test_decode_plain_key_is_unchanged() {
        assert_eq!(decode_object_key("photo.png").unwrap(), "photo.png");
    }

    #[test]
    fn test_decode_empty_key() {
        assert!(matches!(decode_object_key(""), Err(Error::EmptyObjectKey)));
    }

    #[test]
    fn test_decode_invalid_utf8() {
        // %FF alone is not valid UTF-8
        assert!(matches!(decode_object_key("%FF.png"), Err(Error::KeyDecode(_))));
    }

    #[test]
    fn test_store_uri() {
        assert_eq!(store_uri("b", "photo.png"), "s3://b/photo.png");
    }
}
