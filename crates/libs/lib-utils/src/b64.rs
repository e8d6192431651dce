//! # Base64url Key Encoding
//!
//! Store keys are arbitrary strings (`cache:GET /predictions?limit=5`), which
//! cannot be used as file names directly. They are encoded with the URL-safe
//! alphabet without padding, so the result only contains `[A-Za-z0-9_-]`.

use base64::{Engine as _, engine::general_purpose};

/// Encode bytes to base64 URL-safe string (no padding).
pub fn b64u_encode(content: impl AsRef<[u8]>) -> String {
    general_purpose::URL_SAFE_NO_PAD.encode(content)
}

/// Decode a base64 URL-safe string back into the original UTF-8 key.
pub fn b64u_decode_to_string(b64u: &str) -> Result<String, Error> {
    let bytes = general_purpose::URL_SAFE_NO_PAD
        .decode(b64u)
        .map_err(|_| Error::FailToB64uDecode(b64u.to_string()))?;
    String::from_utf8(bytes).map_err(|_| Error::FailToB64uDecode(b64u.to_string()))
}

// region:    --- Error
#[derive(Debug)]
pub enum Error {
    FailToB64uDecode(String),
}

impl std::fmt::Display for Error {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(fmt, "{self:?}")
    }
}

impl std::error::Error for Error {}
// endregion: --- Error

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encoded_key_is_file_safe() {
        let encoded = b64u_encode("cache:GET /predictions?limit=5&sort=desc");
        assert!(encoded
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn test_decode_restores_original_key() {
        let key = "cache:/portfolio/☀";
        assert_eq!(b64u_decode_to_string(&b64u_encode(key)).unwrap(), key);
    }

    #[test]
    fn test_decode_rejects_foreign_file_names() {
        assert!(b64u_decode_to_string("not base64!").is_err());
    }
}
