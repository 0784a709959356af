//! HMAC-SHA1 signature primitive.

use base64::Engine;
use hmac::{Hmac, Mac};
use sha1::Sha1;
use thiserror::Error;

type HmacSha1 = Hmac<Sha1>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SignError {
    #[error("encoding error: {0}")]
    Encoding(String),
}

/// HMAC-SHA1 of `message` keyed by `key`, base64-encoded (standard alphabet,
/// padded) as `oauth_signature` expects.
pub fn sign(key: &[u8], message: &str) -> Result<String, SignError> {
    let mut mac =
        HmacSha1::new_from_slice(key).map_err(|e| SignError::Encoding(e.to_string()))?;
    mac.update(message.as_bytes());
    Ok(base64::engine::general_purpose::STANDARD.encode(mac.finalize().into_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rfc2202_test_vector() {
        let sig = sign(b"Jefe", "what do ya want for nothing?").unwrap();
        assert_eq!(sig, "7/zfauXrL6LSdBbV8YTfnCWafHk=");
    }

    #[test]
    fn known_pangram_vector() {
        let sig = sign(b"key", "The quick brown fox jumps over the lazy dog").unwrap();
        assert_eq!(sig, "3nybhbi3iqa8ino29wqQcBydtNk=");
    }

    #[test]
    fn empty_key_is_accepted() {
        let sig = sign(b"", "GET&x&y").unwrap();
        // 20-byte digest → 28 base64 chars with one pad
        assert_eq!(sig.len(), 28);
        assert!(sig.ends_with('='));
    }

    #[test]
    fn key_changes_signature() {
        assert_ne!(sign(b"a&", "msg").unwrap(), sign(b"a&b", "msg").unwrap());
    }
}
