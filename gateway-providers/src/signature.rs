//! Webhook and request signing primitives shared by the adapters.

use hmac::{Hmac, Mac};
use sha2::{Sha256, Sha512};
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;
type HmacSha512 = Hmac<Sha512>;

/// Hex-encoded HMAC-SHA256 of `payload`.
pub fn hmac_sha256_hex(secret: &[u8], payload: &[u8]) -> Option<String> {
    let mut mac = HmacSha256::new_from_slice(secret).ok()?;
    mac.update(payload);
    Some(hex::encode(mac.finalize().into_bytes()))
}

/// Hex-encoded HMAC-SHA512 of `payload`.
pub fn hmac_sha512_hex(secret: &[u8], payload: &[u8]) -> Option<String> {
    let mut mac = HmacSha512::new_from_slice(secret).ok()?;
    mac.update(payload);
    Some(hex::encode(mac.finalize().into_bytes()))
}

/// Constant-time comparison of an expected hex digest with one supplied by
/// a caller. Case-insensitive; surrounding whitespace is ignored.
pub fn hex_digest_matches(expected: &str, provided: &str) -> bool {
    let provided = provided.trim().to_ascii_lowercase();
    if provided.is_empty() {
        return false;
    }
    expected.as_bytes().ct_eq(provided.as_bytes()).into()
}

/// Verifies a hex HMAC-SHA256 signature over the raw body.
pub fn verify_sha256_hex(secret: &str, payload: &[u8], signature: &str) -> bool {
    hmac_sha256_hex(secret.as_bytes(), payload)
        .is_some_and(|expected| hex_digest_matches(&expected, signature))
}

/// Verifies a hex HMAC-SHA512 signature over the raw body.
pub fn verify_sha512_hex(secret: &str, payload: &[u8], signature: &str) -> bool {
    hmac_sha512_hex(secret.as_bytes(), payload)
        .is_some_and(|expected| hex_digest_matches(&expected, signature))
}
