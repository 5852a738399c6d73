use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Expected value of the form provider's signature header for `body`:
/// `sha256=` followed by the base64 HMAC-SHA256 of the raw payload.
pub fn sign_payload(secret: &str, body: &[u8]) -> Option<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(body);
    Some(format!("sha256={}", BASE64.encode(mac.finalize().into_bytes())))
}

pub fn verify_payload_signature(secret: &str, body: &[u8], header: &str) -> bool {
    let Some(expected) = sign_payload(secret, body) else {
        return false;
    };
    expected.as_bytes().ct_eq(header.trim().as_bytes()).into()
}
