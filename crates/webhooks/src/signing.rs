//! Payload authentication: HMAC-SHA256 over the exact body bytes sent,
//! carried as `X-Webhook-Signature: sha256=<hex>` (GitHub-style).

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "X-Webhook-Signature";

/// Compute the signature header value for a body.
pub fn sign_payload(secret: &str, body: &[u8]) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(body);
    format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
}

/// Verify a received signature header against a body. Constant-time
/// comparison; accepts the value with or without the `sha256=` prefix.
pub fn verify_signature(secret: &str, body: &[u8], header_value: &str) -> bool {
    let received = header_value.strip_prefix("sha256=").unwrap_or(header_value);
    let expected = sign_payload(secret, body);
    let expected = expected.strip_prefix("sha256=").unwrap_or(&expected);
    expected.as_bytes().ct_eq(received.as_bytes()).unwrap_u8() == 1
}
