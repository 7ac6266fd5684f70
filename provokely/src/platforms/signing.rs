//! HMAC-SHA256 verification for Meta webhook deliveries.
//!
//! Meta signs the raw request body with the app secret and sends the result in the
//! `X-Hub-Signature-256` header as `sha256={hex digest}`.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "x-hub-signature-256";

/// Compute the header value for `payload`.
pub fn sign_payload(payload: &[u8], app_secret: &str) -> Option<String> {
    let mut mac = HmacSha256::new_from_slice(app_secret.as_bytes()).ok()?;
    mac.update(payload);
    Some(format!("sha256={}", hex::encode(mac.finalize().into_bytes())))
}

/// Check a `sha256=` header value against the payload.
pub fn verify_signature(payload: &[u8], signature: &str, app_secret: &str) -> bool {
    let Some(provided) = signature.trim().strip_prefix("sha256=") else {
        return false;
    };
    let Ok(provided) = hex::decode(provided) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(app_secret.as_bytes()) else {
        return false;
    };
    mac.update(payload);
    mac.verify_slice(&provided).is_ok()
}
