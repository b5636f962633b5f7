//! HMAC-SHA256 request signing.
//!
//! Submissions are signed with the API token and the signature is sent as
//! `X-Hub-Signature-256: sha256=<hex>`, the same scheme Github uses for
//! webhook deliveries.

use api_client::Secret;
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the payload signature.
pub const SIGNATURE_HEADER: &str = "x-hub-signature-256";

const SIGNATURE_PREFIX: &str = "sha256=";

/// Raw HMAC-SHA256 of `payload` keyed with `key`.
pub fn compute_signature(payload: &[u8], key: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC accepts keys of any length");
    mac.update(payload);
    mac.finalize().into_bytes().to_vec()
}

/// Render a signature as a `sha256=<lowercase hex>` header value.
pub fn format_signature_header(signature: &[u8]) -> String {
    format!("{SIGNATURE_PREFIX}{}", hex::encode(signature))
}

/// Sign `payload` with the API token, producing the header value.
pub fn sign(payload: &[u8], secret: &Secret) -> String {
    format_signature_header(&compute_signature(payload, secret.as_bytes()))
}

/// Decode a `sha256=<hex>` header value. `None` if it is malformed.
pub fn parse_signature_header(header: &str) -> Option<Vec<u8>> {
    header
        .strip_prefix(SIGNATURE_PREFIX)
        .and_then(|hex| hex::decode(hex).ok())
}

/// Check a signature header against `payload`, in constant time.
pub fn verify_signature(payload: &[u8], header: &str, key: &[u8]) -> bool {
    let Some(expected) = parse_signature_header(header) else {
        return false;
    };

    let Ok(mut mac) = HmacSha256::new_from_slice(key) else {
        return false;
    };
    mac.update(payload);
    mac.verify_slice(&expected).is_ok()
}
