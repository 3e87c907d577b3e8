//! Webhook signature verification
//!
//! The platform signs each webhook body with HMAC-SHA256 over the raw bytes,
//! hex-encoded in the `X-Signature` header. Verification must run against
//! the exact bytes received, before any JSON parsing.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use therapay_core::{AppError, AppResult};
use tracing::warn;

type HmacSha256 = Hmac<Sha256>;

/// Compute the hex-encoded HMAC-SHA256 signature for a payload
pub fn compute_signature(secret: &str, payload: &[u8]) -> AppResult<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| {
        warn!("Invalid webhook secret key");
        AppError::InvalidSignature
    })?;
    mac.update(payload);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Verify a hex-encoded webhook signature against the raw body
///
/// Comparison is constant-time via `Mac::verify_slice`.
pub fn verify_signature(secret: &str, payload: &[u8], signature: &str) -> AppResult<()> {
    let expected = hex::decode(signature.trim()).map_err(|_| {
        warn!("Webhook signature is not valid hex");
        AppError::InvalidSignature
    })?;

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| {
        warn!("Invalid webhook secret key");
        AppError::InvalidSignature
    })?;
    mac.update(payload);

    mac.verify_slice(&expected).map_err(|_| {
        warn!("Webhook signature mismatch");
        AppError::InvalidSignature
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-webhook-secret";

    #[test]
    fn test_valid_signature_round_trip() {
        let payload = br#"{"type": "call.ended", "call_cid": "default:abc"}"#;
        let signature = compute_signature(SECRET, payload).unwrap();
        assert!(verify_signature(SECRET, payload, &signature).is_ok());
    }

    #[test]
    fn test_wrong_secret_fails() {
        let payload = b"payload";
        let signature = compute_signature(SECRET, payload).unwrap();
        assert!(verify_signature("other-secret", payload, &signature).is_err());
    }

    #[test]
    fn test_tampered_payload_fails() {
        let signature = compute_signature(SECRET, b"original").unwrap();
        assert!(verify_signature(SECRET, b"tampered", &signature).is_err());
    }

    #[test]
    fn test_non_hex_signature_fails() {
        assert!(verify_signature(SECRET, b"payload", "not-hex!").is_err());
    }

    #[test]
    fn test_whitespace_around_signature_is_tolerated() {
        let payload = b"payload";
        let signature = format!(" {} ", compute_signature(SECRET, payload).unwrap());
        assert!(verify_signature(SECRET, payload, &signature).is_ok());
    }
}
