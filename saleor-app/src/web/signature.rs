//! Webhook signature verification.
//!
//! The platform signs every webhook body with HMAC-SHA256 using the secret
//! key generated at installation time, and sends the hex digest in the
//! signature header.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::warn;

type HmacSha256 = Hmac<Sha256>;

/// Compute the hex signature the platform sends for `body`.
///
/// Returns `None` only if the key is rejected by the MAC.
pub fn compute_signature(secret_key: &str, body: &[u8]) -> Option<String> {
    let mut mac = HmacSha256::new_from_slice(secret_key.as_bytes()).ok()?;
    mac.update(body);
    Some(hex::encode(mac.finalize().into_bytes()))
}

/// Verify a webhook body against the signature header.
///
/// The comparison runs in constant time. Returns `false` for empty inputs or
/// a signature that is not valid hex.
pub fn verify_signature(secret_key: &str, body: &[u8], signature: &str) -> bool {
    if secret_key.is_empty() || signature.is_empty() {
        warn!(
            has_secret_key = !secret_key.is_empty(),
            has_signature = !signature.is_empty(),
            "webhook_signature_missing_fields"
        );
        return false;
    }

    let provided = match hex::decode(signature.trim()) {
        Ok(bytes) => bytes,
        Err(_) => {
            warn!(signature_length = signature.len(), "webhook_signature_not_hex");
            return false;
        }
    };

    let mut mac = match HmacSha256::new_from_slice(secret_key.as_bytes()) {
        Ok(m) => m,
        Err(_) => {
            warn!("webhook_signature_invalid_key");
            return false;
        }
    };
    mac.update(body);

    let valid = mac.verify_slice(&provided).is_ok();

    if !valid {
        warn!(
            body_length = body.len(),
            signature_length = signature.len(),
            "webhook_signature_mismatch"
        );
    }

    valid
}

#[cfg(test)]
mod tests {
    use super::*;

    const BODY: &[u8] = br#"[{"id":"T3JkZXI6MQ=="}]"#;

    #[test]
    fn test_verify_signature_valid() {
        let signature = compute_signature("webhook-secret", BODY).unwrap();
        assert_eq!(signature.len(), 64);
        assert!(verify_signature("webhook-secret", BODY, &signature));
    }

    #[test]
    fn test_verify_signature_uppercase_hex() {
        let signature = compute_signature("webhook-secret", BODY).unwrap().to_uppercase();
        assert!(verify_signature("webhook-secret", BODY, &signature));
    }

    #[test]
    fn test_verify_signature_wrong_key() {
        let signature = compute_signature("other-secret", BODY).unwrap();
        assert!(!verify_signature("webhook-secret", BODY, &signature));
    }

    #[test]
    fn test_verify_signature_tampered_body() {
        let signature = compute_signature("webhook-secret", BODY).unwrap();
        assert!(!verify_signature("webhook-secret", b"[]", &signature));
    }

    #[test]
    fn test_verify_signature_missing_fields() {
        let signature = compute_signature("webhook-secret", BODY).unwrap();
        assert!(!verify_signature("", BODY, &signature));
        assert!(!verify_signature("webhook-secret", BODY, ""));
    }

    #[test]
    fn test_verify_signature_not_hex() {
        assert!(!verify_signature("webhook-secret", BODY, "zz-not-hex"));
        assert!(!verify_signature("webhook-secret", BODY, "abcd"));
    }
}
