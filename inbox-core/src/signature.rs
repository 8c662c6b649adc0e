use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("missing signature header")]
    MissingSignature,
    #[error("signature does not match payload")]
    InvalidSignature,
    #[error("no webhook secret configured for platform")]
    UnconfiguredSecret,
}

/// Verify an HMAC-SHA256 webhook signature against the raw request body.
/// Accepts the bare hex digest or the `sha256=<hex>` form platforms send
/// in their signature headers. Runs before any payload parsing.
pub fn verify_webhook_signature(
    secret: &str,
    body: &[u8],
    provided: &str,
) -> Result<(), SignatureError> {
    let hex_digest = provided.strip_prefix("sha256=").unwrap_or(provided);

    let digest = hex::decode(hex_digest).map_err(|_| SignatureError::InvalidSignature)?;

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| SignatureError::UnconfiguredSecret)?;
    mac.update(body);

    mac.verify_slice(&digest)
        .map_err(|_| SignatureError::InvalidSignature)
}

/// Compute the `sha256=<hex>` signature for a payload. Used by tests and
/// by local tooling that replays captured webhook deliveries.
pub fn sign_webhook_body(secret: &str, body: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("HMAC accepts keys of any length");
    mac.update(body);
    format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_signature() {
        let secret = "app-secret";
        let body = br#"{"entry":[{"id":"123"}]}"#;
        let signature = sign_webhook_body(secret, body);

        assert!(verify_webhook_signature(secret, body, &signature).is_ok());
    }

    #[test]
    fn test_bare_hex_accepted() {
        let secret = "app-secret";
        let body = b"payload";
        let signature = sign_webhook_body(secret, body);
        let bare = signature.strip_prefix("sha256=").unwrap();

        assert!(verify_webhook_signature(secret, body, bare).is_ok());
    }

    #[test]
    fn test_tampered_body_rejected() {
        let secret = "app-secret";
        let signature = sign_webhook_body(secret, b"original");

        assert_eq!(
            verify_webhook_signature(secret, b"tampered", &signature),
            Err(SignatureError::InvalidSignature)
        );
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let body = b"payload";
        let signature = sign_webhook_body("secret-a", body);

        assert_eq!(
            verify_webhook_signature("secret-b", body, &signature),
            Err(SignatureError::InvalidSignature)
        );
    }

    #[test]
    fn test_garbage_signature_rejected() {
        assert_eq!(
            verify_webhook_signature("secret", b"payload", "sha256=not-hex"),
            Err(SignatureError::InvalidSignature)
        );
    }
}
