//! Webhook request authentication with HMAC-SHA256 signatures.
//!
//! Provides:
//! - `verify_signature()` -- checks `X-Cadence-Signature: sha256=<hex>` against a trigger secret
//! - `compute_signature()` -- produces the header value a sender should attach
//! - `authorize_target()` -- the per-trigger predicate handed to the manager's webhook dispatch

use cadence_core::workflow::trigger::WebhookTarget;
use hmac::{Hmac, Mac};
use sha2::Sha256;

// Type alias for HMAC-SHA256
type HmacSha256 = Hmac<Sha256>;

/// Header carrying the body signature.
pub const SIGNATURE_HEADER: &str = "x-cadence-signature";

const SIGNATURE_PREFIX: &str = "sha256=";

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors that can occur during webhook authentication.
#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    /// The signature header was absent while the trigger has a secret.
    #[error("missing {SIGNATURE_HEADER} header")]
    MissingSignature,

    /// The header was present but not `sha256=<hex>`.
    #[error("malformed signature: {0}")]
    MalformedSignature(String),

    /// HMAC signature verification failed.
    #[error("HMAC signature verification failed")]
    HmacVerificationFailed,

    /// Invalid HMAC key.
    #[error("invalid HMAC key: {0}")]
    InvalidKey(String),
}

// ---------------------------------------------------------------------------
// Verification
// ---------------------------------------------------------------------------

/// Verify a `sha256=<hex>` signature header against the raw request body.
///
/// The MAC comparison is constant-time (via the hmac crate's `verify_slice`).
pub fn verify_signature(
    secret: &str,
    body: &[u8],
    header: Option<&str>,
) -> Result<(), WebhookError> {
    let header = header.ok_or(WebhookError::MissingSignature)?;
    let hex_sig = header
        .trim()
        .strip_prefix(SIGNATURE_PREFIX)
        .ok_or_else(|| WebhookError::MalformedSignature(format!("expected '{SIGNATURE_PREFIX}' prefix")))?;
    let expected = hex_decode(hex_sig)
        .ok_or_else(|| WebhookError::MalformedSignature("signature is not hex".to_string()))?;

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| WebhookError::InvalidKey(e.to_string()))?;
    mac.update(body);
    mac.verify_slice(&expected)
        .map_err(|_| WebhookError::HmacVerificationFailed)
}

/// Compute the `sha256=<hex>` header value for `body` under `secret`.
pub fn compute_signature(secret: &str, body: &[u8]) -> Result<String, WebhookError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| WebhookError::InvalidKey(e.to_string()))?;
    mac.update(body);
    Ok(format!(
        "{SIGNATURE_PREFIX}{}",
        hex_encode(&mac.finalize().into_bytes())
    ))
}

/// Decide whether a request may launch `target`.
///
/// Triggers without a secret accept any request; triggers with one require
/// a valid signature.
pub fn authorize_target(target: &WebhookTarget, body: &[u8], header: Option<&str>) -> bool {
    let Some(secret) = target.secret.as_deref().filter(|s| !s.is_empty()) else {
        return true;
    };
    match verify_signature(secret, body, header) {
        Ok(()) => true,
        Err(err) => {
            tracing::debug!(
                workflow_id = %target.workflow_id,
                trigger_id = %target.trigger_id,
                error = %err,
                "webhook signature rejected"
            );
            false
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn hex_decode(hex: &str) -> Option<Vec<u8>> {
    if hex.len() % 2 != 0 || !hex.is_ascii() {
        return None;
    }
    (0..hex.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&hex[i..i + 2], 16).ok())
        .collect()
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn target(secret: Option<&str>) -> WebhookTarget {
        WebhookTarget {
            workflow_id: Uuid::now_v7(),
            trigger_id: "hook".to_string(),
            secret: secret.map(str::to_string),
        }
    }

    #[test]
    fn test_round_trip_signature_verifies() {
        let body = br#"{"ref":"main"}"#;
        let header = compute_signature("s3cret", body).unwrap();
        assert!(header.starts_with("sha256="));
        assert!(verify_signature("s3cret", body, Some(&header)).is_ok());
    }

    #[test]
    fn test_wrong_body_or_secret_rejected() {
        let header = compute_signature("s3cret", b"payload").unwrap();
        assert!(matches!(
            verify_signature("s3cret", b"tampered", Some(&header)),
            Err(WebhookError::HmacVerificationFailed)
        ));
        assert!(matches!(
            verify_signature("other", b"payload", Some(&header)),
            Err(WebhookError::HmacVerificationFailed)
        ));
    }

    #[test]
    fn test_rfc4231_vector2() {
        // RFC 4231 test case 2: key "Jefe", data "what do ya want for nothing?"
        let header = compute_signature("Jefe", b"what do ya want for nothing?").unwrap();
        assert_eq!(
            header,
            "sha256=5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }

    #[test]
    fn test_missing_and_malformed_headers() {
        assert!(matches!(
            verify_signature("k", b"x", None),
            Err(WebhookError::MissingSignature)
        ));
        assert!(matches!(
            verify_signature("k", b"x", Some("md5=abcd")),
            Err(WebhookError::MalformedSignature(_))
        ));
        assert!(matches!(
            verify_signature("k", b"x", Some("sha256=zz")),
            Err(WebhookError::MalformedSignature(_))
        ));
        assert!(matches!(
            verify_signature("k", b"x", Some("sha256=abc")),
            Err(WebhookError::MalformedSignature(_))
        ));
    }

    #[test]
    fn test_authorize_target() {
        let body = b"{}";
        assert!(authorize_target(&target(None), body, None));
        assert!(authorize_target(&target(Some("")), body, None));

        let secured = target(Some("k"));
        assert!(!authorize_target(&secured, body, None));
        let header = compute_signature("k", body).unwrap();
        assert!(authorize_target(&secured, body, Some(&header)));
    }
}
