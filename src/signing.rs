//! HMAC-SHA256 signatures for outbound webhook bodies.
//!
//! The signature covers the exact serialized body bytes and is sent as a
//! lowercase hex string in `X-Webhook-Signature`.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SignError {
    #[error("subscription secret is empty")]
    EmptySecret,
}

/// Sign `payload` with a subscriber secret.
///
/// An empty or whitespace-only secret is rejected so that a request is
/// never sent with a signature anyone could forge.
pub fn sign_payload(payload: &[u8], secret: &str) -> Result<String, SignError> {
    if secret.trim().is_empty() {
        return Err(SignError::EmptySecret);
    }

    // HMAC accepts keys of any length, so construction cannot fail here.
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| SignError::EmptySecret)?;
    mac.update(payload);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Check a hex signature produced by [`sign_payload`].
pub fn verify_signature(payload: &[u8], secret: &str, signature_hex: &str) -> bool {
    let Ok(expected) = sign_payload(payload, secret) else {
        return false;
    };
    let provided = signature_hex.trim().to_ascii_lowercase();
    expected.as_bytes().ct_eq(provided.as_bytes()).into()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn signature_is_deterministic_lowercase_hex() {
        let body = br#"{"event_type":"journal.created"}"#;
        let first = sign_payload(body, "s3cret").unwrap();
        let second = sign_payload(body, "s3cret").unwrap();

        assert_eq!(first, second);
        assert_eq!(first.len(), 64);
        assert!(first.chars().all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
    }

    #[test]
    fn matches_rfc_4231_test_case_2() {
        let sig = sign_payload(b"what do ya want for nothing?", "Jefe").unwrap();
        assert_eq!(
            sig,
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }

    #[test]
    fn different_secrets_give_different_signatures() {
        let body = b"{}";
        assert_ne!(
            sign_payload(body, "a").unwrap(),
            sign_payload(body, "b").unwrap()
        );
    }

    #[test]
    fn empty_secret_is_rejected() {
        assert_eq!(sign_payload(b"{}", ""), Err(SignError::EmptySecret));
        assert_eq!(sign_payload(b"{}", "   "), Err(SignError::EmptySecret));
    }

    #[test]
    fn verify_accepts_own_signature_and_rejects_tampering() {
        let body = br#"{"a":1}"#;
        let sig = sign_payload(body, "k").unwrap();

        assert!(verify_signature(body, "k", &sig));
        assert!(verify_signature(body, "k", &sig.to_uppercase()));
        assert!(!verify_signature(br#"{"a":2}"#, "k", &sig));
        assert!(!verify_signature(body, "other", &sig));
        assert!(!verify_signature(body, "", &sig));
    }
}
