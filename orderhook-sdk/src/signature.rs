//! Signature verification for inbound payment-processor webhooks.
//!
//! The processor signs every notification with a shared key and sends the
//! base64 digest in one of two headers:
//!
//! ```text
//! x-square-hmacsha256-signature: base64(HMAC-SHA256(raw_body, key))
//! x-square-signature:            base64(HMAC-SHA1(raw_body, key))    (legacy)
//! ```
//!
//! Some integrations sign the notification URL followed by the body instead
//! of the bare body, so the SHA-256 scheme retries with
//! `HMAC-SHA256("{notification_url}{raw_body}", key)` when a notification URL
//! is known.
//!
//! All digests are computed over the body bytes exactly as they arrived on the
//! wire. Comparison goes through [`ring::hmac::verify`], which is constant-time.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use ring::hmac;

/// Header carrying the current HMAC-SHA256 signature.
pub const HMAC_SHA256_HEADER: &str = "x-square-hmacsha256-signature";

/// Header carrying the legacy HMAC-SHA1 signature.
pub const LEGACY_SIGNATURE_HEADER: &str = "x-square-signature";

/// Errors produced while checking a signature.
#[derive(Debug, thiserror::Error)]
pub enum SignatureError {
    #[error("no signature header present")]
    MissingHeader,
    #[error("invalid base64 in {0} header")]
    InvalidEncoding(&'static str),
    #[error("invalid signature")]
    SignatureMismatch,
}

impl From<ring::error::Unspecified> for SignatureError {
    fn from(_: ring::error::Unspecified) -> Self {
        Self::SignatureMismatch
    }
}

/// Which byte sequence a verified signature was computed over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignedForm {
    /// HMAC-SHA256 over the raw body.
    Body,
    /// HMAC-SHA256 over the notification URL followed by the raw body.
    UrlPrefixedBody,
    /// HMAC-SHA1 over the raw body.
    LegacyBody,
}

/// Outcome of [`verify`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationStatus {
    Verified(SignedForm),
    /// No key is configured; the request is unauthenticated.
    Skipped,
    MissingHeader,
    Invalid,
    /// The header could not be interpreted. Callers must reject it like `Invalid`.
    Error,
}

impl VerificationStatus {
    /// Whether processing may continue past verification.
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Verified(_) | Self::Skipped)
    }
}

/// Raw values of the signature headers on one request.
///
/// Values are kept as bytes so that a header which is not valid UTF-8 surfaces
/// as [`VerificationStatus::Error`] instead of being silently dropped.
#[derive(Debug, Clone, Copy, Default)]
pub struct SignatureHeaders<'a> {
    pub hmac_sha256: Option<&'a [u8]>,
    pub legacy: Option<&'a [u8]>,
}

impl SignatureHeaders<'_> {
    pub fn is_empty(&self) -> bool {
        self.hmac_sha256.is_none() && self.legacy.is_none()
    }
}

/// Verify a webhook body against its signature headers.
///
/// With no `secret` configured this returns [`VerificationStatus::Skipped`].
/// The SHA-256 header takes precedence over the legacy one when both are sent.
pub fn verify(
    raw_body: &[u8],
    headers: &SignatureHeaders<'_>,
    secret: Option<&[u8]>,
    notification_url: Option<&str>,
) -> VerificationStatus {
    let Some(secret) = secret else {
        return VerificationStatus::Skipped;
    };
    match check_signature(raw_body, headers, secret, notification_url) {
        Ok(form) => VerificationStatus::Verified(form),
        Err(SignatureError::MissingHeader) => VerificationStatus::MissingHeader,
        Err(SignatureError::SignatureMismatch) => VerificationStatus::Invalid,
        Err(SignatureError::InvalidEncoding(_)) => VerificationStatus::Error,
    }
}

/// Same as [`verify`] for a configured key, but reports the failure reason.
pub fn check_signature(
    raw_body: &[u8],
    headers: &SignatureHeaders<'_>,
    secret: &[u8],
    notification_url: Option<&str>,
) -> Result<SignedForm, SignatureError> {
    if let Some(value) = headers.hmac_sha256 {
        let expected = decode_header(value, HMAC_SHA256_HEADER)?;
        let key = hmac::Key::new(hmac::HMAC_SHA256, secret);
        if hmac::verify(&key, raw_body, &expected).is_ok() {
            return Ok(SignedForm::Body);
        }
        if let Some(url) = notification_url {
            hmac::verify(&key, &url_prefixed(url, raw_body), &expected)?;
            return Ok(SignedForm::UrlPrefixedBody);
        }
        return Err(SignatureError::SignatureMismatch);
    }

    if let Some(value) = headers.legacy {
        let expected = decode_header(value, LEGACY_SIGNATURE_HEADER)?;
        let key = hmac::Key::new(hmac::HMAC_SHA1_FOR_LEGACY_USE_ONLY, secret);
        hmac::verify(&key, raw_body, &expected)?;
        return Ok(SignedForm::LegacyBody);
    }

    Err(SignatureError::MissingHeader)
}

fn decode_header(value: &[u8], header: &'static str) -> Result<Vec<u8>, SignatureError> {
    let trimmed = value.trim_ascii();
    if trimmed.is_empty() {
        return Err(SignatureError::InvalidEncoding(header));
    }
    BASE64_STANDARD
        .decode(trimmed)
        .map_err(|_| SignatureError::InvalidEncoding(header))
}

fn url_prefixed(url: &str, raw_body: &[u8]) -> Vec<u8> {
    let mut data = Vec::with_capacity(url.len() + raw_body.len());
    data.extend_from_slice(url.as_bytes());
    data.extend_from_slice(raw_body);
    data
}

// ---------------------------------------------------------------------------
// Signing (used by local tooling and tests to produce processor-style headers)
// ---------------------------------------------------------------------------

/// `base64(HMAC-SHA256(raw_body, key))`, the value of [`HMAC_SHA256_HEADER`].
pub fn sign_body(raw_body: &[u8], key: &[u8]) -> String {
    let tag = hmac::sign(&hmac::Key::new(hmac::HMAC_SHA256, key), raw_body);
    BASE64_STANDARD.encode(tag.as_ref())
}

/// `base64(HMAC-SHA256("{url}{raw_body}", key))`.
pub fn sign_url_prefixed(url: &str, raw_body: &[u8], key: &[u8]) -> String {
    let tag = hmac::sign(
        &hmac::Key::new(hmac::HMAC_SHA256, key),
        &url_prefixed(url, raw_body),
    );
    BASE64_STANDARD.encode(tag.as_ref())
}

/// `base64(HMAC-SHA1(raw_body, key))`, the value of [`LEGACY_SIGNATURE_HEADER`].
pub fn sign_legacy(raw_body: &[u8], key: &[u8]) -> String {
    let tag = hmac::sign(
        &hmac::Key::new(hmac::HMAC_SHA1_FOR_LEGACY_USE_ONLY, key),
        raw_body,
    );
    BASE64_STANDARD.encode(tag.as_ref())
}

#[cfg(test)]
mod tests {
    use super::*;

    const BODY: &[u8] = br#"{"id":"e1","type":"payment.updated","data":{}}"#;
    const KEY: &[u8] = b"whsec-test";
    const URL: &str = "https://shop.example.com/api/square/webhook";

    fn sha256_headers(value: &str) -> SignatureHeaders<'_> {
        SignatureHeaders {
            hmac_sha256: Some(value.as_bytes()),
            legacy: None,
        }
    }

    #[test]
    fn test_body_signature_verifies() {
        let sig = sign_body(BODY, KEY);
        assert_eq!(
            verify(BODY, &sha256_headers(&sig), Some(KEY), None),
            VerificationStatus::Verified(SignedForm::Body)
        );
    }

    #[test]
    fn test_wrong_key_is_invalid() {
        let sig = sign_body(BODY, KEY);
        assert_eq!(
            verify(BODY, &sha256_headers(&sig), Some(b"other-key"), Some(URL)),
            VerificationStatus::Invalid
        );
    }

    #[test]
    fn test_any_flipped_byte_is_invalid() {
        let sig = sign_body(BODY, KEY);
        for i in 0..BODY.len() {
            let mut tampered = BODY.to_vec();
            tampered[i] ^= 0x01;
            assert_eq!(
                verify(&tampered, &sha256_headers(&sig), Some(KEY), Some(URL)),
                VerificationStatus::Invalid,
                "byte {i} flipped but signature still accepted"
            );
        }
    }

    #[test]
    fn test_url_prefixed_fallback() {
        let sig = sign_url_prefixed(URL, BODY, KEY);
        assert_eq!(
            verify(BODY, &sha256_headers(&sig), Some(KEY), Some(URL)),
            VerificationStatus::Verified(SignedForm::UrlPrefixedBody)
        );
        // Without a notification URL there is nothing to fall back to.
        assert_eq!(
            verify(BODY, &sha256_headers(&sig), Some(KEY), None),
            VerificationStatus::Invalid
        );
    }

    #[test]
    fn test_legacy_header() {
        let sig = sign_legacy(BODY, KEY);
        let headers = SignatureHeaders {
            hmac_sha256: None,
            legacy: Some(sig.as_bytes()),
        };
        assert_eq!(
            verify(BODY, &headers, Some(KEY), None),
            VerificationStatus::Verified(SignedForm::LegacyBody)
        );

        // A SHA-256 digest in the legacy header must not pass.
        let sha256 = sign_body(BODY, KEY);
        let headers = SignatureHeaders {
            hmac_sha256: None,
            legacy: Some(sha256.as_bytes()),
        };
        assert_eq!(
            verify(BODY, &headers, Some(KEY), None),
            VerificationStatus::Invalid
        );
    }

    #[test]
    fn test_sha256_header_takes_precedence() {
        let good_legacy = sign_legacy(BODY, KEY);
        let headers = SignatureHeaders {
            hmac_sha256: Some(b"AAAA"),
            legacy: Some(good_legacy.as_bytes()),
        };
        assert_eq!(
            verify(BODY, &headers, Some(KEY), None),
            VerificationStatus::Invalid
        );
    }

    #[test]
    fn test_missing_header_and_skipped() {
        let headers = SignatureHeaders::default();
        assert_eq!(
            verify(BODY, &headers, Some(KEY), None),
            VerificationStatus::MissingHeader
        );
        assert_eq!(
            verify(BODY, &headers, None, None),
            VerificationStatus::Skipped
        );
        assert!(VerificationStatus::Skipped.is_accepted());
        assert!(!VerificationStatus::MissingHeader.is_accepted());
    }

    #[test]
    fn test_malformed_header_is_error() {
        assert_eq!(
            verify(BODY, &sha256_headers("not base64 !!"), Some(KEY), None),
            VerificationStatus::Error
        );
        assert_eq!(
            verify(BODY, &sha256_headers("   "), Some(KEY), None),
            VerificationStatus::Error
        );
        let headers = SignatureHeaders {
            hmac_sha256: None,
            legacy: Some(&[0xff, 0xfe, 0x00]),
        };
        assert_eq!(
            verify(BODY, &headers, Some(KEY), None),
            VerificationStatus::Error
        );
    }

    #[test]
    fn test_reserialized_body_does_not_verify() {
        let sig = sign_body(BODY, KEY);
        let parsed: serde_json::Value = serde_json::from_slice(BODY).unwrap();
        let pretty = serde_json::to_vec_pretty(&parsed).unwrap();
        assert_eq!(
            verify(&pretty, &sha256_headers(&sig), Some(KEY), None),
            VerificationStatus::Invalid
        );
    }
}
