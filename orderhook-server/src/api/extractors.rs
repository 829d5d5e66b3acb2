//! Custom Axum extractors for request authentication.
//!
//! Provides `VerifiedWebhook`, which captures the raw webhook body and checks
//! it against the processor's signature headers before anything parses it.
//!
//! All cryptographic operations are delegated to [`orderhook_sdk::signature`].

use axum::{
    Json,
    body::Bytes,
    extract::{FromRequest, Request},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use orderhook_sdk::objects::ErrorResponse;
use orderhook_sdk::signature::{
    self, HMAC_SHA256_HEADER, LEGACY_SIGNATURE_HEADER, SignatureHeaders, SignedForm,
    VerificationStatus,
};

use crate::state::AppState;

/// Largest webhook body read into memory.
pub const MAX_WEBHOOK_BODY: usize = 1024 * 1024;

/// The raw body of a webhook delivery whose signature checked out.
///
/// Requests without a configured key are let through only when unsigned
/// deliveries were explicitly allowed; `signed_form` is `None` for those.
pub struct VerifiedWebhook {
    pub body: Bytes,
    pub signed_form: Option<SignedForm>,
}

/// Errors returned by the [`VerifiedWebhook`] extractor.
#[derive(Debug, thiserror::Error)]
pub enum WebhookRejection {
    #[error("request body too large")]
    BodyTooLarge,
    #[error("failed to read request body")]
    BodyReadError,
    #[error("missing signature header")]
    MissingSignature,
    #[error("invalid signature")]
    InvalidSignature,
    #[error("malformed signature header")]
    MalformedSignature,
    #[error("unsigned deliveries are not accepted")]
    UnsignedNotAllowed,
}

impl IntoResponse for WebhookRejection {
    fn into_response(self) -> Response {
        let status = match self {
            WebhookRejection::BodyTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            _ => StatusCode::BAD_REQUEST,
        };
        (status, Json(ErrorResponse::new(self.to_string()))).into_response()
    }
}

impl FromRequest<AppState> for VerifiedWebhook {
    type Rejection = WebhookRejection;

    async fn from_request(req: Request, state: &AppState) -> Result<Self, Self::Rejection> {
        let headers = req.headers().clone();
        let body = Bytes::from_request(req, state).await.map_err(|rejection| {
            if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
                WebhookRejection::BodyTooLarge
            } else {
                WebhookRejection::BodyReadError
            }
        })?;

        let signature_headers = SignatureHeaders {
            hmac_sha256: headers.get(HMAC_SHA256_HEADER).map(|v| v.as_bytes()),
            legacy: headers.get(LEGACY_SIGNATURE_HEADER).map(|v| v.as_bytes()),
        };

        let webhook = state.config.webhook.read().await;
        let status = signature::verify(
            &body,
            &signature_headers,
            webhook.secret_bytes(),
            webhook.notification_url.as_deref(),
        );

        if !status.is_accepted() && webhook.debug {
            tracing::info!(
                body_len = body.len(),
                sha256_header_len = signature_headers.hmac_sha256.map(<[u8]>::len),
                legacy_header_len = signature_headers.legacy.map(<[u8]>::len),
                url_fallback = webhook.notification_url.is_some(),
                status = ?status,
                "Webhook signature debug"
            );
        }

        match status {
            VerificationStatus::Verified(form) => {
                tracing::debug!(form = ?form, "Webhook signature verified");
                Ok(VerifiedWebhook {
                    body,
                    signed_form: Some(form),
                })
            }
            VerificationStatus::Skipped if webhook.allow_unsigned => {
                tracing::warn!("Accepting unsigned webhook delivery; no signature key configured");
                Ok(VerifiedWebhook {
                    body,
                    signed_form: None,
                })
            }
            VerificationStatus::Skipped => Err(WebhookRejection::UnsignedNotAllowed),
            VerificationStatus::MissingHeader => {
                tracing::warn!("Webhook delivery without signature header");
                Err(WebhookRejection::MissingSignature)
            }
            VerificationStatus::Invalid => {
                tracing::warn!("Webhook signature mismatch");
                Err(WebhookRejection::InvalidSignature)
            }
            VerificationStatus::Error => {
                tracing::warn!("Webhook signature header could not be decoded");
                Err(WebhookRejection::MalformedSignature)
            }
        }
    }
}
