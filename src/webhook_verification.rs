//! # Webhook Signature Verification
//!
//! Verifies GitHub webhook deliveries using HMAC-SHA256 over the raw body,
//! compared in constant time against the `X-Hub-Signature-256` header.

use axum::{
    body::Body,
    extract::{Request, State},
    http::{HeaderMap, StatusCode, header::CONTENT_TYPE, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};
use hmac::{Hmac, Mac};
use metrics::counter;
use sha2::Sha256;
use subtle::ConstantTimeEq;
use tracing::{debug, error, warn};

use crate::error::{ApiError, ErrorType};

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the GitHub delivery signature.
pub const SIGNATURE_HEADER: &str = "x-hub-signature-256";

const SIGNATURE_PREFIX: &str = "sha256=";

/// GitHub caps delivery payloads at 25 MB.
pub const MAX_WEBHOOK_BODY_BYTES: usize = 25 * 1024 * 1024;

/// Errors that can occur during webhook signature verification
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VerificationError {
    #[error("Webhook payload must be JSON")]
    UnsupportedMediaType,

    #[error("Signature verification failed")]
    SignatureMismatch,
}

impl VerificationError {
    /// Returns the HTTP status code webhook senders expect for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            VerificationError::UnsupportedMediaType => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            VerificationError::SignatureMismatch => StatusCode::FORBIDDEN,
        }
    }

    fn outcome(&self) -> &'static str {
        match self {
            VerificationError::UnsupportedMediaType => "unsupported_media_type",
            VerificationError::SignatureMismatch => "signature_mismatch",
        }
    }
}

impl From<VerificationError> for ApiError {
    fn from(error: VerificationError) -> Self {
        match error {
            VerificationError::UnsupportedMediaType => ErrorType::UnsupportedMediaType.into(),
            VerificationError::SignatureMismatch => ApiError::new(
                StatusCode::FORBIDDEN,
                "INVALID_SIGNATURE",
                "Webhook signature verification failed",
            ),
        }
    }
}

/// Result type for webhook verification
pub type VerificationResult<T> = Result<T, VerificationError>;

/// Authorizes webhook deliveries against an optional shared secret.
///
/// With no secret configured every JSON delivery is accepted. That mode exists
/// for local development; the server warns about it at startup.
#[derive(Clone, Default)]
pub struct SignatureVerifier {
    secret: Option<String>,
}

impl std::fmt::Debug for SignatureVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignatureVerifier")
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

impl SignatureVerifier {
    /// Builds a verifier. An empty secret disables verification.
    pub fn new(secret: Option<String>) -> Self {
        Self {
            secret: secret.filter(|s| !s.is_empty()),
        }
    }

    /// Whether a secret is configured.
    pub fn is_enabled(&self) -> bool {
        self.secret.is_some()
    }

    /// Checks content type first, then the signature when a secret is configured.
    pub fn authorize(
        &self,
        body: &[u8],
        content_type: Option<&str>,
        signature_header: Option<&str>,
    ) -> VerificationResult<()> {
        check_media_type(content_type)?;
        self.verify_signature(body, signature_header)
    }

    /// Compares the signature header against the body's HMAC; passes when no
    /// secret is configured.
    pub fn verify_signature(
        &self,
        body: &[u8],
        signature_header: Option<&str>,
    ) -> VerificationResult<()> {
        let Some(secret) = self.secret.as_deref() else {
            return Ok(());
        };

        let provided = signature_header.unwrap_or_default();
        let expected = expected_signature(secret, body)?;

        // ct_eq on slices of different lengths returns false without early exit on content.
        if bool::from(expected.as_bytes().ct_eq(provided.as_bytes())) {
            Ok(())
        } else {
            Err(VerificationError::SignatureMismatch)
        }
    }
}

/// Rejects anything but a JSON content type.
pub fn check_media_type(content_type: Option<&str>) -> VerificationResult<()> {
    if content_type.is_some_and(is_json_media_type) {
        Ok(())
    } else {
        Err(VerificationError::UnsupportedMediaType)
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

fn content_type(headers: &HeaderMap) -> Option<&str> {
    header_str(headers, CONTENT_TYPE.as_str())
}

/// `sha256=` followed by the lowercase hex HMAC-SHA256 of `body`.
pub fn expected_signature(secret: &str, body: &[u8]) -> VerificationResult<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| VerificationError::SignatureMismatch)?;
    mac.update(body);
    Ok(format!(
        "{}{}",
        SIGNATURE_PREFIX,
        hex::encode(mac.finalize().into_bytes())
    ))
}

/// Accepts `application/json`, `text/json` and structured `+json` suffixes.
fn is_json_media_type(content_type: &str) -> bool {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    match essence.split_once('/') {
        Some((kind, subtype)) => {
            !kind.is_empty() && (subtype == "json" || subtype.ends_with("+json"))
        }
        None => false,
    }
}

fn reject(parts: &Parts, error: VerificationError) -> Response {
    counter!("webhook_verification_total", "outcome" => error.outcome()).increment(1);
    match error {
        VerificationError::SignatureMismatch => warn!(
            path = %parts.uri.path(),
            delivery = header_str(&parts.headers, "x-github-delivery").unwrap_or("unknown"),
            "Rejected webhook with invalid signature"
        ),
        VerificationError::UnsupportedMediaType => debug!(
            path = %parts.uri.path(),
            "Rejected webhook with non-JSON content type"
        ),
    }
    ApiError::from(error).into_response()
}

/// Middleware guarding webhook routes.
///
/// Rejects non-JSON content types from the headers alone, then buffers the
/// body, verifies the signature, and hands the reconstructed request to the
/// handler only on success.
pub async fn webhook_verification_middleware(
    State(verifier): State<SignatureVerifier>,
    request: Request,
    next: Next,
) -> Response {
    let (parts, body) = request.into_parts();

    if let Err(e) = check_media_type(content_type(&parts.headers)) {
        return reject(&parts, e);
    }

    let body_bytes = match axum::body::to_bytes(body, MAX_WEBHOOK_BODY_BYTES).await {
        Ok(bytes) => bytes,
        Err(e) => {
            error!(error = ?e, "Failed to read request body for webhook verification");
            return ApiError::new(
                StatusCode::PAYLOAD_TOO_LARGE,
                "PAYLOAD_TOO_LARGE",
                "Webhook body could not be read within the delivery size limit",
            )
            .into_response();
        }
    };

    let signature = header_str(&parts.headers, SIGNATURE_HEADER);
    if let Err(e) = verifier.verify_signature(&body_bytes, signature) {
        return reject(&parts, e);
    }

    counter!("webhook_verification_total", "outcome" => "accepted").increment(1);
    debug!(
        body_size = body_bytes.len(),
        verified = verifier.is_enabled(),
        "Webhook authorized"
    );
    next.run(Request::from_parts(parts, Body::from(body_bytes))).await
}
