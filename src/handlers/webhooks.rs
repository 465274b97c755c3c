//! # Webhook Handlers
//!
//! GitHub deliveries reach the handler only after the verification middleware
//! has accepted them. Processing of the payload itself happens downstream.

use axum::{body::Bytes, http::HeaderMap, http::StatusCode, response::Json};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tracing::info;
use utoipa::{IntoParams, ToSchema};

use crate::error::{ApiError, validation_error};

/// Webhook accept response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct WebhookAcceptResponse {
    /// Acceptance status
    pub status: String,
}

/// GitHub delivery headers
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Header)]
pub struct GitHubWebhookHeaders {
    /// HMAC-SHA256 signature of the request body (hex string with sha256= prefix)
    #[serde(rename = "X-Hub-Signature-256")]
    pub signature: String,
    /// Event name, e.g. `sponsorship`
    #[serde(rename = "X-GitHub-Event")]
    pub event: String,
    /// Unique delivery id
    #[serde(rename = "X-GitHub-Delivery")]
    pub delivery: String,
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> &'a str {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
}

/// Accept a verified GitHub webhook delivery
#[utoipa::path(
    post,
    path = "/webhooks/github",
    params(GitHubWebhookHeaders),
    request_body(content = serde_json::Value, content_type = "application/json"),
    responses(
        (status = 202, description = "Delivery accepted", body = WebhookAcceptResponse),
        (status = 400, description = "Body is not valid JSON", body = ApiError),
        (status = 403, description = "Signature mismatch", body = ApiError),
        (status = 413, description = "Body exceeds the delivery size limit", body = ApiError),
        (status = 415, description = "Content type is not JSON", body = ApiError)
    ),
    tag = "webhooks"
)]
pub async fn github_webhook(
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<WebhookAcceptResponse>), ApiError> {
    serde_json::from_slice::<JsonValue>(&body).map_err(|e| {
        validation_error(
            "Webhook body is not valid JSON",
            serde_json::json!({ "body": e.to_string() }),
        )
    })?;

    info!(
        event = header_str(&headers, "x-github-event"),
        delivery = header_str(&headers, "x-github-delivery"),
        body_size = body.len(),
        "Accepted GitHub webhook"
    );

    Ok((
        StatusCode::ACCEPTED,
        Json(WebhookAcceptResponse {
            status: "accepted".to_string(),
        }),
    ))
}
