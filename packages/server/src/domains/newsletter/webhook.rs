//! Email worker webhook handler for newsletter ingestion.
//!
//! The gates (method, secret, signature, payload) answer with 4xx/5xx.
//! Once an email is verified and valid the response is always 200 so the
//! worker does not retry; failures are reported in the body.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::{HeaderMap, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::any;
use axum::{Json, Router};
use chrono::Utc;
use serde_json::json;
use thiserror::Error;

use crate::kernel::ServerDeps;

use super::ingest::{ingest_email, IngestionOutcome};
use super::payload::InboundEmail;
use super::signature::{
    verify_signature, SIGNATURE_HEADER, TIMESTAMP_HEADER, WORKER_VERSION_HEADER,
};

pub const WEBHOOK_PATH: &str = "/api/webhook/email";

/// Largest request body accepted from the worker.
pub const MAX_BODY_BYTES: usize = 25 * 1024 * 1024;

/// State shared with the webhook handler.
#[derive(Clone)]
pub struct WebhookState {
    pub deps: Arc<ServerDeps>,
}

/// Rejections before an email is accepted for processing.
#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("Method not allowed")]
    MethodNotAllowed,
    #[error("Webhook secret not configured")]
    SecretNotConfigured,
    #[error("Invalid signature")]
    InvalidSignature,
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),
}

impl WebhookError {
    pub fn status(&self) -> StatusCode {
        match self {
            WebhookError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            WebhookError::SecretNotConfigured => StatusCode::INTERNAL_SERVER_ERROR,
            WebhookError::InvalidSignature => StatusCode::UNAUTHORIZED,
            WebhookError::InvalidPayload(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        (self.status(), Json(json!({ "error": self.to_string() }))).into_response()
    }
}

/// Build the axum router for webhook endpoints.
pub fn router(state: WebhookState) -> Router {
    Router::new()
        .route(WEBHOOK_PATH, any(handle_email_webhook))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(state)
}

async fn handle_email_webhook(
    State(state): State<WebhookState>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, WebhookError> {
    if method != Method::POST {
        return Err(WebhookError::MethodNotAllowed);
    }

    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());

    if let Some(version) = header(WORKER_VERSION_HEADER) {
        tracing::debug!(worker_version = %version, "Email worker request");
    }

    let Some(secret) = state.deps.webhook_secret.as_deref() else {
        tracing::error!("Webhook secret is not configured, rejecting email");
        return Err(WebhookError::SecretNotConfigured);
    };

    if !verify_signature(
        &body,
        header(SIGNATURE_HEADER),
        header(TIMESTAMP_HEADER),
        secret,
        Utc::now(),
    ) {
        tracing::warn!("Rejected email webhook with invalid signature");
        return Err(WebhookError::InvalidSignature);
    }

    let email = InboundEmail::from_slice(&body).map_err(|e| {
        tracing::warn!(error = %e, "Rejected malformed email payload");
        WebhookError::InvalidPayload(e)
    })?;

    let result = ingest_email(&state.deps, &email).await;
    Ok(respond_to_ingestion(result, &email, &state.deps))
}

/// The single boundary between ingestion and the worker: every outcome,
/// including errors, becomes a 200.
pub fn respond_to_ingestion(
    result: anyhow::Result<IngestionOutcome>,
    email: &InboundEmail,
    deps: &ServerDeps,
) -> Response {
    let body = match result {
        Ok(IngestionOutcome::Loopback) => json!({
            "success": true,
            "message": "Ignored email to system sender",
        }),
        Ok(IngestionOutcome::ForeignDomain { .. }) => json!({
            "message": format!("Not a {} email", deps.settings.inbox_domain),
        }),
        Ok(IngestionOutcome::UserNotFound { .. }) => json!({
            "message": "User not found",
        }),
        Ok(IngestionOutcome::Ingested {
            newsletter_id,
            message_id,
            duplicate,
            ..
        }) => {
            let message = if duplicate {
                "Newsletter already processed"
            } else {
                "Newsletter processed successfully"
            };
            json!({
                "success": true,
                "message": message,
                "id": newsletter_id,
                "messageId": message_id,
            })
        }
        Err(e) => {
            let recipient = email.recipient().unwrap_or_default();
            tracing::error!(
                message_id = %email.message_id,
                from = %email.from.address,
                to = %recipient,
                error = ?e,
                "Failed to process inbound email"
            );
            json!({
                "success": false,
                "error": "Failed to process email",
                "details": format!("{:#}", e),
            })
        }
    };

    (StatusCode::OK, Json(body)).into_response()
}
