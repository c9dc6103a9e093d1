//! Application setup and server configuration.

use std::sync::Arc;

use axum::{extract::Extension, routing::get, Router};
use tower_http::trace::TraceLayer;

use crate::domains::newsletter::webhook::{self, WebhookState};
use crate::kernel::ServerDeps;
use crate::server::routes::health_handler;

/// Build the Axum application router
///
/// - `GET /health` pings the store
/// - `/api/webhook/email` receives emails from the email worker
pub fn build_app(deps: Arc<ServerDeps>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .merge(webhook::router(WebhookState { deps: deps.clone() }))
        .layer(Extension(deps))
        .layer(TraceLayer::new_for_http())
}
