//! HTTP endpoint handlers.
//!
//! Handlers only pull what they need out of the request and hand off to the
//! dispatcher or the install flow. All verification lives there.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::dispatch::{Dispatcher, InboundWebhook, DOMAIN_HEADER, EVENT_HEADER, SIGNATURE_HEADER};
use crate::error::AppError;
use crate::install::{install_app, InstallData, WebhookRegistrar, WebhookTarget};
use crate::schemas::{DomainName, TransportKind};

/// Shared application state. Read-only once built.
pub struct AppState {
    pub app_name: String,
    /// Manifest serialized once, served byte-for-byte
    pub manifest_json: Bytes,
    pub dispatcher: Dispatcher,
    pub registrar: Arc<dyn WebhookRegistrar>,
    /// Webhook targets registered with the platform on install
    pub webhook_targets: Vec<WebhookTarget>,
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

// =============================================================================
// Health Check
// =============================================================================

/// Health check response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// Health check endpoint.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

// =============================================================================
// Configuration
// =============================================================================

/// `GET /configuration/manifest`
pub async fn manifest(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "application/json")],
        state.manifest_json.clone(),
    )
}

/// `POST /configuration/install`
///
/// Takes `{"auth_token": "..."}` and the domain header. Registers the app's
/// webhooks with the platform and persists the installation.
pub async fn install(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, AppError> {
    let raw_domain =
        header_value(&headers, DOMAIN_HEADER).ok_or(AppError::MissingHeader(DOMAIN_HEADER))?;

    let data: InstallData = serde_json::from_slice(&body)
        .map_err(|e| AppError::InvalidPayload(e.to_string()))?;

    if data.auth_token.trim().is_empty() {
        return Err(AppError::InvalidPayload("auth_token must not be empty".to_string()));
    }

    info!(domain = %raw_domain, "install_received");

    let domain = DomainName::parse(&raw_domain).map_err(|_| {
        warn!(domain = %raw_domain, "install_domain_malformed");
        AppError::Forbidden(format!("Provided domain {} is invalid", raw_domain))
    })?;

    let store = state.dispatcher.store();
    if !store.validate_domain(&domain).await {
        warn!(domain = %domain, "install_domain_rejected");
        return Err(AppError::Forbidden(format!(
            "Provided domain {} is invalid",
            domain
        )));
    }

    install_app(
        store.as_ref(),
        state.registrar.as_ref(),
        &domain,
        &data.auth_token,
        &state.app_name,
        &state.webhook_targets,
    )
    .await?;

    Ok(Json(json!({})))
}

// =============================================================================
// Webhook
// =============================================================================

/// `POST /webhook`
///
/// Verifies domain and signature, then runs the handler bound to the event
/// header and waits for it before answering.
pub async fn handle_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    let webhook = InboundWebhook {
        transport: TransportKind::Http,
        queue: None,
        domain: header_value(&headers, DOMAIN_HEADER),
        signature: header_value(&headers, SIGNATURE_HEADER),
        event: header_value(&headers, EVENT_HEADER),
        body,
    };

    info!(
        domain = ?webhook.domain,
        event = ?webhook.event,
        body_length = webhook.body.len(),
        "webhook_received"
    );

    state.dispatcher.dispatch(webhook).await?;

    Ok((StatusCode::OK, Json(json!({}))))
}
