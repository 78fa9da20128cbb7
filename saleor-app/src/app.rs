//! Application shell.
//!
//! Validates settings, wires the collaborators together and exposes the
//! router and the optional queue consumer. Building fails fast on any
//! configuration problem, before a single route exists.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Bytes,
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::config::AppSettings;
use crate::dispatch::Dispatcher;
use crate::error::AppError;
use crate::install::{GraphqlRegistrar, WebhookRegistrar, WebhookTarget};
use crate::queue::QueueConsumer;
use crate::schemas::{HandlerRegistry, Manifest, TransportKind};
use crate::store::AppStore;
use crate::web::{handle_webhook, health, install, manifest, AppState};

/// A configured app, ready to serve.
#[derive(Clone)]
pub struct SaleorApp {
    state: Arc<AppState>,
    settings: AppSettings,
}

/// Builder for [`SaleorApp`].
pub struct SaleorAppBuilder {
    manifest: Manifest,
    store: Arc<dyn AppStore>,
    settings: AppSettings,
    handlers: HandlerRegistry,
    registrar: Option<Arc<dyn WebhookRegistrar>>,
}

impl SaleorApp {
    pub fn builder(manifest: Manifest, store: Arc<dyn AppStore>, settings: AppSettings) -> SaleorAppBuilder {
        SaleorAppBuilder {
            manifest,
            store,
            settings,
            handlers: HandlerRegistry::new(),
            registrar: None,
        }
    }

    /// All routes: `/health`, `/configuration/manifest`,
    /// `/configuration/install` and `/webhook`.
    ///
    /// Both groups are always mounted. A webhook for an event with no HTTP
    /// handler is answered with 404.
    pub fn router(&self) -> Router {
        let configuration = Router::new()
            .route("/manifest", get(manifest))
            .route("/install", post(install));

        Router::new()
            .route("/health", get(health))
            .nest("/configuration", configuration)
            .route("/webhook", post(handle_webhook))
            .layer(TraceLayer::new_for_http())
            .with_state(Arc::clone(&self.state))
    }

    /// Consumer for queue-bound handlers, if any are bound.
    pub fn queue_consumer(&self) -> Option<QueueConsumer> {
        let dispatcher = &self.state.dispatcher;
        if !dispatcher.registry().has(TransportKind::Queue) {
            return None;
        }

        self.settings
            .queue
            .clone()
            .map(|settings| QueueConsumer::new(settings, dispatcher.clone()))
    }

    pub fn settings(&self) -> &AppSettings {
        &self.settings
    }

    /// Webhook targets registered with the platform on install.
    pub fn webhook_targets(&self) -> &[WebhookTarget] {
        &self.state.webhook_targets
    }

    /// The manifest exactly as served.
    pub fn manifest_json(&self) -> &Bytes {
        &self.state.manifest_json
    }
}

impl SaleorAppBuilder {
    /// Handlers to dispatch webhooks to.
    pub fn handlers(mut self, handlers: HandlerRegistry) -> Self {
        self.handlers = handlers;
        self
    }

    /// Replace the GraphQL registrar used during installation.
    pub fn registrar(mut self, registrar: Arc<dyn WebhookRegistrar>) -> Self {
        self.registrar = Some(registrar);
        self
    }

    pub fn build(self) -> Result<SaleorApp, AppError> {
        let settings = self.settings;
        settings.validate()?;

        if self.handlers.has(TransportKind::Queue) {
            warn!(
                queue_events = self.handlers.events(TransportKind::Queue).len(),
                "queue_transport_experimental"
            );
            let queue = settings.queue.as_ref().ok_or_else(|| {
                AppError::Configuration(
                    "queue webhook handlers require queue settings (CLOUDAMQP_URL)".to_string(),
                )
            })?;

            let broker = queue.broker()?;
            for url in self.handlers.queue_targets().keys() {
                if url.broker() != broker {
                    return Err(AppError::Configuration(format!(
                        "queue target {} is not on the consumer's broker ({})",
                        url,
                        broker
                    )));
                }
            }
        }

        let manifest = self.manifest.resolve(&settings)?;
        let manifest_json = serde_json::to_vec(&manifest)
            .map(Bytes::from)
            .map_err(|e| AppError::Configuration(format!("manifest is not serializable: {}", e)))?;

        let webhook_targets = webhook_targets(&self.handlers, &settings)?;

        let registrar: Arc<dyn WebhookRegistrar> = match self.registrar {
            Some(registrar) => registrar,
            None => Arc::new(
                GraphqlRegistrar::new(
                    settings.use_insecure_saleor_http,
                    Duration::from_millis(settings.saleor_request_timeout_ms),
                )
                .map_err(|e| AppError::Configuration(format!("{:#}", e)))?,
            ),
        };

        info!(
            app = %manifest.name,
            http_events = self.handlers.events(TransportKind::Http).len(),
            queue_events = self.handlers.events(TransportKind::Queue).len(),
            webhook_targets = webhook_targets.len(),
            "saleor_app_configured"
        );

        let dispatcher = Dispatcher::new(self.store, Arc::new(self.handlers));

        Ok(SaleorApp {
            state: Arc::new(AppState {
                app_name: manifest.name,
                manifest_json,
                dispatcher,
                registrar,
                webhook_targets,
            }),
            settings,
        })
    }
}

/// One target for the HTTP endpoint plus one per queue URL.
fn webhook_targets(handlers: &HandlerRegistry, settings: &AppSettings) -> Result<Vec<WebhookTarget>, AppError> {
    let mut targets = Vec::new();

    let http_events = handlers.events(TransportKind::Http);
    if !http_events.is_empty() {
        targets.push(WebhookTarget {
            target_url: settings.public_route("/webhook")?,
            events: http_events,
        });
    }

    for (url, events) in handlers.queue_targets() {
        targets.push(WebhookTarget {
            target_url: url.to_string(),
            events,
        });
    }

    Ok(targets)
}
