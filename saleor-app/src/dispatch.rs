//! Verify-then-invoke pipeline shared by every transport.
//!
//! ```text
//! InboundWebhook → domain check → signature check → event lookup → handler
//! ```
//!
//! Each step short-circuits. No handler runs unless every check passed.

use std::sync::Arc;

use axum::body::Bytes;
use tracing::{error, info, warn};

use crate::error::AppError;
use crate::schemas::{
    decode_payload, Binding, DomainName, EventType, HandlerRegistry, Transport, TransportKind,
};
use crate::store::AppStore;
use crate::web::signature::verify_signature;

/// Header carrying the installation domain.
pub const DOMAIN_HEADER: &str = "x-saleor-domain";

/// Header carrying the body's HMAC-SHA256 hex digest.
pub const SIGNATURE_HEADER: &str = "x-saleor-signature";

/// Header carrying the event type name.
pub const EVENT_HEADER: &str = "x-saleor-event";

/// A webhook as received, before any verification.
#[derive(Debug, Clone)]
pub struct InboundWebhook {
    pub transport: TransportKind,
    /// Queue the delivery was consumed from. `None` over HTTP.
    pub queue: Option<String>,
    pub domain: Option<String>,
    pub signature: Option<String>,
    pub event: Option<String>,
    pub body: Bytes,
}

/// Runs inbound webhooks through verification and into their handler.
#[derive(Clone)]
pub struct Dispatcher {
    store: Arc<dyn AppStore>,
    registry: Arc<HandlerRegistry>,
}

impl Dispatcher {
    pub fn new(store: Arc<dyn AppStore>, registry: Arc<HandlerRegistry>) -> Self {
        Self { store, registry }
    }

    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    pub fn store(&self) -> &Arc<dyn AppStore> {
        &self.store
    }

    /// Verify the webhook and invoke its handler, awaiting completion.
    pub async fn dispatch(&self, webhook: InboundWebhook) -> Result<(), AppError> {
        let domain = self.verify_domain(webhook.domain.as_deref()).await?;
        self.verify_signature(&domain, webhook.signature.as_deref(), &webhook.body)
            .await?;

        let raw_event = webhook
            .event
            .as_deref()
            .ok_or(AppError::MissingHeader(EVENT_HEADER))?;

        let binding = raw_event
            .parse::<EventType>()
            .ok()
            .and_then(|event| self.registry.get(webhook.transport, event))
            .filter(|binding| accepts_source(binding, webhook.queue.as_deref()))
            .ok_or_else(|| {
                warn!(
                    domain = %domain,
                    event = %raw_event,
                    transport = webhook.transport.as_str(),
                    queue = ?webhook.queue,
                    "webhook_event_not_handled"
                );
                AppError::NotFound(raw_event.to_string())
            })?;

        let payload = decode_payload(&webhook.body)?;

        info!(
            domain = %domain,
            event = %binding.event,
            transport = webhook.transport.as_str(),
            records = payload.len(),
            "webhook_dispatching"
        );

        if let Err(e) = (binding.handler)(payload, domain.clone()).await {
            error!(
                domain = %domain,
                event = %binding.event,
                error = %e,
                "webhook_handler_failed"
            );
            return Err(AppError::Handler(e));
        }

        info!(domain = %domain, event = %binding.event, "webhook_handled");

        Ok(())
    }

    /// Resolve and allow-list the sending domain.
    pub async fn verify_domain(&self, raw: Option<&str>) -> Result<DomainName, AppError> {
        let raw = raw.ok_or(AppError::MissingHeader(DOMAIN_HEADER))?;

        let domain = DomainName::parse(raw).map_err(|_| {
            warn!(domain = %raw, "webhook_domain_malformed");
            AppError::UnknownDomain(raw.to_string())
        })?;

        if !self.store.validate_domain(&domain).await {
            warn!(domain = %domain, "webhook_domain_rejected");
            return Err(AppError::UnknownDomain(domain.to_string()));
        }

        Ok(domain)
    }

    /// Check the body signature with the secret stored for `domain`.
    pub async fn verify_signature(
        &self,
        domain: &DomainName,
        signature: Option<&str>,
        body: &[u8],
    ) -> Result<(), AppError> {
        let signature = signature.ok_or(AppError::MissingHeader(SIGNATURE_HEADER))?;

        let details = self.store.get_webhook_details(domain).await?.ok_or_else(|| {
            warn!(domain = %domain, "webhook_domain_not_installed");
            AppError::Authentication
        })?;

        if !verify_signature(&details.webhook_secret_key, body, signature) {
            return Err(AppError::Authentication);
        }

        Ok(())
    }
}

/// Queue bindings only accept deliveries from the queue they are bound to.
fn accepts_source(binding: &Binding, queue: Option<&str>) -> bool {
    match &binding.transport {
        Transport::Http => true,
        Transport::Queue(url) => queue == Some(url.queue()),
    }
}
