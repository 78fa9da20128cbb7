//! Saleor app integration layer.
//!
//! Lets a backend register itself as an app with the Saleor platform:
//! - serves the app manifest and handles the installation handshake
//! - verifies inbound webhooks (domain allow-list + HMAC signature)
//! - dispatches webhook payloads to handlers by event type
//!
//! ## Architecture
//!
//! ```text
//! Platform ──HTTP──→ /webhook ─────┐
//!                                  ├→ Dispatcher → handler(payloads, domain)
//! Platform ──AMQP──→ QueueConsumer ┘
//! ```

pub mod app;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod install;
pub mod queue;
pub mod schemas;
pub mod store;
pub mod web;

// Re-export commonly used types
pub use app::{SaleorApp, SaleorAppBuilder};
pub use config::{AppSettings, QueueSettings};
pub use dispatch::{Dispatcher, InboundWebhook};
pub use error::AppError;
pub use install::{GraphqlRegistrar, WebhookRegistrar, WebhookTarget};
pub use queue::QueueConsumer;
pub use schemas::{
    handler, DomainName, EventType, HandlerRegistry, Manifest, QueueUrl, Transport, Webhook,
    WebhookData, WebhookHandler,
};
pub use store::{AppStore, MemoryStore};
