//! Data types shared by the HTTP and queue transports.

pub mod domain;
pub mod event;
pub mod handlers;
pub mod manifest;
pub mod webhook;

pub use domain::{DomainName, InvalidDomain, WebhookData};
pub use event::{EventType, UnknownEventType};
pub use handlers::{
    handler, Binding, Broker, HandlerRegistry, InvalidQueueUrl, QueueUrl, Transport, TransportKind,
    WebhookHandler,
};
pub use manifest::{Extension, ExtensionTarget, Manifest};
pub use webhook::{decode_payload, Webhook};
