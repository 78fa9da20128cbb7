//! Experimental queue transport.
//!
//! Mirrors the webhook endpoint for events the platform publishes to an AMQP
//! queue instead of posting over HTTP. Deliveries go through the same
//! dispatcher, so verification and handler lookup are identical.
//!
//! ## Flow
//!
//! ```text
//! Platform → AMQP queue → QueueConsumer → Dispatcher → handler
//! ```

pub mod consumer;
pub mod types;

pub use consumer::{settlement, QueueConsumer, Settlement};
pub use types::{inbound_from_delivery, DOMAIN_HEADER, EVENT_HEADER, SIGNATURE_HEADER};
