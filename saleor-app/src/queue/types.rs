//! Queue message format.
//!
//! The platform publishes each webhook as one AMQP message: the JSON array of
//! records as the body, and the routing metadata in message headers that
//! mirror the HTTP ones.

use axum::body::Bytes;
use lapin::types::{AMQPValue, FieldTable};

use crate::dispatch::InboundWebhook;
use crate::schemas::TransportKind;

/// Message header carrying the installation domain.
pub const DOMAIN_HEADER: &str = "saleor-domain";

/// Message header carrying the body's HMAC-SHA256 hex digest.
pub const SIGNATURE_HEADER: &str = "saleor-signature";

/// Message header carrying the event type name.
pub const EVENT_HEADER: &str = "saleor-event";

/// String value of a message header, if present and non-empty.
pub fn header_str(headers: Option<&FieldTable>, name: &str) -> Option<String> {
    let value = headers?
        .inner()
        .iter()
        .find(|(key, _)| key.as_str().eq_ignore_ascii_case(name))
        .map(|(_, value)| value)?;

    let text = match value {
        AMQPValue::LongString(s) => String::from_utf8_lossy(s.as_bytes()).into_owned(),
        AMQPValue::ShortString(s) => s.as_str().to_string(),
        _ => return None,
    };

    let text = text.trim();
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

/// Turn a delivery consumed from `queue` into the transport-independent
/// webhook shape.
pub fn inbound_from_delivery(queue: &str, headers: Option<&FieldTable>, data: &[u8]) -> InboundWebhook {
    InboundWebhook {
        transport: TransportKind::Queue,
        queue: Some(queue.to_string()),
        domain: header_str(headers, DOMAIN_HEADER),
        signature: header_str(headers, SIGNATURE_HEADER),
        event: header_str(headers, EVENT_HEADER),
        body: Bytes::copy_from_slice(data),
    }
}
