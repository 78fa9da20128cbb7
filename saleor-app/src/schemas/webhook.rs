//! Webhook payload records.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::AppError;

/// One event record delivered by the platform.
///
/// The platform's payload shape differs per event, so every field is kept.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Webhook(pub Map<String, Value>);

impl Webhook {
    /// Look up a top-level field.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// The record's `id` field when it is a string.
    pub fn id(&self) -> Option<&str> {
        self.get("id").and_then(Value::as_str)
    }

    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }
}

/// Decode a request body into the list of records it carries.
pub fn decode_payload(body: &[u8]) -> Result<Vec<Webhook>, AppError> {
    serde_json::from_slice(body).map_err(|e| AppError::InvalidPayload(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_payload_list() {
        let body = br#"[{"id":"T3JkZXI6MQ==","number":"1","lines":[]},{"id":"T3JkZXI6Mg=="}]"#;
        let payload = decode_payload(body).unwrap();

        assert_eq!(payload.len(), 2);
        assert_eq!(payload[0].id(), Some("T3JkZXI6MQ=="));
        assert_eq!(payload[0].get("number"), Some(&Value::String("1".into())));
    }

    #[test]
    fn test_decode_payload_rejects_non_list() {
        assert!(matches!(
            decode_payload(br#"{"id":"1"}"#),
            Err(AppError::InvalidPayload(_))
        ));
        assert!(matches!(
            decode_payload(b"[1, 2]"),
            Err(AppError::InvalidPayload(_))
        ));
        assert!(decode_payload(b"not json").is_err());
    }
}
