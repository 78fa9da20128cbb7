//! Core identifiers and per-installation state.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Identifies one installation of the platform, as `host[:port]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DomainName(String);

/// A domain header value that is not a bare `host[:port]`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed domain name: {0:?}")]
pub struct InvalidDomain(pub String);

impl DomainName {
    pub fn parse(raw: &str) -> Result<Self, InvalidDomain> {
        let invalid = || InvalidDomain(raw.to_string());
        let value = raw.trim();

        if value.is_empty() || value.len() > 253 + 6 {
            return Err(invalid());
        }

        let (host, port) = match value.rsplit_once(':') {
            Some((host, port)) => (host, Some(port)),
            None => (value, None),
        };

        if let Some(port) = port {
            if port.is_empty() || port.parse::<u16>().is_err() {
                return Err(invalid());
            }
        }

        let host_ok = !host.is_empty()
            && !host.starts_with('.')
            && !host.starts_with('-')
            && host
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-');

        if !host_ok {
            return Err(invalid());
        }

        Ok(DomainName(value.to_ascii_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for DomainName {
    type Err = InvalidDomain;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DomainName::parse(s)
    }
}

impl TryFrom<String> for DomainName {
    type Error = InvalidDomain;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        DomainName::parse(&value)
    }
}

impl From<DomainName> for String {
    fn from(domain: DomainName) -> Self {
        domain.0
    }
}

impl fmt::Display for DomainName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// State persisted for a domain when the app is installed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookData {
    /// App token issued by the platform during installation
    pub token: String,
    /// Platform webhook id keyed by the target URL it delivers to
    #[serde(default)]
    pub webhook_ids: BTreeMap<String, String>,
    /// Secret shared with the platform for signing webhook bodies
    pub webhook_secret_key: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_accepts_host_and_port() {
        assert_eq!(
            DomainName::parse("Shop.Example.com").unwrap().as_str(),
            "shop.example.com"
        );
        assert_eq!(
            DomainName::parse("127.0.0.1:8000").unwrap().as_str(),
            "127.0.0.1:8000"
        );
        assert_eq!(DomainName::parse("localhost").unwrap().as_str(), "localhost");
    }

    #[test]
    fn test_domain_rejects_malformed() {
        for raw in [
            "",
            "   ",
            "https://shop.example.com",
            "shop.example.com/graphql/",
            "shop example.com",
            "shop.example.com:",
            "shop.example.com:99999",
            ":8000",
            ".example.com",
        ] {
            assert!(DomainName::parse(raw).is_err(), "accepted {:?}", raw);
        }
    }

    #[test]
    fn test_domain_deserialize_validates() {
        let ok: Result<DomainName, _> = serde_json::from_str("\"shop.example.com\"");
        assert!(ok.is_ok());
        let bad: Result<DomainName, _> = serde_json::from_str("\"http://evil\"");
        assert!(bad.is_err());
    }

    #[test]
    fn test_webhook_data_defaults_ids() {
        let data: WebhookData =
            serde_json::from_str(r#"{"token":"t","webhook_secret_key":"s"}"#).unwrap();
        assert!(data.webhook_ids.is_empty());
    }
}
