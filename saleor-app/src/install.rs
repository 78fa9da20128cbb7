//! Installation handshake.
//!
//! When the platform installs the app it posts an auth token. The app uses
//! that token to register its webhook targets through the platform's GraphQL
//! API, then hands the resulting [`WebhookData`] to the store.

use std::collections::BTreeMap;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

use crate::error::AppError;
use crate::schemas::{DomainName, EventType, WebhookData};
use crate::store::AppStore;

const CREATE_WEBHOOK: &str = r#"
mutation WebhookCreate($input: WebhookCreateInput!) {
  webhookCreate(input: $input) {
    webhookErrors {
      field
      message
      code
    }
    webhook {
      id
    }
  }
}
"#;

/// Body of the platform's install request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstallData {
    pub auth_token: String,
}

/// One webhook the platform should deliver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookTarget {
    pub target_url: String,
    pub events: Vec<EventType>,
}

/// Parameters of a single webhook registration.
#[derive(Debug, Clone)]
pub struct RegisterWebhook<'a> {
    pub domain: &'a DomainName,
    pub auth_token: &'a str,
    pub name: &'a str,
    pub target: &'a WebhookTarget,
    pub secret_key: &'a str,
}

/// Registers webhook targets with the platform.
#[async_trait]
pub trait WebhookRegistrar: Send + Sync {
    /// Create the webhook and return the platform's id for it.
    async fn register(&self, request: RegisterWebhook<'_>) -> Result<String>;
}

/// [`WebhookRegistrar`] that calls the platform's GraphQL API.
#[derive(Debug, Clone)]
pub struct GraphqlRegistrar {
    client: Client,
    use_insecure_http: bool,
}

impl GraphqlRegistrar {
    pub fn new(use_insecure_http: bool, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            use_insecure_http,
        })
    }

    /// GraphQL endpoint of the installation at `domain`.
    pub fn api_url(&self, domain: &DomainName) -> String {
        let scheme = if self.use_insecure_http { "http" } else { "https" };
        format!("{}://{}/graphql/", scheme, domain)
    }
}

#[derive(Debug, Deserialize)]
struct GraphqlResponse {
    data: Option<CreateWebhookData>,
    #[serde(default)]
    errors: Vec<GraphqlError>,
}

#[derive(Debug, Deserialize)]
struct GraphqlError {
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateWebhookData {
    webhook_create: Option<WebhookCreatePayload>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WebhookCreatePayload {
    #[serde(default)]
    webhook_errors: Vec<WebhookError>,
    webhook: Option<CreatedWebhook>,
}

#[derive(Debug, Deserialize)]
struct WebhookError {
    field: Option<String>,
    message: Option<String>,
    code: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CreatedWebhook {
    id: String,
}

#[async_trait]
impl WebhookRegistrar for GraphqlRegistrar {
    async fn register(&self, request: RegisterWebhook<'_>) -> Result<String> {
        let url = self.api_url(request.domain);
        let body = json!({
            "query": CREATE_WEBHOOK,
            "variables": {
                "input": {
                    "name": request.name,
                    "targetUrl": request.target.target_url,
                    "events": request.target.events,
                    "secretKey": request.secret_key,
                }
            }
        });

        let response = self
            .client
            .post(&url)
            .bearer_auth(request.auth_token)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("Failed to reach {}", url))?;

        let status = response.status();
        if !status.is_success() {
            bail!("webhookCreate returned HTTP {}", status);
        }

        let response: GraphqlResponse = response
            .json()
            .await
            .context("Failed to decode webhookCreate response")?;

        if let Some(error) = response.errors.first() {
            bail!("webhookCreate failed: {}", error.message);
        }

        let payload = response
            .data
            .and_then(|d| d.webhook_create)
            .ok_or_else(|| anyhow!("webhookCreate returned no data"))?;

        if let Some(error) = payload.webhook_errors.first() {
            bail!(
                "webhookCreate rejected: {} (field: {}, code: {})",
                error.message.as_deref().unwrap_or("unknown error"),
                error.field.as_deref().unwrap_or("-"),
                error.code.as_deref().unwrap_or("-"),
            );
        }

        let webhook = payload
            .webhook
            .ok_or_else(|| anyhow!("webhookCreate returned no webhook"))?;

        Ok(webhook.id)
    }
}

/// Generate a fresh secret for signing webhook bodies.
pub fn generate_secret_key() -> String {
    hex::encode(rand::random::<[u8; 20]>())
}

/// Register every target for `domain` and persist the installation.
///
/// Registration failures mean the token is wrong or lacks permissions and
/// are reported as [`AppError::Forbidden`]. Nothing is saved in that case.
///
/// Registration is the only point where the token meets the platform. With
/// no targets the token is saved unchecked and the install succeeds.
pub async fn install_app(
    store: &dyn AppStore,
    registrar: &dyn WebhookRegistrar,
    domain: &DomainName,
    auth_token: &str,
    app_name: &str,
    targets: &[WebhookTarget],
) -> Result<WebhookData, AppError> {
    let secret_key = generate_secret_key();
    let mut webhook_ids = BTreeMap::new();

    for target in targets {
        let id = registrar
            .register(RegisterWebhook {
                domain,
                auth_token,
                name: app_name,
                target,
                secret_key: &secret_key,
            })
            .await
            .map_err(|e| {
                warn!(
                    domain = %domain,
                    target_url = %target.target_url,
                    error = %e,
                    "install_webhook_registration_failed"
                );
                AppError::Forbidden("Incorrect token or not enough permissions".to_string())
            })?;

        info!(
            domain = %domain,
            target_url = %target.target_url,
            events = target.events.len(),
            webhook_id = %id,
            "install_webhook_registered"
        );
        webhook_ids.insert(target.target_url.clone(), id);
    }

    let data = WebhookData {
        token: auth_token.to_string(),
        webhook_ids,
        webhook_secret_key: secret_key,
    };

    store
        .save_app_data(domain, data.clone())
        .await
        .context("Failed to save app data")?;

    info!(domain = %domain, targets = targets.len(), "app_installed");

    Ok(data)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::store::MemoryStore;

    struct RecordingRegistrar {
        calls: Mutex<Vec<(String, String, Vec<EventType>)>>,
        fail: bool,
    }

    #[async_trait]
    impl WebhookRegistrar for RecordingRegistrar {
        async fn register(&self, request: RegisterWebhook<'_>) -> Result<String> {
            if self.fail {
                bail!("permission denied");
            }
            let mut calls = self.calls.lock().unwrap();
            calls.push((
                request.target.target_url.clone(),
                request.secret_key.to_string(),
                request.target.events.clone(),
            ));
            Ok(format!("V2ViaG9vazo{}", calls.len()))
        }
    }

    fn targets() -> Vec<WebhookTarget> {
        vec![
            WebhookTarget {
                target_url: "https://app.example.com/webhook".to_string(),
                events: vec![EventType::OrderCreated],
            },
            WebhookTarget {
                target_url: "amqp://broker/%2f?queue=products".to_string(),
                events: vec![EventType::ProductCreated, EventType::ProductUpdated],
            },
        ]
    }

    #[test]
    fn test_generate_secret_key() {
        let a = generate_secret_key();
        let b = generate_secret_key();
        assert_eq!(a.len(), 40);
        assert_ne!(a, b);
    }

    #[test]
    fn test_api_url_scheme() {
        let domain = DomainName::parse("shop.example.com").unwrap();
        let secure = GraphqlRegistrar::new(false, Duration::from_secs(1)).unwrap();
        let insecure = GraphqlRegistrar::new(true, Duration::from_secs(1)).unwrap();
        assert_eq!(secure.api_url(&domain), "https://shop.example.com/graphql/");
        assert_eq!(insecure.api_url(&domain), "http://shop.example.com/graphql/");
    }

    #[tokio::test]
    async fn test_install_registers_all_targets_with_one_secret() {
        let store = MemoryStore::new();
        let registrar = RecordingRegistrar {
            calls: Mutex::new(Vec::new()),
            fail: false,
        };
        let domain = DomainName::parse("shop.example.com").unwrap();

        let data = install_app(&store, &registrar, &domain, "app-token", "Order Sync", &targets())
            .await
            .unwrap();

        let calls = registrar.calls.lock().unwrap();
        assert_eq!(calls.len(), 2);
        assert!(calls.iter().all(|(_, secret, _)| *secret == data.webhook_secret_key));
        assert_eq!(data.webhook_ids.len(), 2);
        assert_eq!(data.token, "app-token");

        let stored = store.get_webhook_details(&domain).await.unwrap();
        assert_eq!(stored, Some(data.clone()));
    }

    #[tokio::test]
    async fn test_install_failure_saves_nothing() {
        let store = MemoryStore::new();
        let registrar = RecordingRegistrar {
            calls: Mutex::new(Vec::new()),
            fail: true,
        };
        let domain = DomainName::parse("shop.example.com").unwrap();

        let err = install_app(&store, &registrar, &domain, "bad-token", "Order Sync", &targets())
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Forbidden(_)));
        assert!(store.get_webhook_details(&domain).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_install_without_targets_saves_unchecked_token() {
        let store = MemoryStore::new();
        let registrar = RecordingRegistrar {
            calls: Mutex::new(Vec::new()),
            fail: true,
        };
        let domain = DomainName::parse("shop.example.com").unwrap();

        let data = install_app(&store, &registrar, &domain, "unchecked-token", "Order Sync", &[])
            .await
            .unwrap();

        assert!(registrar.calls.lock().unwrap().is_empty());
        assert!(data.webhook_ids.is_empty());
        assert_eq!(
            store.get_webhook_details(&domain).await.unwrap().map(|d| d.token),
            Some("unchecked-token".to_string())
        );
    }
}
