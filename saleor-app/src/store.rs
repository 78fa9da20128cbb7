//! Caller-supplied persistence and domain allow-listing.
//!
//! The app layer keeps no durable state of its own. Everything it needs to
//! remember about an installation goes through an [`AppStore`].

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::info;

use crate::schemas::{DomainName, WebhookData};

/// Collaborator callbacks the app calls while serving requests.
#[async_trait]
pub trait AppStore: Send + Sync {
    /// Whether requests from this domain are accepted at all.
    async fn validate_domain(&self, domain: &DomainName) -> bool;

    /// Persist installation data. Replaces whatever was stored before.
    async fn save_app_data(&self, domain: &DomainName, data: WebhookData) -> anyhow::Result<()>;

    /// Installation data for a domain, if it was ever installed.
    async fn get_webhook_details(&self, domain: &DomainName) -> anyhow::Result<Option<WebhookData>>;
}

/// Process-local store for development and tests.
///
/// With no allow-list every well-formed domain is accepted.
#[derive(Debug, Default)]
pub struct MemoryStore {
    allowed: Option<HashSet<DomainName>>,
    data: RwLock<HashMap<DomainName, WebhookData>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Only accept the listed domains. Malformed entries are skipped.
    pub fn with_allowed_domains<I, S>(domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let allowed = domains
            .into_iter()
            .filter_map(|d| DomainName::parse(d.as_ref()).ok())
            .collect();

        Self {
            allowed: Some(allowed),
            data: RwLock::default(),
        }
    }

    /// Seed installation data without going through the install flow.
    pub async fn insert(&self, domain: DomainName, data: WebhookData) {
        self.data.write().await.insert(domain, data);
    }
}

#[async_trait]
impl AppStore for MemoryStore {
    async fn validate_domain(&self, domain: &DomainName) -> bool {
        match &self.allowed {
            Some(allowed) => allowed.contains(domain),
            None => true,
        }
    }

    async fn save_app_data(&self, domain: &DomainName, data: WebhookData) -> anyhow::Result<()> {
        let replaced = self.data.write().await.insert(domain.clone(), data).is_some();
        info!(domain = %domain, replaced = replaced, "app_data_saved");
        Ok(())
    }

    async fn get_webhook_details(&self, domain: &DomainName) -> anyhow::Result<Option<WebhookData>> {
        Ok(self.data.read().await.get(domain).cloned())
    }
}
