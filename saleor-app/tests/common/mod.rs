//! Shared helpers for HTTP integration tests.
//!
//! Requests go through the full axum router with `tower::ServiceExt::oneshot`.
#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, Response, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use saleor_app::install::RegisterWebhook;
use saleor_app::{
    AppSettings, AppStore, DomainName, Manifest, MemoryStore, WebhookData, WebhookRegistrar,
};
use serde_json::Value;
use tower::ServiceExt;

pub const DOMAIN: &str = "shop.example.com";
pub const SECRET: &str = "webhook-secret";

/// Store that counts every collaborator call.
#[derive(Default)]
pub struct CountingStore {
    pub inner: MemoryStore,
    pub validate_calls: AtomicUsize,
    pub save_calls: AtomicUsize,
    pub details_calls: AtomicUsize,
}

impl CountingStore {
    pub fn allowing(domains: &[&str]) -> Self {
        Self {
            inner: MemoryStore::with_allowed_domains(domains.iter().copied()),
            ..Default::default()
        }
    }

    /// Store with `DOMAIN` allowed and installed with `SECRET`.
    pub async fn installed() -> Self {
        let store = Self::allowing(&[DOMAIN]);
        store
            .inner
            .insert(
                DomainName::parse(DOMAIN).unwrap(),
                WebhookData {
                    token: "app-token".to_string(),
                    webhook_ids: Default::default(),
                    webhook_secret_key: SECRET.to_string(),
                },
            )
            .await;
        store
    }

    pub fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AppStore for CountingStore {
    async fn validate_domain(&self, domain: &DomainName) -> bool {
        self.validate_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.validate_domain(domain).await
    }

    async fn save_app_data(&self, domain: &DomainName, data: WebhookData) -> anyhow::Result<()> {
        self.save_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.save_app_data(domain, data).await
    }

    async fn get_webhook_details(&self, domain: &DomainName) -> anyhow::Result<Option<WebhookData>> {
        self.details_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.get_webhook_details(domain).await
    }
}

/// Registrar that accepts one token and records every registration.
pub struct FakeRegistrar {
    pub valid_token: String,
    pub registered: Mutex<Vec<(String, String)>>,
}

impl FakeRegistrar {
    pub fn accepting(token: &str) -> Self {
        Self {
            valid_token: token.to_string(),
            registered: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl WebhookRegistrar for FakeRegistrar {
    async fn register(&self, request: RegisterWebhook<'_>) -> anyhow::Result<String> {
        if request.auth_token != self.valid_token {
            anyhow::bail!("invalid token");
        }
        let mut registered = self.registered.lock().unwrap();
        registered.push((request.domain.to_string(), request.target.target_url.clone()));
        Ok(format!("webhook-{}", registered.len()))
    }
}

pub fn manifest() -> Manifest {
    Manifest {
        id: "example.order-sync".to_string(),
        name: "Order Sync".to_string(),
        version: "0.1.0".to_string(),
        about: Some("Keeps orders in sync".to_string()),
        permissions: vec!["MANAGE_ORDERS".to_string()],
        extensions: vec![],
        data_privacy: "No personal data stored".to_string(),
        data_privacy_url: "https://app.example.com/privacy".to_string(),
        homepage_url: "https://app.example.com".to_string(),
        support_url: "https://app.example.com/support".to_string(),
        configuration_url: None,
        app_url: "https://app.example.com/app".to_string(),
        token_target_url: None,
    }
}

pub fn settings() -> AppSettings {
    AppSettings {
        public_url: "https://app.example.com".to_string(),
        ..Default::default()
    }
}

/// Send a request through the router and return status and body.
pub async fn send(router: Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response: Response<Body> = router.oneshot(request).await.unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    (status, body.to_vec())
}

pub fn json(body: &[u8]) -> Value {
    serde_json::from_slice(body).unwrap()
}

pub fn shared<T>(value: T) -> Arc<T> {
    Arc::new(value)
}
