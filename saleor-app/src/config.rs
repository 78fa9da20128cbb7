//! Configuration module for environment variable parsing.
//!
//! Reads all settings from environment variables. Settings are validated once
//! when the app is built, see [`AppSettings::validate`].

use std::env;
use tracing::warn;
use url::Url;

use crate::error::AppError;
use crate::schemas::Broker;

/// Application settings loaded from environment variables.
#[derive(Debug, Clone)]
pub struct AppSettings {
    /// Port for the web server to listen on
    pub port: u16,

    /// Externally reachable base URL of this app, used to build the webhook
    /// target and the manifest's token target URL
    pub public_url: String,

    /// Enables verbose logging in the bundled binary
    pub debug: bool,

    /// Talk to the platform's GraphQL API over plain HTTP
    pub use_insecure_saleor_http: bool,

    /// Timeout for requests made to the platform, in milliseconds
    pub saleor_request_timeout_ms: u64,

    /// Queue transport settings, required when queue handlers are bound
    pub queue: Option<QueueSettings>,

    /// Domains accepted by the bundled in-memory store
    pub allowed_domains: Option<Vec<String>>,

    /// Manifest id of the bundled binary
    pub app_id: String,

    /// Manifest name of the bundled binary, also used to name its webhooks
    pub app_name: String,

    /// Queue target the bundled binary binds its queue handler to
    pub queue_target_url: Option<String>,
}

/// Credentials for the experimental queue transport.
#[derive(Debug, Clone)]
pub struct QueueSettings {
    /// AMQP broker connection URL
    pub url: String,

    /// Number of unacknowledged deliveries the consumer may hold
    pub prefetch: u16,
}

impl AppSettings {
    /// Load settings from environment variables.
    pub fn from_env() -> Self {
        let port = env::var("PORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(8080);

        AppSettings {
            port,

            public_url: env::var("PUBLIC_URL")
                .unwrap_or_else(|_| format!("http://localhost:{}", port)),

            debug: parse_bool("DEBUG"),

            use_insecure_saleor_http: parse_bool("USE_INSECURE_SALEOR_HTTP"),

            saleor_request_timeout_ms: env::var("SALEOR_REQUEST_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(8000),

            queue: env::var("CLOUDAMQP_URL").ok().map(|url| QueueSettings {
                url,
                prefetch: env::var("QUEUE_PREFETCH")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(10),
            }),

            allowed_domains: parse_csv("ALLOWED_DOMAINS"),

            app_id: env::var("APP_ID").unwrap_or_else(|_| "saleor.app.example".to_string()),

            app_name: env::var("APP_NAME").unwrap_or_else(|_| "Example App".to_string()),

            queue_target_url: env::var("QUEUE_TARGET_URL")
                .ok()
                .filter(|v| !v.trim().is_empty()),
        }
    }

    /// Check the settings are usable.
    pub fn validate(&self) -> Result<(), AppError> {
        self.public_base_url()?;

        if let Some(queue) = &self.queue {
            queue.broker()?;
        }

        Ok(())
    }

    /// The public URL parsed, without a trailing slash in its path.
    pub fn public_base_url(&self) -> Result<Url, AppError> {
        let url = Url::parse(self.public_url.trim_end_matches('/')).map_err(|e| {
            AppError::Configuration(format!("invalid public URL {}: {}", self.public_url, e))
        })?;

        match url.scheme() {
            "http" | "https" => Ok(url),
            scheme => Err(AppError::Configuration(format!(
                "public URL must use http or https, got {}",
                scheme
            ))),
        }
    }

    /// Absolute URL of an app route, e.g. `/webhook`.
    pub fn public_route(&self, path: &str) -> Result<String, AppError> {
        let base = self.public_base_url()?;
        Ok(format!(
            "{}{}",
            base.as_str().trim_end_matches('/'),
            path
        ))
    }
}

impl QueueSettings {
    /// The broker this consumer connects to.
    pub fn broker(&self) -> Result<Broker, AppError> {
        let url = Url::parse(self.url.trim())
            .map_err(|e| AppError::Configuration(format!("invalid queue broker URL: {}", e)))?;

        match url.scheme() {
            "amqp" | "amqps" if url.host_str().is_some_and(|h| !h.is_empty()) => {
                Ok(Broker::from_url(&url))
            }
            "amqp" | "amqps" => Err(AppError::Configuration(
                "queue broker URL has no host".to_string(),
            )),
            scheme => Err(AppError::Configuration(format!(
                "queue broker URL must use amqp or amqps, got {}",
                scheme
            ))),
        }
    }
}

impl Default for AppSettings {
    fn default() -> Self {
        AppSettings {
            port: 8080,
            public_url: "http://localhost:8080".to_string(),
            debug: false,
            use_insecure_saleor_http: false,
            saleor_request_timeout_ms: 8000,
            queue: None,
            allowed_domains: None,
            app_id: "saleor.app.example".to_string(),
            app_name: "Example App".to_string(),
            queue_target_url: None,
        }
    }
}

/// Parse a boolean flag like "1", "true" or "yes".
fn parse_bool(name: &str) -> bool {
    match env::var(name) {
        Ok(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => true,
            "" | "0" | "false" | "no" | "off" => false,
            _ => {
                warn!(env_var = name, value = %raw, "Invalid boolean, using false");
                false
            }
        },
        Err(_) => false,
    }
}

/// Parse a comma-separated list of strings.
fn parse_csv(name: &str) -> Option<Vec<String>> {
    env::var(name).ok().map(|raw| {
        raw.split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    })
}
