//! Saleor App Server - webhook receiver and installation endpoint.
//!
//! Runs the app with an in-memory store and handlers that log every order and
//! product event they receive. Queue handlers are enabled when CLOUDAMQP_URL
//! and QUEUE_TARGET_URL are both set.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::{net::TcpListener, signal};
use tracing::{error, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use saleor_app::{
    handler, AppSettings, DomainName, EventType, HandlerRegistry, Manifest, MemoryStore, QueueUrl,
    SaleorApp, Webhook, WebhookHandler,
};

#[tokio::main]
async fn main() -> Result<()> {
    let settings = AppSettings::from_env();

    // Initialize structured JSON logging
    let default_level = if settings.debug { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().json().flatten_event(true))
        .init();

    info!("app_server_starting");

    info!(
        port = settings.port,
        public_url = %settings.public_url,
        queue_configured = settings.queue.is_some(),
        allowed_domains = ?settings.allowed_domains,
        "config_loaded"
    );

    let store = match &settings.allowed_domains {
        Some(domains) => MemoryStore::with_allowed_domains(domains),
        None => MemoryStore::new(),
    };

    let mut handlers = HandlerRegistry::new()
        .on_http(EventType::OrderCreated, log_events())
        .on_http(EventType::OrderUpdated, log_events())
        .on_http(EventType::OrderFullyPaid, log_events())
        .on_http(EventType::ProductCreated, log_events())
        .on_http(EventType::ProductUpdated, log_events());

    if let Some(raw) = &settings.queue_target_url {
        let target = QueueUrl::parse(raw).context("Invalid QUEUE_TARGET_URL")?;
        handlers = handlers.on_queue(EventType::CheckoutUpdated, target, log_events());
    }

    let app = SaleorApp::builder(manifest(&settings), Arc::new(store), settings.clone())
        .handlers(handlers)
        .build()
        .context("Invalid app configuration")?;

    let consumer = app.queue_consumer().map(|consumer| {
        tokio::spawn(async move {
            if let Err(e) = consumer.run(shutdown_signal()).await {
                error!(error = %format!("{:#}", e), "queue_consumer_failed");
            }
        })
    });

    // Bind to address
    let addr = SocketAddr::from(([0, 0, 0, 0], settings.port));
    let listener = TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    info!(address = %addr, "app_server_listening");

    // Run server with graceful shutdown
    axum::serve(listener, app.router())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    if let Some(consumer) = consumer {
        if let Err(e) = consumer.await {
            error!(error = %e, "queue_consumer_join_failed");
        }
    }

    info!("app_server_shutdown_complete");

    Ok(())
}

fn manifest(settings: &AppSettings) -> Manifest {
    let base = settings.public_url.trim_end_matches('/');

    Manifest {
        id: settings.app_id.clone(),
        name: settings.app_name.clone(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        about: Some("Logs order and product events.".to_string()),
        permissions: vec!["MANAGE_ORDERS".to_string(), "MANAGE_PRODUCTS".to_string()],
        extensions: Vec::new(),
        data_privacy: "Event payloads are logged and not stored.".to_string(),
        data_privacy_url: format!("{}/privacy", base),
        homepage_url: base.to_string(),
        support_url: format!("{}/support", base),
        configuration_url: None,
        app_url: format!("{}/app", base),
        token_target_url: None,
    }
}

fn log_events() -> WebhookHandler {
    handler(|payload: Vec<Webhook>, domain: DomainName| async move {
        for webhook in &payload {
            info!(
                domain = %domain,
                id = webhook.id().unwrap_or("unknown"),
                "event_logged"
            );
        }
        Ok(())
    })
}

/// Create a future that completes when a shutdown signal is received.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "ctrl_c_handler_failed");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "sigterm_handler_failed");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT"),
        _ = terminate => info!("Received SIGTERM"),
    }

    info!("app_server_shutting_down");
}
