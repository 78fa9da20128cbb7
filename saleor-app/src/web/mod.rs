//! Web server module.
//!
//! Serves the configuration routes the platform calls during installation
//! and the webhook endpoint it posts events to.

pub mod handlers;
pub mod signature;

pub use handlers::{handle_webhook, health, install, manifest, AppState, HealthResponse};
pub use signature::{compute_signature, verify_signature};
