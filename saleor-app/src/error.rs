//! Error taxonomy for the app layer.
//!
//! Every failure a request can hit maps onto one HTTP status. The response
//! body is always `{"detail": "..."}`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::error;

/// Errors raised while building the app or serving a request.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Invalid settings detected while building the app. Fatal.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A required request header is absent.
    #[error("Missing {0} header")]
    MissingHeader(&'static str),

    /// The request body could not be decoded.
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    /// Webhook received from a domain that is malformed or not allowed.
    #[error("Provided domain {0} is invalid")]
    UnknownDomain(String),

    /// Installation refused: bad domain, bad token or missing permissions.
    #[error("{0}")]
    Forbidden(String),

    /// Signature is missing its secret or does not match the body.
    #[error("Incorrect signature")]
    Authentication,

    /// No handler is bound for the event type.
    #[error("Incorrect saleor event: {0}")]
    NotFound(String),

    /// A webhook handler returned an error.
    #[error("webhook handler failed")]
    Handler(#[source] anyhow::Error),

    /// A collaborator failed in an unexpected way.
    #[error("internal error")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// HTTP status the error is surfaced as.
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::MissingHeader(_) | AppError::InvalidPayload(_) => StatusCode::BAD_REQUEST,
            AppError::UnknownDomain(_) | AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Authentication => StatusCode::UNAUTHORIZED,
            AppError::Handler(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// JSON error body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub detail: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = ?self, "request_failed");
        }

        (
            status,
            Json(ErrorResponse {
                detail: self.to_string(),
            }),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            AppError::MissingHeader("x-saleor-domain").status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::UnknownDomain("shop.example.com".into()).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(AppError::Forbidden("nope".into()).status(), StatusCode::FORBIDDEN);
        assert_eq!(AppError::Authentication.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            AppError::NotFound("PRODUCT_CREATED".into()).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::Handler(anyhow::anyhow!("boom")).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_internal_details_not_leaked() {
        let err = AppError::Internal(anyhow::anyhow!("database password is hunter2"));
        assert_eq!(err.to_string(), "internal error");
    }
}
