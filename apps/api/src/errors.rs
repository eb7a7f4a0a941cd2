use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

use crate::billing::BillingError;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid subscription tier: {0}")]
    InvalidTier(String),

    #[error("User {0} not found")]
    UserNotFound(Uuid),

    #[error("No active subscription found")]
    NoActiveSubscription,

    #[error("Quota exceeded: {0}")]
    QuotaExceeded(String),

    #[error("Billing provider unavailable: {0}")]
    BillingTransient(String),

    #[error("Billing provider rejected the request: {0}")]
    BillingRejected(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<BillingError> for AppError {
    fn from(err: BillingError) -> Self {
        match err {
            BillingError::Transient(msg) => AppError::BillingTransient(msg),
            BillingError::Rejected(msg) => AppError::BillingRejected(msg),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::InvalidTier(tier) => (
                StatusCode::BAD_REQUEST,
                "INVALID_TIER",
                format!("Invalid subscription tier '{tier}'"),
            ),
            AppError::UserNotFound(_) => (
                StatusCode::NOT_FOUND,
                "USER_NOT_FOUND",
                "User not found".to_string(),
            ),
            AppError::NoActiveSubscription => (
                StatusCode::BAD_REQUEST,
                "NO_ACTIVE_SUBSCRIPTION",
                "No active subscription found".to_string(),
            ),
            AppError::QuotaExceeded(reason) => (
                StatusCode::FORBIDDEN,
                "QUOTA_EXCEEDED",
                format!("{reason}. Upgrade your plan to keep posting this month."),
            ),
            AppError::BillingTransient(msg) => {
                tracing::warn!("Billing provider unavailable: {msg}");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "BILLING_UNAVAILABLE",
                    "The payment provider could not be reached. Please try again.".to_string(),
                )
            }
            // Provider messages (e.g. card declined) are shown to the user verbatim.
            AppError::BillingRejected(msg) => {
                (StatusCode::PAYMENT_REQUIRED, "BILLING_REJECTED", msg.clone())
            }
            AppError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
            AppError::Database(e) => {
                tracing::error!("Database error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "DATABASE_ERROR",
                    "A database error occurred".to_string(),
                )
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}
