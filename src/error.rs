// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application error types with consistent API responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Application error type that converts to HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Authentication required")]
    Unauthorized,

    /// Rejection surfaced by the identity provider (bad credentials,
    /// unknown account, network failure).
    #[error("Identity provider error: {0}")]
    Identity(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Firebase error code for a wrong password.
    pub const INVALID_PASSWORD: &'static str = "INVALID_PASSWORD";
    /// Firebase error code for credentials that match no account.
    pub const INVALID_CREDENTIALS: &'static str = "INVALID_LOGIN_CREDENTIALS";

    /// Whether the provider rejected the credentials themselves, as opposed
    /// to failing for an infrastructure reason.
    pub fn is_credential_error(&self) -> bool {
        match self {
            AppError::Identity(msg) => {
                msg.starts_with(Self::INVALID_PASSWORD)
                    || msg.starts_with(Self::INVALID_CREDENTIALS)
                    || msg.starts_with("EMAIL_NOT_FOUND")
                    || msg.starts_with("INVALID_IDP_RESPONSE")
            }
            _ => false,
        }
    }
}

/// JSON error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, details) = match &self {
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized", None),
            AppError::Identity(msg) => {
                tracing::debug!(error = %msg, "Identity provider rejected request");
                (StatusCode::UNAUTHORIZED, "identity_error", Some(msg.clone()))
            }
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", Some(msg.clone())),
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, "bad_request", Some(msg.clone()))
            }
            AppError::Database(msg) => {
                tracing::error!(error = %msg, "Database error");
                (StatusCode::INTERNAL_SERVER_ERROR, "database_error", None)
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "Internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", None)
            }
        };

        let body = ErrorResponse {
            error: error.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for handlers
pub type Result<T> = std::result::Result<T, AppError>;
