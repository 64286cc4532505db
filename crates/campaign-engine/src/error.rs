/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! The engine's single error type.
//!
//! `EngineError` is threaded through the DAL, the resilience fabric, the
//! normalizer, and the API handlers. It implements `IntoResponse` directly so
//! handlers can simply return `Result<Json<T>, EngineError>` and get the
//! envelope shape from spec.md §6 (`{success, data}` / `{success, error,
//! details}`) for free.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),

    #[error("connection pool exhausted: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("resource not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("invalid state transition: {0}")]
    InvalidTransition(String),

    #[error("signature verification failed")]
    SignatureVerificationFailed,

    #[error("unauthorized")]
    Unauthorized,

    #[error("rate limit exceeded, retry after {retry_after_secs}s")]
    RateLimitExceeded { retry_after_secs: u64 },

    #[error("circuit open for provider {0}")]
    CircuitOpen(String),

    #[error("provider error: {0}")]
    Provider(String),

    #[error("transient error: {0}")]
    Transient(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl EngineError {
    /// HTTP status code for this error, per spec.md §7's taxonomy.
    pub fn status_code(&self) -> StatusCode {
        match self {
            EngineError::Database(_) | EngineError::Pool(_) | EngineError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            EngineError::Validation(_) | EngineError::InvalidTransition(_) => StatusCode::UNPROCESSABLE_ENTITY,
            EngineError::NotFound(_) => StatusCode::NOT_FOUND,
            EngineError::Conflict(_) => StatusCode::CONFLICT,
            EngineError::SignatureVerificationFailed | EngineError::Unauthorized => {
                StatusCode::UNAUTHORIZED
            }
            EngineError::RateLimitExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
            EngineError::CircuitOpen(_) => StatusCode::SERVICE_UNAVAILABLE,
            EngineError::Provider(_) | EngineError::Transient(_) => StatusCode::BAD_GATEWAY,
            EngineError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Whether a failed operation of this kind should be retried per §4.3/§7.
    ///
    /// Validation, signature, and dedup-shaped errors are never retryable;
    /// network/5xx/circuit-open/timeout-shaped ones are.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            EngineError::Transient(_) | EngineError::CircuitOpen(_) | EngineError::Pool(_)
        )
    }

    /// True when this is Postgres's unique-violation signal — the dedup
    /// primitive in spec.md §4.5 step 5, not a failure to log.
    pub fn is_unique_violation(&self) -> bool {
        matches!(
            self,
            EngineError::Database(diesel::result::Error::DatabaseError(
                diesel::result::DatabaseErrorKind::UniqueViolation,
                _,
            ))
        )
    }

    pub fn should_log(&self) -> bool {
        !self.is_unique_violation()
    }
}

#[derive(Serialize)]
struct ErrorEnvelope {
    success: bool,
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<Value>,
}

impl IntoResponse for EngineError {
    fn into_response(self) -> Response {
        if self.should_log() {
            tracing::warn!(error = %self, "request failed");
        }
        let status = self.status_code();
        let body = ErrorEnvelope {
            success: false,
            error: self.to_string(),
            details: None,
        };
        (status, Json(body)).into_response()
    }
}

/// The success half of the `{success, data}` / `{success, error}` envelope.
/// Handlers build one with [`Envelope::new`] and return it wrapped in
/// `(StatusCode, Json<Envelope<T>>)`.
#[derive(Serialize)]
pub struct Envelope<T> {
    pub success: bool,
    pub data: T,
}

impl<T> Envelope<T> {
    pub fn new(data: T) -> Self {
        Envelope { success: true, data }
    }
}
