//! Error types for Memento operations.
//!
//! This module provides a comprehensive error hierarchy that covers every
//! failure mode described by the service's error handling design: auth,
//! authorization, quota, validation, not-found, integrity, and rate-limit.
//! All errors are well-typed and can be pattern-matched for precise handling,
//! and every variant maps to exactly one HTTP status code at the edge.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

/// The main error type for Memento operations.
///
/// All fallible operations return `Result<T, MementoError>`. Bearer
/// credentials and other sensitive values are never interpolated into a
/// variant's message.
#[derive(Error, Debug)]
pub enum MementoError {
    /// Missing, malformed, unknown, or revoked credential.
    #[error("authentication failed")]
    Authentication,

    /// Request touches a resource it is not entitled to (e.g. image path
    /// workspace mismatch).
    #[error("not authorized for this resource")]
    Authorization,

    /// A plan-level quota was exceeded.
    #[error("{resource} quota exceeded ({current}/{limit})")]
    Quota {
        resource: String,
        limit: u64,
        current: u64,
    },

    /// A request failed validation (bad field, unknown enum variant, too
    /// many images, empty ingest batch, etc).
    #[error("{0}")]
    Validation(String),

    /// An id lookup found nothing.
    #[error("{kind} '{id}' not found")]
    NotFound { kind: &'static str, id: String },

    /// A stored value violates an invariant the system relies on (most
    /// commonly a malformed `enc:` payload). Never silently downgraded to
    /// plaintext.
    #[error("integrity violation: {0}")]
    Integrity(String),

    /// Signup rate limit exceeded.
    #[error("rate limited, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    /// Underlying persistence failure.
    #[error("storage error: {0}")]
    Storage(String),

    /// Underlying cryptography failure that is not an integrity violation
    /// of stored data (e.g. a missing key material at startup).
    #[error("crypto error: {0}")]
    Crypto(String),

    /// JSON (de)serialization failure.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl MementoError {
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            MementoError::Authentication => (StatusCode::UNAUTHORIZED, "authentication_failed"),
            MementoError::Authorization => (StatusCode::FORBIDDEN, "forbidden"),
            MementoError::Quota { .. } => (StatusCode::FORBIDDEN, "quota_exceeded"),
            MementoError::Validation(_) => (StatusCode::BAD_REQUEST, "validation_error"),
            MementoError::NotFound { .. } => (StatusCode::NOT_FOUND, "not_found"),
            MementoError::Integrity(_) => (StatusCode::INTERNAL_SERVER_ERROR, "integrity_error"),
            MementoError::RateLimited { .. } => (StatusCode::TOO_MANY_REQUESTS, "rate_limited"),
            MementoError::Storage(_) => (StatusCode::INTERNAL_SERVER_ERROR, "storage_error"),
            MementoError::Crypto(_) => (StatusCode::INTERNAL_SERVER_ERROR, "crypto_error"),
            MementoError::Serialization(_) => (StatusCode::BAD_REQUEST, "serialization_error"),
        }
    }
}

/// Wire shape for an error response body.
#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    limit: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    current: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    retry_after: Option<u64>,
}

impl IntoResponse for MementoError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        if matches!(status, StatusCode::INTERNAL_SERVER_ERROR) {
            tracing::warn!(error = %self, "internal error");
        }
        let body = ErrorBody {
            error: code,
            message: self.to_string(),
            limit: match &self {
                MementoError::Quota { limit, .. } => Some(*limit),
                _ => None,
            },
            current: match &self {
                MementoError::Quota { current, .. } => Some(*current),
                _ => None,
            },
            retry_after: match &self {
                MementoError::RateLimited { retry_after_secs } => Some(*retry_after_secs),
                _ => None,
            },
        };
        (status, Json(body)).into_response()
    }
}

/// Convenience alias used throughout the crate.
pub type MementoResult<T> = Result<T, MementoError>;

impl From<libsql::Error> for MementoError {
    fn from(e: libsql::Error) -> Self {
        MementoError::Storage(e.to_string())
    }
}
