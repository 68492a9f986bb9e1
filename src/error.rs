// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application error types with a uniform shape for API failures.

use serde::{Deserialize, Serialize};
use validator::{ValidationError, ValidationErrors};

/// Normalized error for any HTTP failure other than an exhausted 401.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiError {
    /// Machine-readable code (e.g. `NOT_FOUND`, `RATE_LIMITED`)
    pub code: String,
    /// Human-readable message
    pub message: String,
    /// Structured details from the server, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    /// Whether retrying the same request may succeed
    pub retryable: bool,
    /// HTTP status, absent for transport failures
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

impl ApiError {
    pub const NETWORK_ERROR: &'static str = "NETWORK_ERROR";
    pub const TIMEOUT: &'static str = "TIMEOUT";
    pub const PARSE_ERROR: &'static str = "PARSE_ERROR";

    /// Build an error for an HTTP status, filling in the default code.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        Self {
            code: default_code(status).to_string(),
            message: message.into(),
            details: None,
            retryable: is_retryable_status(status),
            status: Some(status),
        }
    }

    /// Error for a request that never produced a response.
    pub fn network(message: impl Into<String>) -> Self {
        Self {
            code: Self::NETWORK_ERROR.to_string(),
            message: message.into(),
            details: None,
            retryable: true,
            status: None,
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self {
            code: Self::TIMEOUT.to_string(),
            message: message.into(),
            details: None,
            retryable: true,
            status: None,
        }
    }

    /// Error for a response body that could not be decoded.
    pub fn parse(message: impl Into<String>) -> Self {
        Self {
            code: Self::PARSE_ERROR.to_string(),
            message: message.into(),
            details: None,
            retryable: false,
            status: None,
        }
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

/// 5xx and 429 are worth retrying; everything else is final.
pub fn is_retryable_status(status: u16) -> bool {
    status >= 500 || status == 429
}

fn default_code(status: u16) -> &'static str {
    match status {
        400 => "BAD_REQUEST",
        401 => "UNAUTHORIZED",
        403 => "FORBIDDEN",
        404 => "NOT_FOUND",
        408 => "REQUEST_TIMEOUT",
        409 => "CONFLICT",
        422 => "VALIDATION_ERROR",
        429 => "RATE_LIMITED",
        500..=599 => "SERVER_ERROR",
        _ => "HTTP_ERROR",
    }
}

/// Application error type.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Client-side validation failure; never reaches the network.
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationErrors),

    #[error("API error: {0}")]
    Api(ApiError),

    /// No usable session (refresh exhausted or never logged in).
    #[error("Authentication required: {0}")]
    Auth(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Single-field validation failure.
    pub fn field(field: &'static str, message: impl Into<String>) -> Self {
        let mut error = ValidationError::new("invalid");
        error.message = Some(message.into().into());
        let mut errors = ValidationErrors::new();
        errors.add(field, error);
        AppError::Validation(errors)
    }

    /// Whether the caller may retry the operation unchanged.
    pub fn is_retryable(&self) -> bool {
        match self {
            AppError::Api(err) => err.retryable,
            _ => false,
        }
    }

    /// Whether this error means the session is gone.
    pub fn is_auth_error(&self) -> bool {
        matches!(self, AppError::Auth(_))
    }

    /// Machine-readable code, matching `ApiError::code` for API failures.
    pub fn code(&self) -> &str {
        match self {
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::Api(err) => &err.code,
            AppError::Auth(_) => "UNAUTHORIZED",
            AppError::Storage(_) => "STORAGE_ERROR",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Conflict(_) => "CONFLICT",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<ApiError> for AppError {
    fn from(err: ApiError) -> Self {
        AppError::Api(err)
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, AppError>;
