// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Response decoding and error normalization.

use crate::error::{ApiError, AppError, Result};
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Decode a response: 2xx bodies as `T` (empty body as JSON `null`), any
/// other status as a normalized [`ApiError`].
pub(crate) async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
    let status = response.status();
    let body = response
        .bytes()
        .await
        .map_err(|e| ApiError::network(format!("Failed to read response body: {}", e)))?;

    if !status.is_success() {
        return Err(AppError::Api(normalize_error(status.as_u16(), &body)));
    }

    let body: &[u8] = if body.iter().all(u8::is_ascii_whitespace) {
        b"null"
    } else {
        &body
    };
    serde_json::from_slice(body).map_err(|e| {
        tracing::warn!(status = status.as_u16(), error = %e, "Failed to decode response");
        AppError::Api(ApiError::parse(format!("Invalid response body: {}", e)))
    })
}

/// Build an [`ApiError`] from a failed response.
///
/// Accepts `{code, message, details}`, `{error: {code, message, details}}`,
/// `{error: "...", message?, details?}` and plain-text bodies.
pub fn normalize_error(status: u16, body: &[u8]) -> ApiError {
    let mut error = ApiError::from_status(status, default_message(status));

    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(map)) => {
            let source = match map.get("error") {
                Some(Value::Object(inner)) => inner,
                _ => &map,
            };
            if let Some(code) = source.get("code").and_then(Value::as_str) {
                error.code = code.to_string();
            }
            let message = source
                .get("message")
                .and_then(Value::as_str)
                .or_else(|| map.get("error").and_then(Value::as_str));
            if let Some(message) = message {
                error.message = message.to_string();
            }
            error.details = source.get("details").filter(|d| !d.is_null()).cloned();
        }
        Ok(Value::String(message)) if !message.is_empty() => error.message = message,
        Ok(_) => {}
        Err(_) => {
            let text = String::from_utf8_lossy(body);
            let text = text.trim();
            if !text.is_empty() {
                error.message = text.to_string();
            }
        }
    }

    error
}

fn default_message(status: u16) -> String {
    StatusCode::from_u16(status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .unwrap_or("Request failed")
        .to_string()
}

/// Map a transport failure (no response) to an [`ApiError`].
pub(crate) fn transport_error(err: &reqwest::Error) -> ApiError {
    if err.is_timeout() {
        ApiError::timeout(format!("Request timed out: {}", err))
    } else {
        ApiError::network(format!("Network error: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_flat_shape() {
        let body = json!({
            "code": "EVENT_FULL",
            "message": "This event is full",
            "details": {"capacity": 10}
        });
        let err = normalize_error(409, body.to_string().as_bytes());
        assert_eq!(err.code, "EVENT_FULL");
        assert_eq!(err.message, "This event is full");
        assert_eq!(err.details, Some(json!({"capacity": 10})));
        assert_eq!(err.status, Some(409));
        assert!(!err.retryable);
    }

    #[test]
    fn test_nested_error_object() {
        let body = json!({"error": {"code": "NOPE", "message": "Nested message"}});
        let err = normalize_error(400, body.to_string().as_bytes());
        assert_eq!(err.code, "NOPE");
        assert_eq!(err.message, "Nested message");
        assert!(err.details.is_none());
    }

    #[test]
    fn test_error_string_with_details() {
        let body = json!({"error": "Invalid input", "details": "capacity too large"});
        let err = normalize_error(422, body.to_string().as_bytes());
        assert_eq!(err.code, "VALIDATION_ERROR");
        assert_eq!(err.message, "Invalid input");
        assert_eq!(err.details, Some(json!("capacity too large")));

        let body = json!({"error": "Bad", "message": "Longer explanation"});
        let err = normalize_error(400, body.to_string().as_bytes());
        assert_eq!(err.message, "Longer explanation");
    }

    #[test]
    fn test_plain_text_and_empty_bodies() {
        let err = normalize_error(502, b"upstream connect error");
        assert_eq!(err.code, "SERVER_ERROR");
        assert_eq!(err.message, "upstream connect error");
        assert!(err.retryable);

        let err = normalize_error(503, b"");
        assert_eq!(err.message, "Service Unavailable");
    }
}
