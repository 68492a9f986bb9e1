// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Authentication tokens and credential payloads.

use crate::models::User;
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Access/refresh token pair as issued by `auth/login` and `auth/refresh`.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthTokens {
    pub access_token: String,
    pub refresh_token: String,
    /// Absolute deadline in epoch milliseconds
    pub expires_at: i64,
}

impl AuthTokens {
    /// True once `now_ms` is past the access token deadline.
    pub fn is_expired_at(&self, now_ms: i64) -> bool {
        self.expires_at < now_ms
    }

    /// Milliseconds until the access token expires (negative once expired).
    pub fn remaining_millis(&self, now_ms: i64) -> i64 {
        self.expires_at - now_ms
    }
}

impl std::fmt::Debug for AuthTokens {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthTokens")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Bookkeeping stored next to the tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenMetadata {
    pub issued_at: i64,
    pub expires_at: i64,
    /// Deadline for the refresh token (7 or 90 days after issue)
    pub refresh_expires_at: i64,
}

/// Result of a successful login or registration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthSession {
    pub user: User,
    pub tokens: AuthTokens,
}

/// Login form payload.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct LoginInput {
    #[validate(custom(function = "crate::validation::auth::check_email"))]
    pub email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
    /// Keeps the refresh token for 90 days instead of 7
    #[serde(default)]
    pub remember_me: bool,
}

/// Registration form payload.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegisterInput {
    #[validate(custom(function = "crate::validation::auth::check_email"))]
    pub email: String,
    #[validate(custom(function = "crate::validation::auth::check_password"))]
    pub password: String,
    #[validate(custom(function = "crate::validation::auth::check_display_name"))]
    pub display_name: String,
    #[serde(default)]
    pub home_city: Option<String>,
}
