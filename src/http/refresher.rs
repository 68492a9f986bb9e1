// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! `POST auth/refresh` over the unauthenticated transport.

use super::transport::ApiTransport;
use crate::error::{AppError, Result};
use crate::models::AuthTokens;
use crate::session::TokenRefresher;
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

pub struct HttpRefresher {
    transport: Arc<ApiTransport>,
}

impl HttpRefresher {
    pub fn new(transport: Arc<ApiTransport>) -> Self {
        Self { transport }
    }
}

#[async_trait]
impl TokenRefresher for HttpRefresher {
    async fn refresh(&self, refresh_token: &str) -> Result<AuthTokens> {
        let result = self
            .transport
            .post_public::<AuthTokens, _>("auth/refresh", &RefreshRequest { refresh_token })
            .await;

        match result {
            // The server refusing the refresh token is final; anything else may pass.
            Err(AppError::Api(err)) if matches!(err.status, Some(400 | 401 | 403)) => {
                tracing::warn!(code = %err.code, status = ?err.status, "Refresh token rejected");
                Err(AppError::Auth(err.message))
            }
            other => other,
        }
    }
}
