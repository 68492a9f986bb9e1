// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Authenticated API client.
//!
//! Every request carries the stored access token, renewed first if it has
//! already expired. A 401 triggers one refresh through the
//! [`RefreshCoordinator`] and a single replay; a second 401, or a refresh
//! the server refuses, ends the session.

use super::response::decode;
use super::transport::ApiTransport;
use crate::error::{AppError, Result};
use crate::session::{ExpiryReason, RefreshCoordinator, SessionEvent};
use reqwest::{Method, Request, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::broadcast;

pub struct HttpClient {
    transport: Arc<ApiTransport>,
    coordinator: Arc<RefreshCoordinator>,
    events: broadcast::Sender<SessionEvent>,
}

impl HttpClient {
    pub fn new(
        transport: Arc<ApiTransport>,
        coordinator: Arc<RefreshCoordinator>,
        events: broadcast::Sender<SessionEvent>,
    ) -> Self {
        Self {
            transport,
            coordinator,
            events,
        }
    }

    pub fn transport(&self) -> &Arc<ApiTransport> {
        &self.transport
    }

    pub fn request(&self, method: Method, path: &str) -> Result<RequestBuilder> {
        self.transport.request(method, path)
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.send(self.request(Method::GET, path)?).await
    }

    pub async fn get_query<T, Q>(&self, path: &str, query: &Q) -> Result<T>
    where
        T: DeserializeOwned,
        Q: Serialize + ?Sized,
    {
        self.send(self.request(Method::GET, path)?.query(query)).await
    }

    pub async fn post<T, B>(&self, path: &str, body: &B) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.send(self.request(Method::POST, path)?.json(body)).await
    }

    pub async fn put<T, B>(&self, path: &str, body: &B) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.send(self.request(Method::PUT, path)?.json(body)).await
    }

    pub async fn patch<T, B>(&self, path: &str, body: &B) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.send(self.request(Method::PATCH, path)?.json(body)).await
    }

    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.send(self.request(Method::DELETE, path)?).await
    }

    /// Unauthenticated POST (login, register). Never touches the session.
    pub async fn post_public<T, B>(&self, path: &str, body: &B) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.transport.post_public(path, body).await
    }

    /// Send an authenticated request and decode the response.
    pub async fn send<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T> {
        let request = self.transport.build(builder)?;

        let access_token = match self.coordinator.valid_access_token().await {
            Ok(tokens) => tokens.map(|tokens| tokens.access_token),
            Err(e) if e.is_retryable() => return Err(e),
            Err(e) => return Err(self.end_session(&e.to_string()).await),
        };

        let response = self
            .transport
            .execute_with_retry(&request, access_token.as_deref())
            .await?;

        if response.status() != StatusCode::UNAUTHORIZED {
            return decode(response).await;
        }

        match access_token {
            Some(rejected) => self.refresh_and_replay(&request, &rejected).await,
            None => {
                tracing::debug!(url = %request.url(), "Unauthorized without a session");
                Err(AppError::Auth("Sign in required".to_string()))
            }
        }
    }

    async fn refresh_and_replay<T: DeserializeOwned>(
        &self,
        request: &Request,
        rejected: &str,
    ) -> Result<T> {
        tracing::info!(url = %request.url(), "Access token rejected, refreshing");

        let tokens = match self.coordinator.refresh_rejected(rejected).await {
            Ok(tokens) => tokens,
            Err(e) if e.is_retryable() => {
                tracing::warn!(error = %e, "Refresh failed transiently, keeping session");
                return Err(e);
            }
            Err(e) => return Err(self.end_session(&e.to_string()).await),
        };

        let response = self
            .transport
            .execute_with_retry(request, Some(&tokens.access_token))
            .await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            return Err(self.end_session("Access token rejected after refresh").await);
        }
        decode(response).await
    }

    /// Drop the stored tokens and tell listeners the session is over.
    async fn end_session(&self, reason: &str) -> AppError {
        tracing::warn!(reason, "Session could not be refreshed, signing out");
        self.coordinator.store().clear_tokens().await;
        // No receivers just means nobody is listening yet.
        let _ = self
            .events
            .send(SessionEvent::Expired(ExpiryReason::RefreshExhausted));
        AppError::Auth("Session expired".to_string())
    }
}
