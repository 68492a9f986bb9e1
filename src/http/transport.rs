// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Unauthenticated request execution with retry.

use super::response::{decode, transport_error};
use crate::config::Config;
use crate::error::{AppError, Result};
use anyhow::Context;
use reqwest::header::{HeaderValue, AUTHORIZATION};
use reqwest::{Method, Request, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;

/// Statuses worth retrying for idempotent requests.
pub const RETRYABLE_STATUSES: [u16; 6] = [408, 429, 500, 502, 503, 504];

/// Bounded retries with a linearly growing delay.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff: Duration,
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.backoff * attempt
    }

    pub fn is_idempotent(method: &Method) -> bool {
        matches!(
            *method,
            Method::GET | Method::PUT | Method::DELETE | Method::HEAD | Method::OPTIONS
        )
    }
}

/// Shared reqwest client bound to the API base URL.
pub struct ApiTransport {
    http: reqwest::Client,
    base_url: Url,
    retry: RetryPolicy,
}

impl ApiTransport {
    pub fn new(config: &Config) -> Result<Self> {
        let base_url = Url::parse(&config.api_base_url)
            .with_context(|| format!("Invalid API base URL: {}", config.api_base_url))?;
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent(concat!("huddle/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            http,
            base_url,
            retry: RetryPolicy {
                max_retries: config.max_retries,
                backoff: config.retry_backoff,
            },
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Resolve `path` relative to the base URL.
    pub fn url(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .with_context(|| format!("Invalid request path: {}", path))
            .map_err(AppError::from)
    }

    pub fn request(&self, method: Method, path: &str) -> Result<RequestBuilder> {
        Ok(self.http.request(method, self.url(path)?))
    }

    /// Build a request, failing on serialization errors before anything is sent.
    pub fn build(&self, builder: RequestBuilder) -> Result<Request> {
        builder
            .build()
            .context("Failed to build request")
            .map_err(AppError::from)
    }

    /// Send without credentials and decode the body.
    pub async fn send_public<T: DeserializeOwned>(&self, request: Request) -> Result<T> {
        let response = self.execute_with_retry(&request, None).await?;
        decode(response).await
    }

    pub async fn post_public<T, B>(&self, path: &str, body: &B) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let request = self.build(self.request(Method::POST, path)?.json(body))?;
        self.send_public(request).await
    }

    /// Execute `request`, retrying idempotent methods on transport errors
    /// and retryable statuses. `request` is cloned per attempt and the
    /// bearer token, if any, is attached to each copy.
    pub(crate) async fn execute_with_retry(
        &self,
        request: &Request,
        bearer: Option<&str>,
    ) -> Result<Response> {
        let idempotent = RetryPolicy::is_idempotent(request.method());
        let max_retries = if idempotent { self.retry.max_retries } else { 0 };
        let mut attempt = 0;

        loop {
            let mut copy = request
                .try_clone()
                .context("Request body cannot be retried")?;
            if let Some(token) = bearer {
                let value = HeaderValue::from_str(&format!("Bearer {}", token))
                    .context("Access token is not a valid header value")?;
                copy.headers_mut().insert(AUTHORIZATION, value);
            }

            match self.http.execute(copy).await {
                Ok(response) => {
                    let status = response.status().as_u16();
                    if RETRYABLE_STATUSES.contains(&status) && attempt < max_retries {
                        attempt += 1;
                        let backoff = self.retry.delay_for(attempt);
                        tracing::warn!(
                            method = %request.method(),
                            url = %request.url(),
                            status,
                            attempt,
                            max_retries,
                            backoff_ms = backoff.as_millis() as u64,
                            "Retryable status, retrying"
                        );
                        tokio::time::sleep(backoff).await;
                        continue;
                    }
                    if attempt > 0 {
                        tracing::info!(attempt = attempt + 1, status, "Request completed after retry");
                    }
                    return Ok(response);
                }
                Err(e) if attempt < max_retries => {
                    attempt += 1;
                    let backoff = self.retry.delay_for(attempt);
                    tracing::warn!(
                        method = %request.method(),
                        url = %request.url(),
                        attempt,
                        max_retries,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %e,
                        "Request failed, retrying"
                    );
                    tokio::time::sleep(backoff).await;
                }
                Err(e) => {
                    tracing::warn!(method = %request.method(), url = %request.url(), error = %e, "Request failed");
                    return Err(AppError::Api(transport_error(&e)));
                }
            }
        }
    }
}
