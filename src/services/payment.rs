// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Deposit authorizations: HTTP and in-memory implementations.
//!
//! A deposit is authorized (held) at RSVP time and released at check-in
//! or when the event is cancelled. Capture is for no-shows.

use crate::error::{ApiError, AppError, Result};
use crate::http::HttpClient;
use crate::models::{AuthorizeDepositRequest, PaymentAuthorization, PaymentStatus};
use crate::validation::validate_deposit_amount;
use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

#[async_trait]
pub trait PaymentService: Send + Sync {
    async fn authorize_deposit(&self, request: &AuthorizeDepositRequest)
        -> Result<PaymentAuthorization>;
    async fn capture(&self, authorization_id: &str) -> Result<PaymentAuthorization>;
    async fn release(&self, authorization_id: &str) -> Result<PaymentAuthorization>;
}

pub struct HttpPaymentService {
    client: Arc<HttpClient>,
}

impl HttpPaymentService {
    pub fn new(client: Arc<HttpClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PaymentService for HttpPaymentService {
    async fn authorize_deposit(
        &self,
        request: &AuthorizeDepositRequest,
    ) -> Result<PaymentAuthorization> {
        self.client.post("payments/authorize", request).await
    }

    async fn capture(&self, authorization_id: &str) -> Result<PaymentAuthorization> {
        let path = format!("payments/{}/capture", urlencoding::encode(authorization_id));
        self.client.post(&path, &serde_json::json!({})).await
    }

    async fn release(&self, authorization_id: &str) -> Result<PaymentAuthorization> {
        let path = format!("payments/{}/release", urlencoding::encode(authorization_id));
        self.client.post(&path, &serde_json::json!({})).await
    }
}

/// Payment method token the mock treats as a declined card.
pub const DECLINED_PAYMENT_METHOD: &str = "pm_card_declined";

#[derive(Default)]
pub struct MockPaymentService {
    authorizations: DashMap<String, PaymentAuthorization>,
    next_id: AtomicU64,
}

impl MockPaymentService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn authorization(&self, authorization_id: &str) -> Option<PaymentAuthorization> {
        self.authorizations
            .get(authorization_id)
            .map(|auth| auth.clone())
    }

    fn transition(
        &self,
        authorization_id: &str,
        next: PaymentStatus,
    ) -> Result<PaymentAuthorization> {
        let mut auth = self
            .authorizations
            .get_mut(authorization_id)
            .ok_or_else(|| AppError::NotFound(format!("Payment authorization {}", authorization_id)))?;

        match (auth.status, next) {
            (current, next) if current == next => {}
            (PaymentStatus::Authorized, _) => auth.status = next,
            (current, _) => {
                return Err(AppError::Conflict(format!(
                    "Payment authorization is already {:?}",
                    current
                )))
            }
        }
        tracing::info!(
            authorization_id,
            status = ?auth.status,
            amount = auth.amount,
            "Mock payment authorization updated"
        );
        Ok(auth.clone())
    }
}

#[async_trait]
impl PaymentService for MockPaymentService {
    async fn authorize_deposit(
        &self,
        request: &AuthorizeDepositRequest,
    ) -> Result<PaymentAuthorization> {
        if request.payment_method_id.trim().is_empty() {
            return Err(AppError::field(
                "paymentMethodId",
                "A payment method is required",
            ));
        }
        if request.amount == 0 {
            return Err(AppError::field("amount", "Deposit amount must be positive"));
        }
        if let Some(message) = validate_deposit_amount(request.amount) {
            return Err(AppError::field("amount", message));
        }
        if request.payment_method_id == DECLINED_PAYMENT_METHOD {
            let mut err = ApiError::from_status(402, "Your card was declined");
            err.code = "CARD_DECLINED".to_string();
            return Err(AppError::Api(err));
        }

        let id = format!("pa_{:06}", self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        let auth = PaymentAuthorization {
            id: id.clone(),
            event_id: request.event_id.clone(),
            user_id: request.user_id.clone(),
            amount: request.amount,
            status: PaymentStatus::Authorized,
            created_at: Utc::now(),
        };
        self.authorizations.insert(id, auth.clone());

        tracing::info!(
            authorization_id = %auth.id,
            event_id = %auth.event_id,
            amount = auth.amount,
            "Mock deposit authorized"
        );
        Ok(auth)
    }

    async fn capture(&self, authorization_id: &str) -> Result<PaymentAuthorization> {
        self.transition(authorization_id, PaymentStatus::Captured)
    }

    async fn release(&self, authorization_id: &str) -> Result<PaymentAuthorization> {
        self.transition(authorization_id, PaymentStatus::Released)
    }
}
