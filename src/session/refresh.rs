// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Session refresh shared by the HTTP 401 path and the proactive manager.

use super::refresh_lock::{LockRelease, RefreshLock};
use crate::error::{ApiError, AppError, Result};
use crate::models::AuthTokens;
use crate::storage::SecureTokenStore;
use crate::time_utils::now_millis;
use async_trait::async_trait;
use std::sync::{Arc, Mutex, OnceLock};

/// Exchanges a refresh token for a new token pair (`POST auth/refresh`).
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    async fn refresh(&self, refresh_token: &str) -> Result<AuthTokens>;
}

/// How a refresh ended, replayed to the callers that waited on it.
#[derive(Debug, Clone)]
enum RefreshFailure {
    Transient(ApiError),
    Rejected(String),
}

impl RefreshFailure {
    fn from_error(err: &AppError) -> Self {
        match err {
            AppError::Api(api) if api.retryable => RefreshFailure::Transient(api.clone()),
            AppError::Auth(message) => RefreshFailure::Rejected(message.clone()),
            other => RefreshFailure::Rejected(other.to_string()),
        }
    }

    fn into_error(self) -> AppError {
        match self {
            RefreshFailure::Transient(api) => AppError::Api(api),
            RefreshFailure::Rejected(message) => AppError::Auth(message),
        }
    }
}

type RefreshOutcome = std::result::Result<AuthTokens, RefreshFailure>;

/// Outcome of one refresh round, shared by its owner and waiters. Left
/// empty if the owner is cancelled.
type OutcomeSlot = Arc<OnceLock<RefreshOutcome>>;

/// Serializes refreshes through a [`RefreshLock`] and writes the result to
/// the token store.
pub struct RefreshCoordinator {
    store: Arc<SecureTokenStore>,
    refresher: Arc<dyn TokenRefresher>,
    lock: RefreshLock,
    /// Slot of the current round; replaced whenever a new owner takes the lock
    round: Mutex<OutcomeSlot>,
}

impl RefreshCoordinator {
    pub fn new(store: Arc<SecureTokenStore>, refresher: Arc<dyn TokenRefresher>) -> Self {
        Self {
            store,
            refresher,
            lock: RefreshLock::new(),
            round: Mutex::new(Arc::new(OnceLock::new())),
        }
    }

    pub fn store(&self) -> &Arc<SecureTokenStore> {
        &self.store
    }

    pub fn is_refreshing(&self) -> bool {
        self.lock.is_locked()
    }

    /// Refresh the session, or wait for the refresh already in flight.
    ///
    /// Waiters get the owner's outcome. Failures leave the stored tokens
    /// alone; callers decide whether a failure ends the session.
    pub async fn refresh_session(&self) -> Result<AuthTokens> {
        self.refresh(None).await
    }

    /// Refresh after the server rejected `rejected_access_token`.
    ///
    /// If the stored token no longer matches, another caller already
    /// refreshed and the stored pair is returned without a new call.
    pub async fn refresh_rejected(&self, rejected_access_token: &str) -> Result<AuthTokens> {
        self.refresh(Some(rejected_access_token)).await
    }

    /// Tokens fit to send, refreshing first when the access token expired.
    ///
    /// `Ok(None)` means there is no stored session at all. An error means a
    /// session existed but could not be renewed.
    pub async fn valid_access_token(&self) -> Result<Option<AuthTokens>> {
        let Some(stored) = self.store.get_stored_tokens().await else {
            return Ok(None);
        };
        if !stored.is_expired_at(now_millis()) {
            return Ok(Some(stored));
        }

        tracing::info!(
            expires_at = stored.expires_at,
            "Access token expired, refreshing before use"
        );
        self.refresh_rejected(&stored.access_token).await.map(Some)
    }

    async fn refresh(&self, rejected: Option<&str>) -> Result<AuthTokens> {
        let (waiter, round) = {
            let mut round = self.lock_round();
            let waiter = self.lock.acquire_lock();
            if waiter.is_owner() {
                *round = Arc::new(OnceLock::new());
            }
            (waiter, round.clone())
        };

        if !waiter.is_owner() {
            tracing::debug!(position = waiter.position(), "Refresh in flight, waiting");
            waiter.await;
            return match round.get() {
                Some(Ok(tokens)) => Ok(tokens.clone()),
                Some(Err(failure)) => Err(failure.clone().into_error()),
                None => Err(AppError::Api(ApiError::network(
                    "Session refresh was interrupted",
                ))),
            };
        }

        let _release = LockRelease::new(&self.lock);
        let result = self.refresh_owned(rejected).await;
        let outcome = match &result {
            Ok(tokens) => Ok(tokens.clone()),
            Err(e) => Err(RefreshFailure::from_error(e)),
        };
        // Only this owner fills its slot.
        let _ = round.set(outcome);
        result
    }

    async fn refresh_owned(&self, rejected: Option<&str>) -> Result<AuthTokens> {
        let current = self
            .store
            .get_stored_tokens()
            .await
            .ok_or_else(|| AppError::Auth("No session to refresh".to_string()))?;

        if rejected.is_some_and(|rejected| rejected != current.access_token) {
            tracing::debug!("Access token already rotated, skipping refresh");
            return Ok(current);
        }

        if self.store.is_refresh_token_expired().await {
            return Err(AppError::Auth("Refresh token expired".to_string()));
        }

        let tokens = self.refresher.refresh(&current.refresh_token).await?;
        self.store.store_tokens(&tokens).await?;

        tracing::info!(expires_at = tokens.expires_at, "Session refreshed");
        Ok(tokens)
    }

    fn lock_round(&self) -> std::sync::MutexGuard<'_, OutcomeSlot> {
        self.round.lock().unwrap_or_else(|e| e.into_inner())
    }
}
