// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Secure token store.
//!
//! Expiration is lazy: a read that finds an access token past its deadline
//! wipes the stored tokens and reports nothing. There is no background sweep.
//!
//! Backend failures never reach the caller. The first failure is logged and
//! the store switches to an in-memory fallback for the rest of the process,
//! so a broken keychain costs persistence, not the session.

use super::{keys, MemoryBackend, SecureBackend};
use crate::error::{AppError, Result};
use crate::models::{AuthTokens, TokenMetadata};
use crate::time_utils::now_millis;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

const DAY_MILLIS: i64 = 24 * 60 * 60 * 1000;
/// Keys carried into the fallback when the backend fails.
const SESSION_KEYS: [&str; 3] = [keys::AUTH_TOKENS, keys::TOKEN_METADATA, keys::REMEMBER_ME];
/// Refresh token lifetime without "remember me".
pub const REFRESH_WINDOW_MILLIS: i64 = 7 * DAY_MILLIS;
/// Refresh token lifetime with "remember me".
pub const REMEMBER_ME_REFRESH_WINDOW_MILLIS: i64 = 90 * DAY_MILLIS;

pub struct SecureTokenStore {
    backend: Arc<dyn SecureBackend>,
    fallback: MemoryBackend,
    degraded: AtomicBool,
    remember_me: AtomicBool,
}

impl SecureTokenStore {
    /// Open a store over `backend`, restoring the persisted remember-me flag.
    pub async fn open(backend: Arc<dyn SecureBackend>) -> Self {
        let store = Self {
            backend,
            fallback: MemoryBackend::new(),
            degraded: AtomicBool::new(false),
            remember_me: AtomicBool::new(false),
        };
        let remember_me = store.read(keys::REMEMBER_ME).await.as_deref() == Some("true");
        store.remember_me.store(remember_me, Ordering::SeqCst);
        store
    }

    /// Store that never touches disk.
    pub async fn in_memory() -> Self {
        Self::open(Arc::new(MemoryBackend::new())).await
    }

    /// Persist tokens and derive their metadata from the current time.
    pub async fn store_tokens(&self, tokens: &AuthTokens) -> Result<()> {
        let issued_at = now_millis();
        let window = if self.remember_me() {
            REMEMBER_ME_REFRESH_WINDOW_MILLIS
        } else {
            REFRESH_WINDOW_MILLIS
        };
        let metadata = TokenMetadata {
            issued_at,
            expires_at: tokens.expires_at,
            refresh_expires_at: issued_at + window,
        };

        let tokens_json = serde_json::to_string(tokens)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to encode tokens: {}", e)))?;
        let metadata_json = serde_json::to_string(&metadata)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to encode metadata: {}", e)))?;

        self.write(keys::AUTH_TOKENS, &tokens_json).await;
        self.write(keys::TOKEN_METADATA, &metadata_json).await;

        tracing::debug!(
            expires_at = tokens.expires_at,
            refresh_expires_at = metadata.refresh_expires_at,
            "Tokens stored"
        );
        Ok(())
    }

    /// Current tokens, or `None` if absent or expired (expired ones are cleared).
    pub async fn get_tokens(&self) -> Option<AuthTokens> {
        let tokens = self.read_tokens().await?;
        if tokens.is_expired_at(now_millis()) {
            tracing::info!(expires_at = tokens.expires_at, "Stored access token expired, clearing");
            self.clear_tokens().await;
            return None;
        }
        Some(tokens)
    }

    pub async fn clear_tokens(&self) {
        self.delete(keys::AUTH_TOKENS).await;
        self.delete(keys::TOKEN_METADATA).await;
    }

    pub async fn set_remember_me(&self, remember_me: bool) {
        self.remember_me.store(remember_me, Ordering::SeqCst);
        self.write(keys::REMEMBER_ME, if remember_me { "true" } else { "false" })
            .await;
    }

    pub fn remember_me(&self) -> bool {
        self.remember_me.load(Ordering::SeqCst)
    }

    pub async fn get_metadata(&self) -> Option<TokenMetadata> {
        let raw = self.read(keys::TOKEN_METADATA).await?;
        match serde_json::from_str(&raw) {
            Ok(metadata) => Some(metadata),
            Err(e) => {
                tracing::warn!(error = %e, "Discarding unreadable token metadata");
                self.delete(keys::TOKEN_METADATA).await;
                None
            }
        }
    }

    /// Tokens as stored, even past the access deadline. Nothing is cleared;
    /// the refresh path uses this to exchange an expired pair.
    pub async fn get_stored_tokens(&self) -> Option<AuthTokens> {
        self.read_tokens().await
    }

    /// True when there is no access token or its deadline has passed.
    pub async fn is_access_token_expired(&self) -> bool {
        match self.read_tokens().await {
            Some(tokens) => tokens.is_expired_at(now_millis()),
            None => true,
        }
    }

    /// True when there is no metadata or the refresh window has closed.
    pub async fn is_refresh_token_expired(&self) -> bool {
        match self.get_metadata().await {
            Some(metadata) => now_millis() >= metadata.refresh_expires_at,
            None => true,
        }
    }

    /// Whether a backend failure forced the in-memory fallback.
    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::SeqCst)
    }

    /// Tokens as stored, without the expiration check.
    async fn read_tokens(&self) -> Option<AuthTokens> {
        let raw = self.read(keys::AUTH_TOKENS).await?;
        match serde_json::from_str(&raw) {
            Ok(tokens) => Some(tokens),
            Err(e) => {
                tracing::warn!(error = %e, "Discarding unreadable stored tokens");
                self.clear_tokens().await;
                None
            }
        }
    }

    // ─── Backend access with in-memory fallback ──────────────────

    /// Switch to the fallback, carrying over whatever the backend still
    /// serves so a half-finished write does not strand earlier keys.
    async fn degrade(&self, op: &str, err: &AppError) {
        if self.degraded.swap(true, Ordering::SeqCst) {
            return;
        }
        tracing::warn!(
            backend = self.backend.name(),
            op,
            error = %err,
            "Secure storage failed, continuing with in-memory tokens only"
        );

        for key in SESSION_KEYS {
            if matches!(self.fallback.get(key).await, Ok(Some(_))) {
                continue;
            }
            if let Ok(Some(value)) = self.backend.get(key).await {
                self.fallback_set(key, &value).await;
            }
        }
    }

    async fn read(&self, key: &str) -> Option<String> {
        if !self.is_degraded() {
            match self.backend.get(key).await {
                Ok(value) => return value,
                Err(e) => self.degrade("read", &e).await,
            }
        }
        match self.fallback.get(key).await {
            Ok(value) => value,
            Err(e) => {
                tracing::error!(key, error = %e, "In-memory token fallback read failed");
                None
            }
        }
    }

    async fn write(&self, key: &str, value: &str) {
        if !self.is_degraded() {
            match self.backend.set(key, value).await {
                Ok(()) => return,
                Err(e) => self.degrade("write", &e).await,
            }
        }
        self.fallback_set(key, value).await;
    }

    async fn delete(&self, key: &str) {
        if !self.is_degraded() {
            if let Err(e) = self.backend.remove(key).await {
                self.degrade("delete", &e).await;
            }
        }
        if let Err(e) = self.fallback.remove(key).await {
            tracing::error!(key, error = %e, "In-memory token fallback delete failed");
        }
    }

    async fn fallback_set(&self, key: &str, value: &str) {
        if let Err(e) = self.fallback.set(key, value).await {
            tracing::error!(key, error = %e, "In-memory token fallback write failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    fn tokens_expiring_in(millis: i64) -> AuthTokens {
        AuthTokens {
            access_token: "access".to_string(),
            refresh_token: "refresh".to_string(),
            expires_at: now_millis() + millis,
        }
    }

    #[tokio::test]
    async fn test_store_and_get() {
        let store = SecureTokenStore::in_memory().await;
        let tokens = tokens_expiring_in(60_000);
        store.store_tokens(&tokens).await.unwrap();

        assert_eq!(store.get_tokens().await, Some(tokens));
        assert!(!store.is_access_token_expired().await);
        assert!(!store.is_refresh_token_expired().await);
    }

    #[tokio::test]
    async fn test_expired_tokens_are_cleared_on_read() {
        let backend = Arc::new(MemoryBackend::new());
        let store = SecureTokenStore::open(backend.clone()).await;
        store
            .store_tokens(&tokens_expiring_in(-1_000))
            .await
            .unwrap();

        assert!(store.is_access_token_expired().await);
        assert_eq!(store.get_tokens().await, None);
        assert_eq!(backend.get(keys::AUTH_TOKENS).await.unwrap(), None);
        assert_eq!(backend.get(keys::TOKEN_METADATA).await.unwrap(), None);
        assert_eq!(store.get_tokens().await, None);
    }

    #[tokio::test]
    async fn test_refresh_window_depends_on_remember_me() {
        let store = SecureTokenStore::in_memory().await;

        store.store_tokens(&tokens_expiring_in(60_000)).await.unwrap();
        let short = store.get_metadata().await.unwrap();
        assert_eq!(short.refresh_expires_at - short.issued_at, REFRESH_WINDOW_MILLIS);

        store.set_remember_me(true).await;
        store.store_tokens(&tokens_expiring_in(60_000)).await.unwrap();
        let long = store.get_metadata().await.unwrap();
        assert_eq!(
            long.refresh_expires_at - long.issued_at,
            REMEMBER_ME_REFRESH_WINDOW_MILLIS
        );
    }

    #[tokio::test]
    async fn test_remember_me_persists_across_open() {
        let backend = Arc::new(MemoryBackend::new());
        SecureTokenStore::open(backend.clone())
            .await
            .set_remember_me(true)
            .await;

        let reopened = SecureTokenStore::open(backend).await;
        assert!(reopened.remember_me());
    }

    #[tokio::test]
    async fn test_missing_metadata_means_refresh_expired() {
        let store = SecureTokenStore::in_memory().await;
        assert!(store.is_refresh_token_expired().await);
        assert!(store.is_access_token_expired().await);
    }

    struct BrokenBackend;

    #[async_trait]
    impl SecureBackend for BrokenBackend {
        async fn get(&self, _key: &str) -> Result<Option<String>> {
            Err(AppError::Storage("keychain locked".to_string()))
        }
        async fn set(&self, _key: &str, _value: &str) -> Result<()> {
            Err(AppError::Storage("keychain locked".to_string()))
        }
        async fn remove(&self, _key: &str) -> Result<()> {
            Err(AppError::Storage("keychain locked".to_string()))
        }
        fn name(&self) -> &'static str {
            "broken"
        }
    }

    #[tokio::test]
    async fn test_backend_failure_degrades_to_memory() {
        let store = SecureTokenStore::open(Arc::new(BrokenBackend)).await;
        assert!(store.is_degraded());

        let tokens = tokens_expiring_in(60_000);
        store.store_tokens(&tokens).await.unwrap();
        assert_eq!(store.get_tokens().await, Some(tokens));

        store.clear_tokens().await;
        assert_eq!(store.get_tokens().await, None);
    }

    /// Accepts the tokens but refuses the metadata write.
    struct MetadataRefusingBackend {
        inner: MemoryBackend,
    }

    #[async_trait]
    impl SecureBackend for MetadataRefusingBackend {
        async fn get(&self, key: &str) -> Result<Option<String>> {
            self.inner.get(key).await
        }
        async fn set(&self, key: &str, value: &str) -> Result<()> {
            if key == keys::TOKEN_METADATA {
                return Err(AppError::Storage("disk full".to_string()));
            }
            self.inner.set(key, value).await
        }
        async fn remove(&self, key: &str) -> Result<()> {
            self.inner.remove(key).await
        }
        fn name(&self) -> &'static str {
            "metadata-refusing"
        }
    }

    #[tokio::test]
    async fn test_partial_write_failure_keeps_session() {
        let store = SecureTokenStore::open(Arc::new(MetadataRefusingBackend {
            inner: MemoryBackend::new(),
        }))
        .await;
        assert!(!store.is_degraded());

        let tokens = tokens_expiring_in(60_000);
        store.store_tokens(&tokens).await.unwrap();

        assert!(store.is_degraded());
        assert_eq!(store.get_tokens().await, Some(tokens));
        assert!(store.get_metadata().await.is_some());
        assert!(!store.is_refresh_token_expired().await);
    }

    #[tokio::test]
    async fn test_stored_tokens_survive_access_expiry() {
        let store = SecureTokenStore::in_memory().await;
        let tokens = tokens_expiring_in(-1_000);
        store.store_tokens(&tokens).await.unwrap();

        assert_eq!(store.get_stored_tokens().await, Some(tokens.clone()));
        assert_eq!(store.get_stored_tokens().await, Some(tokens));
        assert!(!store.is_refresh_token_expired().await);

        assert_eq!(store.get_tokens().await, None);
        assert_eq!(store.get_stored_tokens().await, None);
    }
}
