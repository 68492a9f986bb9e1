// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Cached profile of the signed-in user.
//!
//! The blob is fresh for 24 hours. Stale or unreadable entries are dropped
//! and reloaded on the next `get_or_load`. Storage failures count as misses.

use super::{keys, SecureBackend};
use crate::error::Result;
use crate::models::User;
use crate::time_utils::now_millis;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

pub const PROFILE_TTL: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CachedProfile {
    user: User,
    cached_at: i64,
}

pub struct ProfileCache {
    backend: Arc<dyn SecureBackend>,
    ttl: Duration,
}

impl ProfileCache {
    pub fn new(backend: Arc<dyn SecureBackend>) -> Self {
        Self::with_ttl(backend, PROFILE_TTL)
    }

    pub fn with_ttl(backend: Arc<dyn SecureBackend>, ttl: Duration) -> Self {
        Self { backend, ttl }
    }

    /// Cached profile if present and fresh.
    pub async fn get(&self) -> Option<User> {
        let raw = match self.backend.get(keys::PROFILE_CACHE).await {
            Ok(raw) => raw?,
            Err(e) => {
                tracing::warn!(error = %e, "Profile cache read failed, treating as miss");
                return None;
            }
        };

        let cached: CachedProfile = match serde_json::from_str(&raw) {
            Ok(cached) => cached,
            Err(e) => {
                tracing::warn!(error = %e, "Discarding unreadable profile cache");
                self.invalidate().await;
                return None;
            }
        };

        let age = now_millis() - cached.cached_at;
        if age < 0 || age as u128 >= self.ttl.as_millis() {
            tracing::debug!(age_ms = age, "Profile cache stale");
            self.invalidate().await;
            return None;
        }
        Some(cached.user)
    }

    pub async fn put(&self, user: &User) {
        let entry = CachedProfile {
            user: user.clone(),
            cached_at: now_millis(),
        };
        let raw = match serde_json::to_string(&entry) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to encode profile for cache");
                return;
            }
        };
        if let Err(e) = self.backend.set(keys::PROFILE_CACHE, &raw).await {
            tracing::warn!(error = %e, "Profile cache write failed");
        }
    }

    pub async fn invalidate(&self) {
        if let Err(e) = self.backend.remove(keys::PROFILE_CACHE).await {
            tracing::warn!(error = %e, "Profile cache invalidation failed");
        }
    }

    /// Serve from cache, or run `load` and cache its result.
    pub async fn get_or_load<F, Fut>(&self, load: F) -> Result<User>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<User>>,
    {
        if let Some(user) = self.get().await {
            return Ok(user);
        }
        let user = load().await?;
        self.put(&user).await;
        Ok(user)
    }
}
