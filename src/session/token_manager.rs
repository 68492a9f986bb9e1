// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Proactive token refresh.
//!
//! Refreshes the access token shortly before it expires: once at startup or
//! resume, then on a fixed poll interval. Failures are logged and swallowed.
//! Clearing tokens is left to the HTTP 401 path so a flaky network cannot
//! log the user out.

use super::refresh::RefreshCoordinator;
use crate::config::{DEFAULT_REFRESH_INTERVAL, DEFAULT_REFRESH_THRESHOLD};
use crate::time_utils::now_millis;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;

pub struct ProactiveTokenManager {
    coordinator: Arc<RefreshCoordinator>,
    threshold: Duration,
    interval: Duration,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl ProactiveTokenManager {
    pub fn new(coordinator: Arc<RefreshCoordinator>) -> Self {
        Self::with_timing(coordinator, DEFAULT_REFRESH_THRESHOLD, DEFAULT_REFRESH_INTERVAL)
    }

    pub fn with_timing(
        coordinator: Arc<RefreshCoordinator>,
        threshold: Duration,
        interval: Duration,
    ) -> Self {
        Self {
            coordinator,
            threshold,
            interval,
            task: Mutex::new(None),
        }
    }

    /// True when a session exists and expires within the threshold.
    pub async fn check_token_expiration(&self) -> bool {
        needs_refresh(&self.coordinator, self.threshold).await
    }

    /// Refresh if the token is close to expiry. Returns whether it refreshed.
    pub async fn refresh_token_proactively(&self) -> bool {
        refresh_if_needed(&self.coordinator, self.threshold).await
    }

    /// Start the poll loop, replacing any loop already running.
    ///
    /// Must be called from within a tokio runtime.
    pub fn schedule_background_refresh(&self) {
        let coordinator = self.coordinator.clone();
        let threshold = self.threshold;
        let interval = self.interval;

        let handle = tokio::spawn(async move {
            let start = tokio::time::Instant::now() + interval;
            let mut ticker = tokio::time::interval_at(start, interval);
            loop {
                ticker.tick().await;
                refresh_if_needed(&coordinator, threshold).await;
            }
        });

        let previous = self.lock_task().replace(handle);
        if let Some(previous) = previous {
            previous.abort();
        }
        tracing::debug!(interval_secs = interval.as_secs(), "Background token refresh scheduled");
    }

    pub fn stop_background_refresh(&self) {
        if let Some(handle) = self.lock_task().take() {
            handle.abort();
            tracing::debug!("Background token refresh stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.lock_task()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Check immediately, then keep checking in the background.
    pub async fn handle_app_startup(&self) {
        self.refresh_token_proactively().await;
        self.schedule_background_refresh();
    }

    /// Check immediately; the background loop is left as it is.
    pub async fn handle_app_resume(&self) {
        self.refresh_token_proactively().await;
    }

    fn lock_task(&self) -> std::sync::MutexGuard<'_, Option<JoinHandle<()>>> {
        self.task.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Drop for ProactiveTokenManager {
    fn drop(&mut self) {
        self.stop_background_refresh();
    }
}

/// An already expired token counts; it can still be exchanged while the
/// refresh window is open.
async fn needs_refresh(coordinator: &RefreshCoordinator, threshold: Duration) -> bool {
    match coordinator.store().get_stored_tokens().await {
        Some(tokens) => tokens.remaining_millis(now_millis()) <= threshold.as_millis() as i64,
        None => false,
    }
}

async fn refresh_if_needed(coordinator: &RefreshCoordinator, threshold: Duration) -> bool {
    if !needs_refresh(coordinator, threshold).await {
        return false;
    }

    match coordinator.refresh_session().await {
        Ok(_) => {
            tracing::info!("Proactive token refresh succeeded");
            true
        }
        Err(e) => {
            tracing::warn!(error = %e, "Proactive token refresh failed, will retry");
            false
        }
    }
}
