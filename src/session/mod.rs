// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Session lifecycle: login, refresh, idle expiry, logout.
//!
//! Expiry is never silent. Both the idle timer and an exhausted refresh
//! publish [`SessionEvent::Expired`]; the UI then calls
//! [`Session::continue_session`] or [`Session::logout`].

pub mod activity;
pub mod refresh;
pub mod refresh_lock;
pub mod token_manager;

pub use activity::ActivityTracker;
pub use refresh::{RefreshCoordinator, TokenRefresher};
pub use refresh_lock::{RefreshLock, RefreshWaiter};
pub use token_manager::ProactiveTokenManager;

use crate::config::Config;
use crate::error::Result;
use crate::models::{LoginInput, RegisterInput, User};
use crate::services::AuthService;
use crate::storage::{ProfileCache, SecureTokenStore};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use validator::Validate;

const EVENT_CHANNEL_CAPACITY: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpiryReason {
    /// No user activity for the idle timeout
    IdleTimeout,
    /// The server refused the refresh token
    RefreshExhausted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    LoggedIn { user_id: String },
    Refreshed,
    Expired(ExpiryReason),
    LoggedOut,
}

/// Channel shared by the session and the HTTP client.
pub fn event_channel() -> broadcast::Sender<SessionEvent> {
    broadcast::channel(EVENT_CHANNEL_CAPACITY).0
}

pub struct Session {
    store: Arc<SecureTokenStore>,
    auth: Arc<dyn AuthService>,
    coordinator: Arc<RefreshCoordinator>,
    profile_cache: Arc<ProfileCache>,
    token_manager: Arc<ProactiveTokenManager>,
    activity: Arc<ActivityTracker>,
    events: broadcast::Sender<SessionEvent>,
    watcher: JoinHandle<()>,
}

impl Session {
    /// Must be called from within a tokio runtime.
    pub fn new(
        config: &Config,
        coordinator: Arc<RefreshCoordinator>,
        auth: Arc<dyn AuthService>,
        profile_cache: Arc<ProfileCache>,
        events: broadcast::Sender<SessionEvent>,
    ) -> Self {
        let token_manager = Arc::new(ProactiveTokenManager::with_timing(
            coordinator.clone(),
            config.refresh_threshold,
            config.refresh_interval,
        ));
        let activity = Arc::new(ActivityTracker::new(
            config.idle_timeout,
            config.activity_debounce,
        ));

        let idle_events = events.clone();
        activity.on_session_expired(move || {
            let _ = idle_events.send(SessionEvent::Expired(ExpiryReason::IdleTimeout));
        });

        let watcher = spawn_expiry_watcher(events.subscribe(), &token_manager, &activity);

        Self {
            store: coordinator.store().clone(),
            auth,
            coordinator,
            profile_cache,
            token_manager,
            activity,
            events,
            watcher,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// True while an unexpired access token is stored. Never clears
    /// anything, so an expired but refreshable session survives the check.
    pub async fn is_authenticated(&self) -> bool {
        !self.store.is_access_token_expired().await
    }

    pub fn store(&self) -> &Arc<SecureTokenStore> {
        &self.store
    }

    pub fn activity(&self) -> &ActivityTracker {
        &self.activity
    }

    pub fn token_manager(&self) -> &ProactiveTokenManager {
        &self.token_manager
    }

    pub async fn login(&self, input: &LoginInput) -> Result<User> {
        input.validate()?;
        let session = self.auth.login(input).await?;

        self.store.set_remember_me(input.remember_me).await;
        self.start(&session.user, &session.tokens).await?;
        Ok(session.user)
    }

    pub async fn register(&self, input: &RegisterInput) -> Result<User> {
        input.validate()?;
        let session = self.auth.register(input).await?;

        self.store.set_remember_me(false).await;
        self.start(&session.user, &session.tokens).await?;
        Ok(session.user)
    }

    async fn start(&self, user: &User, tokens: &crate::models::AuthTokens) -> Result<()> {
        self.store.store_tokens(tokens).await?;
        self.profile_cache.put(user).await;
        self.activity.start_tracking();
        self.token_manager.schedule_background_refresh();

        tracing::info!(user_id = %user.id, "Signed in");
        self.publish(SessionEvent::LoggedIn {
            user_id: user.id.clone(),
        });
        Ok(())
    }

    /// Sign out locally. The server call is best effort.
    pub async fn logout(&self) {
        if let Err(e) = self.auth.logout().await {
            tracing::warn!(error = %e, "Server logout failed, clearing local session anyway");
        }
        self.end().await;
        self.publish(SessionEvent::LoggedOut);
        tracing::info!("Signed out");
    }

    /// "Continue session" after an expiry prompt: force a refresh.
    ///
    /// A transient failure keeps the session so the user can try again;
    /// anything else signs out.
    pub async fn continue_session(&self) -> Result<()> {
        match self.coordinator.refresh_session().await {
            Ok(_) => {
                self.activity.start_tracking();
                self.activity.reset_inactivity_timer();
                self.token_manager.schedule_background_refresh();
                self.publish(SessionEvent::Refreshed);
                Ok(())
            }
            Err(e) if e.is_retryable() => Err(e),
            Err(e) => {
                tracing::warn!(error = %e, "Could not continue session");
                self.end().await;
                self.publish(SessionEvent::Expired(ExpiryReason::RefreshExhausted));
                Err(e)
            }
        }
    }

    /// Restore a stored session at launch. Returns whether one exists.
    pub async fn handle_app_startup(&self) -> bool {
        if !self.restore().await {
            return false;
        }
        self.token_manager.handle_app_startup().await;
        self.activity.start_tracking();
        true
    }

    /// Returning to the foreground counts as activity.
    pub async fn handle_app_resume(&self) {
        if !self.restore().await {
            return;
        }
        self.token_manager.handle_app_resume().await;
        self.activity.reset_inactivity_timer();
    }

    /// Bring a stored session up to date before using it.
    ///
    /// An expired access token is renewed while the refresh window is open.
    /// A session that cannot be renewed ends with
    /// `Expired(RefreshExhausted)`; a transient failure keeps it.
    async fn restore(&self) -> bool {
        match self.coordinator.valid_access_token().await {
            Ok(Some(_)) => true,
            Ok(None) => {
                tracing::info!("No stored session");
                false
            }
            Err(e) if e.is_retryable() => {
                tracing::warn!(error = %e, "Could not renew session yet, keeping it");
                true
            }
            Err(e) => {
                tracing::warn!(error = %e, "Stored session could not be renewed");
                self.end().await;
                self.publish(SessionEvent::Expired(ExpiryReason::RefreshExhausted));
                false
            }
        }
    }

    /// Forward a user interaction to the idle tracker.
    pub fn record_activity(&self) {
        self.activity.track_activity();
    }

    async fn end(&self) {
        self.activity.stop_tracking();
        self.token_manager.stop_background_refresh();
        self.store.clear_tokens().await;
        self.profile_cache.invalidate().await;
    }

    fn publish(&self, event: SessionEvent) {
        // No receivers just means nobody is listening yet.
        let _ = self.events.send(event);
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.watcher.abort();
    }
}

/// Stop timers when the HTTP client gives up on the session.
fn spawn_expiry_watcher(
    mut events: broadcast::Receiver<SessionEvent>,
    token_manager: &Arc<ProactiveTokenManager>,
    activity: &Arc<ActivityTracker>,
) -> JoinHandle<()> {
    let token_manager = Arc::downgrade(token_manager);
    let activity = Arc::downgrade(activity);

    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(SessionEvent::Expired(ExpiryReason::RefreshExhausted)) => {
                    if let Some(manager) = token_manager.upgrade() {
                        manager.stop_background_refresh();
                    }
                    if let Some(activity) = activity.upgrade() {
                        activity.stop_tracking();
                    }
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "Session event watcher lagged");
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}
