// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Profiles. The signed-in user's profile is served from the 24h cache.

use super::auth::MockAuthService;
use super::event::EventService;
use crate::error::{AppError, Result};
use crate::http::HttpClient;
use crate::models::{Event, EventFilters, UpdateProfileInput, User};
use crate::storage::ProfileCache;
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use validator::Validate;

#[async_trait]
pub trait UserService: Send + Sync {
    /// The signed-in user's profile.
    async fn current_profile(&self) -> Result<User>;
    async fn get_profile(&self, user_id: &str) -> Result<User>;
    async fn update_profile(&self, input: &UpdateProfileInput) -> Result<User>;
    /// Events the signed-in user hosts.
    async fn my_events(&self) -> Result<Vec<Event>>;
}

pub struct HttpUserService {
    client: Arc<HttpClient>,
    cache: Arc<ProfileCache>,
}

impl HttpUserService {
    pub fn new(client: Arc<HttpClient>, cache: Arc<ProfileCache>) -> Self {
        Self { client, cache }
    }
}

#[async_trait]
impl UserService for HttpUserService {
    async fn current_profile(&self) -> Result<User> {
        self.cache.get_or_load(|| self.client.get("users/me")).await
    }

    async fn get_profile(&self, user_id: &str) -> Result<User> {
        if let Some(cached) = self.cache.get().await.filter(|u| u.id == user_id) {
            return Ok(cached);
        }
        self.client
            .get(&format!("users/{}", urlencoding::encode(user_id)))
            .await
    }

    async fn update_profile(&self, input: &UpdateProfileInput) -> Result<User> {
        input.validate()?;
        let user: User = self.client.patch("users/me", input).await?;
        self.cache.put(&user).await;
        Ok(user)
    }

    async fn my_events(&self) -> Result<Vec<Event>> {
        self.client.get("users/me/events").await
    }
}

pub struct MockUserService {
    auth: Arc<MockAuthService>,
    events: Arc<dyn EventService>,
    cache: Arc<ProfileCache>,
}

impl MockUserService {
    pub fn new(
        auth: Arc<MockAuthService>,
        events: Arc<dyn EventService>,
        cache: Arc<ProfileCache>,
    ) -> Self {
        Self {
            auth,
            events,
            cache,
        }
    }
}

#[async_trait]
impl UserService for MockUserService {
    async fn current_profile(&self) -> Result<User> {
        self.cache
            .get_or_load(|| async { self.auth.signed_in_user() })
            .await
    }

    async fn get_profile(&self, user_id: &str) -> Result<User> {
        self.auth
            .user_by_id(user_id)
            .ok_or_else(|| AppError::NotFound(format!("User {}", user_id)))
    }

    async fn update_profile(&self, input: &UpdateProfileInput) -> Result<User> {
        input.validate()?;
        let mut user = self.auth.signed_in_user()?;
        user.apply_update(input, Utc::now());
        self.auth.update_user(user.clone())?;
        self.cache.put(&user).await;
        tracing::info!(user_id = %user.id, "Mock profile updated");
        Ok(user)
    }

    async fn my_events(&self) -> Result<Vec<Event>> {
        let user = self.auth.signed_in_user()?;
        let mut events = self.events.list_events(&EventFilters::default()).await?;
        events.retain(|e| e.host_id == user.id);
        Ok(events)
    }
}
