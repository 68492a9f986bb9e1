// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Huddle: client core for a social pickup-sports app
//!
//! This crate holds everything the mobile and web shells share: the
//! session and token subsystem, the API client, validation rules, the data
//! model and the services, each with an HTTP and an in-memory mock
//! implementation.

pub mod config;
pub mod display;
pub mod error;
pub mod http;
pub mod models;
pub mod services;
pub mod session;
pub mod storage;
pub mod time_utils;
pub mod validation;

use config::Config;
use error::Result;
use http::{ApiTransport, HttpClient, HttpRefresher};
use services::{
    AuthService, EventService, HttpAuthService, HttpEventService, HttpLocationService,
    HttpPaymentService, HttpUserService, LocationService, MockAuthService, MockEventService,
    MockLocationService, MockPaymentService, MockUserService, PaymentService, UserService,
};
use session::{RefreshCoordinator, Session, TokenRefresher};
use std::sync::Arc;
use storage::{EncryptedFileBackend, MemoryBackend, ProfileCache, SecureBackend, SecureTokenStore};

/// Fully wired client: one session plus every service.
pub struct HuddleClient {
    pub config: Config,
    pub session: Session,
    pub auth: Arc<dyn AuthService>,
    pub events: Arc<dyn EventService>,
    pub payments: Arc<dyn PaymentService>,
    pub locations: Arc<dyn LocationService>,
    pub users: Arc<dyn UserService>,
}

impl HuddleClient {
    /// Build the client from configuration.
    ///
    /// Must be called from within a tokio runtime. An unusable storage
    /// directory is logged and replaced by in-memory storage.
    pub async fn build(config: Config) -> Result<Self> {
        let backend = open_backend(&config).await;
        let store = Arc::new(SecureTokenStore::open(backend.clone()).await);
        let profile_cache = Arc::new(ProfileCache::new(backend));
        let session_events = session::event_channel();

        if config.use_mock_services {
            tracing::info!("Using in-memory mock services");
            let auth = Arc::new(MockAuthService::new());
            let payments: Arc<dyn PaymentService> = Arc::new(MockPaymentService::new());
            let events: Arc<dyn EventService> = Arc::new(MockEventService::new(
                auth.clone(),
                payments.clone(),
                config.check_in_secret.clone(),
            ));
            let users = Arc::new(MockUserService::new(
                auth.clone(),
                events.clone(),
                profile_cache.clone(),
            ));

            let coordinator = Arc::new(RefreshCoordinator::new(store, auth.clone()));
            let session = Session::new(
                &config,
                coordinator,
                auth.clone(),
                profile_cache,
                session_events,
            );

            return Ok(Self {
                config,
                session,
                auth,
                events,
                payments,
                locations: Arc::new(MockLocationService::new()),
                users,
            });
        }

        tracing::info!(api_url = %config.api_base_url, "Using Huddle API");
        let transport = Arc::new(ApiTransport::new(&config)?);
        let refresher: Arc<dyn TokenRefresher> = Arc::new(HttpRefresher::new(transport.clone()));
        let coordinator = Arc::new(RefreshCoordinator::new(store, refresher));
        let client = Arc::new(HttpClient::new(
            transport,
            coordinator.clone(),
            session_events.clone(),
        ));

        let auth: Arc<dyn AuthService> = Arc::new(HttpAuthService::new(client.clone()));
        let session = Session::new(
            &config,
            coordinator,
            auth.clone(),
            profile_cache.clone(),
            session_events,
        );

        Ok(Self {
            config,
            session,
            auth,
            events: Arc::new(HttpEventService::new(client.clone())),
            payments: Arc::new(HttpPaymentService::new(client.clone())),
            locations: Arc::new(HttpLocationService::new(client.clone())),
            users: Arc::new(HttpUserService::new(client, profile_cache)),
        })
    }
}

async fn open_backend(config: &Config) -> Arc<dyn SecureBackend> {
    let Some(dir) = &config.storage_dir else {
        return Arc::new(MemoryBackend::new());
    };
    match EncryptedFileBackend::open(dir).await {
        Ok(backend) => Arc::new(backend),
        Err(e) => {
            tracing::warn!(
                dir = %dir.display(),
                error = %e,
                "Encrypted storage unavailable, keeping session in memory"
            );
            Arc::new(MemoryBackend::new())
        }
    }
}
