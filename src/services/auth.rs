// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Authentication service: HTTP and in-memory implementations.

use crate::error::{ApiError, AppError, Result};
use crate::http::{HttpClient, HttpRefresher};
use crate::models::{AuthSession, AuthTokens, LoginInput, RegisterInput, User};
use crate::session::TokenRefresher;
use crate::time_utils::now_millis;
use anyhow::Context;
use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use ring::rand::{SecureRandom, SystemRandom};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use subtle::ConstantTimeEq;
use validator::Validate;

#[async_trait]
pub trait AuthService: Send + Sync {
    async fn login(&self, input: &LoginInput) -> Result<AuthSession>;
    async fn register(&self, input: &RegisterInput) -> Result<AuthSession>;
    async fn refresh(&self, refresh_token: &str) -> Result<AuthTokens>;
    async fn logout(&self) -> Result<()>;
    async fn current_user(&self) -> Result<User>;
}

/// `auth/*` endpoints of the Huddle API.
pub struct HttpAuthService {
    client: Arc<HttpClient>,
    refresher: HttpRefresher,
}

impl HttpAuthService {
    pub fn new(client: Arc<HttpClient>) -> Self {
        let refresher = HttpRefresher::new(client.transport().clone());
        Self { client, refresher }
    }
}

#[async_trait]
impl AuthService for HttpAuthService {
    async fn login(&self, input: &LoginInput) -> Result<AuthSession> {
        input.validate()?;
        self.client.post_public("auth/login", input).await
    }

    async fn register(&self, input: &RegisterInput) -> Result<AuthSession> {
        input.validate()?;
        self.client.post_public("auth/register", input).await
    }

    async fn refresh(&self, refresh_token: &str) -> Result<AuthTokens> {
        self.refresher.refresh(refresh_token).await
    }

    async fn logout(&self) -> Result<()> {
        self.client
            .post::<serde_json::Value, _>("auth/logout", &serde_json::json!({}))
            .await
            .map(|_| ())
    }

    async fn current_user(&self) -> Result<User> {
        self.client.get("auth/me").await
    }
}

/// Lifetime of access tokens issued by [`MockAuthService`].
pub const MOCK_ACCESS_TOKEN_TTL: Duration = Duration::from_secs(15 * 60);

const MOCK_JWT_SECRET: &[u8] = b"huddle-mock-auth-signing-key";

/// JWT claims of mock access tokens.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
    pub iat: usize,
    /// Random per-token id so two tokens issued in the same second differ
    pub jti: String,
}

struct Account {
    user: User,
    password_hash: String,
}

/// In-memory auth backend issuing real HS256 access tokens.
///
/// Tracks one signed-in user, like a single device would. Other mock
/// services ask it who the caller is.
pub struct MockAuthService {
    accounts: DashMap<String, Account>,
    refresh_tokens: DashMap<String, String>,
    current_access_token: Mutex<Option<String>>,
    access_ttl: Duration,
    rng: SystemRandom,
}

impl Default for MockAuthService {
    fn default() -> Self {
        Self::new()
    }
}

impl MockAuthService {
    pub fn new() -> Self {
        Self::with_access_ttl(MOCK_ACCESS_TOKEN_TTL)
    }

    pub fn with_access_ttl(access_ttl: Duration) -> Self {
        Self {
            accounts: DashMap::new(),
            refresh_tokens: DashMap::new(),
            current_access_token: Mutex::new(None),
            access_ttl,
            rng: SystemRandom::new(),
        }
    }

    /// The user behind the current access token.
    pub fn signed_in_user(&self) -> Result<User> {
        let token = self
            .lock_current()
            .clone()
            .ok_or_else(|| AppError::Auth("Not signed in".to_string()))?;
        let user_id = self.verify_access_token(&token)?;
        self.user_by_id(&user_id)
            .ok_or_else(|| AppError::Auth("Account no longer exists".to_string()))
    }

    /// Validate an access token and return its subject.
    pub fn verify_access_token(&self, token: &str) -> Result<String> {
        let key = DecodingKey::from_secret(MOCK_JWT_SECRET);
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        let data = decode::<Claims>(token, &key, &validation)
            .map_err(|e| AppError::Auth(format!("Invalid access token: {}", e)))?;
        Ok(data.claims.sub)
    }

    pub fn user_by_id(&self, user_id: &str) -> Option<User> {
        self.accounts.get(user_id).map(|account| account.user.clone())
    }

    /// Replace a stored user (profile updates).
    pub fn update_user(&self, user: User) -> Result<()> {
        let mut account = self
            .accounts
            .get_mut(&user.id)
            .ok_or_else(|| AppError::NotFound(format!("User {}", user.id)))?;
        account.user = user;
        Ok(())
    }

    fn lock_current(&self) -> std::sync::MutexGuard<'_, Option<String>> {
        self.current_access_token
            .lock()
            .unwrap_or_else(|e| e.into_inner())
    }

    fn random_hex(&self, len: usize) -> Result<String> {
        let mut bytes = vec![0u8; len];
        self.rng
            .fill(&mut bytes)
            .map_err(|_| anyhow::anyhow!("System RNG failure"))?;
        Ok(hex::encode(bytes))
    }

    fn issue_tokens(&self, user_id: &str) -> Result<AuthTokens> {
        let now_ms = now_millis();
        let iat = (now_ms / 1000) as usize;
        let claims = Claims {
            sub: user_id.to_string(),
            iat,
            exp: iat + self.access_ttl.as_secs() as usize,
            jti: self.random_hex(8)?,
        };
        let access_token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(MOCK_JWT_SECRET),
        )
        .context("Failed to sign access token")?;

        let refresh_token = self.random_hex(32)?;
        self.refresh_tokens
            .insert(refresh_token.clone(), user_id.to_string());
        *self.lock_current() = Some(access_token.clone());

        Ok(AuthTokens {
            access_token,
            refresh_token,
            expires_at: now_ms + self.access_ttl.as_millis() as i64,
        })
    }

    fn find_by_email(&self, email: &str) -> Option<String> {
        self.accounts
            .iter()
            .find(|entry| entry.user.email.eq_ignore_ascii_case(email))
            .map(|entry| entry.key().clone())
    }
}

fn password_hash(email: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(email.to_ascii_lowercase().as_bytes());
    hasher.update(b":");
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

fn invalid_credentials() -> AppError {
    let mut err = ApiError::from_status(401, "Invalid email or password");
    err.code = "INVALID_CREDENTIALS".to_string();
    AppError::Api(err)
}

#[async_trait]
impl AuthService for MockAuthService {
    async fn login(&self, input: &LoginInput) -> Result<AuthSession> {
        input.validate()?;

        let user_id = self
            .find_by_email(input.email.trim())
            .ok_or_else(invalid_credentials)?;
        let user = {
            let account = self.accounts.get(&user_id).ok_or_else(invalid_credentials)?;
            let candidate = password_hash(&account.user.email, &input.password);
            if !bool::from(candidate.as_bytes().ct_eq(account.password_hash.as_bytes())) {
                tracing::debug!(user_id = %user_id, "Mock login rejected");
                return Err(invalid_credentials());
            }
            account.user.clone()
        };

        let tokens = self.issue_tokens(&user.id)?;
        tracing::info!(user_id = %user.id, "Mock login");
        Ok(AuthSession { user, tokens })
    }

    async fn register(&self, input: &RegisterInput) -> Result<AuthSession> {
        input.validate()?;

        let email = input.email.trim().to_string();
        if self.find_by_email(&email).is_some() {
            return Err(AppError::Conflict(
                "An account with this email already exists".to_string(),
            ));
        }

        let now = Utc::now();
        let user = User {
            id: format!("user_{}", self.random_hex(6)?),
            email: email.clone(),
            display_name: input.display_name.trim().to_string(),
            home_city: input
                .home_city
                .as_deref()
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(str::to_string),
            reliability_score: 1.0,
            level: 1,
            xp: 0,
            avatar_url: None,
            created_at: now,
            updated_at: now,
        };
        self.accounts.insert(
            user.id.clone(),
            Account {
                user: user.clone(),
                password_hash: password_hash(&email, &input.password),
            },
        );

        let tokens = self.issue_tokens(&user.id)?;
        tracing::info!(user_id = %user.id, "Mock account registered");
        Ok(AuthSession { user, tokens })
    }

    async fn refresh(&self, refresh_token: &str) -> Result<AuthTokens> {
        // Rotation: a refresh token is good for exactly one exchange.
        let (_, user_id) = self
            .refresh_tokens
            .remove(refresh_token)
            .ok_or_else(|| AppError::Auth("Refresh token rejected".to_string()))?;
        if !self.accounts.contains_key(&user_id) {
            return Err(AppError::Auth("Account no longer exists".to_string()));
        }
        self.issue_tokens(&user_id)
    }

    async fn logout(&self) -> Result<()> {
        let token = self.lock_current().take();
        if let Some(user_id) = token.and_then(|t| self.verify_access_token(&t).ok()) {
            self.refresh_tokens.retain(|_, owner| *owner != user_id);
            tracing::info!(user_id = %user_id, "Mock logout");
        }
        Ok(())
    }

    async fn current_user(&self) -> Result<User> {
        self.signed_in_user()
    }
}

#[async_trait]
impl TokenRefresher for MockAuthService {
    async fn refresh(&self, refresh_token: &str) -> Result<AuthTokens> {
        AuthService::refresh(self, refresh_token).await
    }
}
