// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Client configuration loaded from environment variables.
//!
//! Everything except the API base URL has a default, so a `.env` file with
//! a single `HUDDLE_API_URL` line is enough for local development.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Idle threshold before the session is considered expired.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(30 * 60);
/// Activity events closer together than this collapse into one.
pub const DEFAULT_ACTIVITY_DEBOUNCE: Duration = Duration::from_secs(1);
/// Refresh when the access token expires within this window.
pub const DEFAULT_REFRESH_THRESHOLD: Duration = Duration::from_secs(5 * 60);
/// Poll interval of the background refresh loop.
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(60);

/// Client configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the Huddle REST API (with trailing slash)
    pub api_base_url: String,
    /// Directory for the encrypted token store; `None` keeps tokens in memory
    pub storage_dir: Option<PathBuf>,
    /// Use the in-memory mock services instead of the HTTP API
    pub use_mock_services: bool,
    /// Per-request timeout
    pub request_timeout: Duration,
    /// Retries for idempotent requests
    pub max_retries: u32,
    /// Backoff step between retries
    pub retry_backoff: Duration,
    pub refresh_threshold: Duration,
    pub refresh_interval: Duration,
    pub idle_timeout: Duration,
    pub activity_debounce: Duration,
    /// HMAC key for check-in tokens issued by the mock event service
    pub check_in_secret: Vec<u8>,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let api_base_url =
            env::var("HUDDLE_API_URL").map_err(|_| ConfigError::Missing("HUDDLE_API_URL"))?;

        Ok(Self {
            api_base_url: normalize_base_url(api_base_url.trim()),
            storage_dir: env::var("HUDDLE_STORAGE_DIR").ok().map(PathBuf::from),
            use_mock_services: env::var("HUDDLE_USE_MOCKS")
                .map(|v| matches!(v.trim(), "1" | "true" | "yes"))
                .unwrap_or(false),
            request_timeout: Duration::from_secs(parse_var("HUDDLE_REQUEST_TIMEOUT_SECS", 15)?),
            max_retries: parse_var("HUDDLE_MAX_RETRIES", 3)?,
            retry_backoff: Duration::from_millis(parse_var("HUDDLE_RETRY_BACKOFF_MS", 300)?),
            refresh_threshold: Duration::from_secs(parse_var(
                "HUDDLE_REFRESH_THRESHOLD_SECS",
                DEFAULT_REFRESH_THRESHOLD.as_secs(),
            )?),
            refresh_interval: Duration::from_secs(parse_var(
                "HUDDLE_REFRESH_INTERVAL_SECS",
                DEFAULT_REFRESH_INTERVAL.as_secs(),
            )?),
            idle_timeout: Duration::from_secs(parse_var(
                "HUDDLE_IDLE_TIMEOUT_SECS",
                DEFAULT_IDLE_TIMEOUT.as_secs(),
            )?),
            activity_debounce: Duration::from_millis(parse_var(
                "HUDDLE_ACTIVITY_DEBOUNCE_MS",
                DEFAULT_ACTIVITY_DEBOUNCE.as_millis() as u64,
            )?),
            check_in_secret: env::var("HUDDLE_CHECKIN_SECRET")
                .map(|v| v.trim().as_bytes().to_vec())
                .unwrap_or_else(|_| b"local-dev-check-in-secret".to_vec()),
        })
    }

    /// Config for tests: mock services, in-memory storage, short backoff.
    pub fn test_default() -> Self {
        Self {
            api_base_url: "http://localhost:8080/api/".to_string(),
            storage_dir: None,
            use_mock_services: true,
            request_timeout: Duration::from_secs(5),
            max_retries: 2,
            retry_backoff: Duration::from_millis(10),
            refresh_threshold: DEFAULT_REFRESH_THRESHOLD,
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            activity_debounce: DEFAULT_ACTIVITY_DEBOUNCE,
            check_in_secret: b"test_check_in_secret_32_bytes!!!".to_vec(),
        }
    }
}

/// Ensure the base URL ends with `/` so relative paths join under it.
pub fn normalize_base_url(url: &str) -> String {
    if url.ends_with('/') {
        url.to_string()
    } else {
        format!("{}/", url)
    }
}

fn parse_var<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid(name)),
        Err(_) => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),
}
