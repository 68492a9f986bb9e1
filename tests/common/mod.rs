// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Shared fixtures: an in-process fake of the Huddle API and helpers for
//! wiring a client against it.

use axum::{
    extract::{Path, RawQuery, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use huddle::config::Config;
use huddle::http::{ApiTransport, HttpClient, HttpRefresher};
use huddle::models::{
    AuthTokens, CreateEventInput, EventLocation, LoginInput, RegisterInput, SkillLevel, Visibility,
};
use huddle::session::{self, RefreshCoordinator, SessionEvent};
use huddle::storage::SecureTokenStore;
use huddle::time_utils::now_millis;
use serde_json::json;
use std::sync::atomic::{AtomicU16, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use chrono::{Duration as ChronoDuration, Utc};
use tokio::sync::broadcast;

/// Server-side state of the fake API.
pub struct FakeState {
    /// Access token the server currently accepts
    pub valid_access: Mutex<String>,
    pub refresh_calls: AtomicUsize,
    /// 0 = refresh succeeds, otherwise the status to fail with
    pub refresh_status: AtomicU16,
    /// 503s left before `GET flaky` succeeds
    pub flaky_failures_left: AtomicUsize,
    pub flaky_calls: AtomicUsize,
    pub seen_auth: Mutex<Vec<Option<String>>>,
    pub last_query: Mutex<Option<String>>,
    /// (event id, body) of the last RSVP
    pub last_rsvp: Mutex<Option<(String, serde_json::Value)>>,
}

impl FakeState {
    fn accepts(&self, headers: &HeaderMap) -> bool {
        let presented = headers
            .get(header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .map(str::to_string);
        self.seen_auth.lock().unwrap().push(presented.clone());

        let expected = format!("Bearer {}", self.valid_access.lock().unwrap());
        presented.as_deref() == Some(expected.as_str())
    }
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({"error": {"code": "UNAUTHORIZED", "message": "Token expired"}})),
    )
        .into_response()
}

async fn me(State(state): State<Arc<FakeState>>, headers: HeaderMap) -> Response {
    if !state.accepts(&headers) {
        return unauthorized();
    }
    Json(json!({"id": "user_1", "displayName": "Sam"})).into_response()
}

async fn always_unauthorized(State(state): State<Arc<FakeState>>, headers: HeaderMap) -> Response {
    state.accepts(&headers);
    unauthorized()
}

async fn refresh(State(state): State<Arc<FakeState>>) -> Response {
    let n = state.refresh_calls.fetch_add(1, Ordering::SeqCst) + 1;
    // Long enough for concurrent 401s to pile up behind the lock.
    tokio::time::sleep(Duration::from_millis(50)).await;

    let status = state.refresh_status.load(Ordering::SeqCst);
    if status != 0 {
        let status = StatusCode::from_u16(status).unwrap();
        return (
            status,
            Json(json!({"error": "Refresh failed", "message": "Refresh token revoked"})),
        )
            .into_response();
    }

    let access = format!("access-{}", n);
    *state.valid_access.lock().unwrap() = access.clone();
    Json(json!({
        "accessToken": access,
        "refreshToken": format!("refresh-{}", n),
        "expiresAt": now_millis() + 3_600_000,
    }))
    .into_response()
}

async fn flaky_get(State(state): State<Arc<FakeState>>) -> Response {
    state.flaky_calls.fetch_add(1, Ordering::SeqCst);
    let left = state.flaky_failures_left.load(Ordering::SeqCst);
    if left > 0 {
        state.flaky_failures_left.store(left - 1, Ordering::SeqCst);
        return (StatusCode::SERVICE_UNAVAILABLE, "upstream down").into_response();
    }
    Json(json!({"ok": true})).into_response()
}

async fn flaky_post(State(state): State<Arc<FakeState>>) -> Response {
    state.flaky_calls.fetch_add(1, Ordering::SeqCst);
    (StatusCode::SERVICE_UNAVAILABLE, "upstream down").into_response()
}

async fn event_full() -> Response {
    (
        StatusCode::CONFLICT,
        Json(json!({
            "error": {
                "code": "EVENT_FULL",
                "message": "This event is full",
                "details": {"capacity": 10}
            }
        })),
    )
        .into_response()
}

fn user_json(email: &str) -> serde_json::Value {
    json!({
        "id": "user_1",
        "email": email,
        "displayName": "Sam",
        "reliabilityScore": 1.0,
        "level": 1,
        "xp": 0,
        "createdAt": "2026-01-01T00:00:00Z",
        "updatedAt": "2026-01-01T00:00:00Z",
    })
}

async fn login(
    State(state): State<Arc<FakeState>>,
    Json(body): Json<serde_json::Value>,
) -> Response {
    let email = body["email"].as_str().unwrap_or_default();
    if body["password"] != "StrongPass123!" {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"code": "INVALID_CREDENTIALS", "message": "Invalid email or password"})),
        )
            .into_response();
    }
    let access = state.valid_access.lock().unwrap().clone();
    Json(json!({
        "user": user_json(email),
        "tokens": {
            "accessToken": access,
            "refreshToken": "refresh-0",
            "expiresAt": now_millis() + 3_600_000,
        }
    }))
    .into_response()
}

async fn list_events(
    State(state): State<Arc<FakeState>>,
    RawQuery(query): RawQuery,
) -> Json<serde_json::Value> {
    *state.last_query.lock().unwrap() = query;
    Json(json!([]))
}

async fn rsvp(
    State(state): State<Arc<FakeState>>,
    Path(event_id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<serde_json::Value>,
) -> Response {
    if !state.accepts(&headers) {
        return unauthorized();
    }
    *state.last_rsvp.lock().unwrap() = Some((event_id.clone(), body));
    Json(json!({
        "id": "rsvp_1",
        "eventId": event_id,
        "userId": "user_1",
        "status": "going",
        "paymentAuthorizationId": "pa_000001",
        "createdAt": "2026-01-01T00:00:00Z",
    }))
    .into_response()
}

async fn no_content() -> StatusCode {
    StatusCode::NO_CONTENT
}

/// A running fake API.
#[allow(dead_code)]
pub struct FakeApi {
    pub base_url: String,
    pub state: Arc<FakeState>,
}

#[allow(dead_code)]
impl FakeApi {
    pub async fn start() -> Self {
        let state = Arc::new(FakeState {
            valid_access: Mutex::new("access-0".to_string()),
            refresh_calls: AtomicUsize::new(0),
            refresh_status: AtomicU16::new(0),
            flaky_failures_left: AtomicUsize::new(0),
            flaky_calls: AtomicUsize::new(0),
            seen_auth: Mutex::new(Vec::new()),
            last_query: Mutex::new(None),
            last_rsvp: Mutex::new(None),
        });

        let app = Router::new()
            .route("/api/me", get(me))
            .route("/api/locked", get(always_unauthorized))
            .route("/api/auth/refresh", post(refresh))
            .route("/api/auth/login", post(login))
            .route("/api/events", get(list_events))
            .route("/api/events/{id}/rsvp", post(rsvp))
            .route("/api/flaky", get(flaky_get).post(flaky_post))
            .route("/api/events/full", get(event_full))
            .route("/api/empty", get(no_content))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://{}/api/", addr),
            state,
        }
    }

    pub fn refresh_calls(&self) -> usize {
        self.state.refresh_calls.load(Ordering::SeqCst)
    }
}

/// Authenticated client against `base_url`, with everything a test needs
/// to poke at.
#[allow(dead_code)]
pub struct TestClient {
    pub client: HttpClient,
    pub store: Arc<SecureTokenStore>,
    pub events: broadcast::Receiver<SessionEvent>,
}

#[allow(dead_code)]
pub fn test_config(base_url: &str) -> Config {
    let mut config = Config::test_default();
    config.api_base_url = base_url.to_string();
    config.request_timeout = Duration::from_secs(2);
    config
}

#[allow(dead_code)]
pub async fn test_client(base_url: &str) -> TestClient {
    let config = test_config(base_url);
    let transport = Arc::new(ApiTransport::new(&config).unwrap());
    let store = Arc::new(SecureTokenStore::in_memory().await);
    let coordinator = Arc::new(RefreshCoordinator::new(
        store.clone(),
        Arc::new(HttpRefresher::new(transport.clone())),
    ));
    let sender = session::event_channel();
    let events = sender.subscribe();

    TestClient {
        client: HttpClient::new(transport, coordinator, sender),
        store,
        events,
    }
}

/// Store a session whose access token is `access`.
#[allow(dead_code)]
pub async fn sign_in(store: &SecureTokenStore, access: &str) {
    store
        .store_tokens(&AuthTokens {
            access_token: access.to_string(),
            refresh_token: "refresh-0".to_string(),
            expires_at: now_millis() + 3_600_000,
        })
        .await
        .unwrap();
}

/// Session whose access token ran out a minute ago but can still be refreshed.
#[allow(dead_code)]
pub async fn sign_in_expired(store: &SecureTokenStore, access: &str) {
    store
        .store_tokens(&AuthTokens {
            access_token: access.to_string(),
            refresh_token: "refresh-0".to_string(),
            expires_at: now_millis() - 60_000,
        })
        .await
        .unwrap();
}

pub const TEST_PASSWORD: &str = "StrongPass123!";

#[allow(dead_code)]
pub fn register_input(email: &str, display_name: &str) -> RegisterInput {
    RegisterInput {
        email: email.to_string(),
        password: TEST_PASSWORD.to_string(),
        display_name: display_name.to_string(),
        home_city: Some("San Francisco".to_string()),
    }
}

#[allow(dead_code)]
pub fn login_input(email: &str) -> LoginInput {
    LoginInput {
        email: email.to_string(),
        password: TEST_PASSWORD.to_string(),
        remember_me: false,
    }
}

/// Public pickleball game at Mission Rec two days out.
#[allow(dead_code)]
pub fn event_input(capacity: u32, deposit_amount: u32) -> CreateEventInput {
    let starts_at = Utc::now() + ChronoDuration::days(2);
    CreateEventInput {
        title: "Weekend Pickleball".to_string(),
        description: Some("Friendly doubles, all levels".to_string()),
        sport: "pickleball".to_string(),
        skill_level: SkillLevel::AllLevels,
        location: EventLocation {
            name: "Mission Rec Center".to_string(),
            address: Some("2450 Harrison St, San Francisco".to_string()),
            latitude: 37.7599,
            longitude: -122.4125,
        },
        starts_at,
        ends_at: starts_at + ChronoDuration::hours(2),
        capacity,
        deposit_amount,
        visibility: Visibility::Public,
    }
}
