// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! HTTP-backed services wired through `HuddleClient` against the fake API.

use huddle::models::{EventFilters, EventStatus, RsvpStatus};
use huddle::session::SessionEvent;
use huddle::HuddleClient;
use serde_json::json;

mod common;
use common::{login_input, test_config, FakeApi};

async fn http_client(api: &FakeApi) -> HuddleClient {
    let mut config = test_config(&api.base_url);
    config.use_mock_services = false;
    HuddleClient::build(config).await.unwrap()
}

#[tokio::test]
async fn test_login_stores_session() {
    let api = FakeApi::start().await;
    let client = http_client(&api).await;
    let mut events = client.session.subscribe();

    let user = client
        .session
        .login(&login_input("sam@example.com"))
        .await
        .unwrap();
    assert_eq!(user.email, "sam@example.com");
    assert_eq!(
        events.recv().await.unwrap(),
        SessionEvent::LoggedIn {
            user_id: "user_1".to_string()
        }
    );

    let tokens = client.session.store().get_tokens().await.unwrap();
    assert_eq!(tokens.access_token, "access-0");
    assert!(client.session.token_manager().is_running());
}

#[tokio::test]
async fn test_bad_password_surfaces_server_error() {
    let api = FakeApi::start().await;
    let client = http_client(&api).await;

    let mut input = login_input("sam@example.com");
    input.password = "WrongPass123!".to_string();
    let err = client.session.login(&input).await.unwrap_err();

    assert_eq!(err.code(), "INVALID_CREDENTIALS");
    assert!(!err.is_auth_error());
    assert!(!client.session.is_authenticated().await);
    assert_eq!(api.refresh_calls(), 0);
}

#[tokio::test]
async fn test_list_events_sends_filters_as_query() {
    let api = FakeApi::start().await;
    let client = http_client(&api).await;

    let events = client
        .events
        .list_events(&EventFilters {
            sport: Some("tennis".to_string()),
            status: Some(EventStatus::Upcoming),
            radius_km: Some(10.0),
            ..Default::default()
        })
        .await
        .unwrap();
    assert!(events.is_empty());

    let query = api.state.last_query.lock().unwrap().clone().unwrap();
    assert!(query.contains("sport=tennis"), "{query}");
    assert!(query.contains("status=upcoming"), "{query}");
    assert!(query.contains("radiusKm=10"), "{query}");
    assert!(!query.contains("query="), "{query}");
}

#[tokio::test]
async fn test_rsvp_posts_payment_method_with_bearer() {
    let api = FakeApi::start().await;
    let client = http_client(&api).await;
    client
        .session
        .login(&login_input("sam@example.com"))
        .await
        .unwrap();

    let rsvp = client
        .events
        .rsvp("evt 1", Some("pm_card_visa"))
        .await
        .unwrap();
    assert_eq!(rsvp.status, RsvpStatus::Going);
    assert_eq!(rsvp.payment_authorization_id.as_deref(), Some("pa_000001"));

    let (event_id, body) = api.state.last_rsvp.lock().unwrap().clone().unwrap();
    assert_eq!(event_id, "evt 1");
    assert_eq!(body, json!({"paymentMethodId": "pm_card_visa"}));
    assert_eq!(
        api.state.seen_auth.lock().unwrap().last().cloned().flatten(),
        Some("Bearer access-0".to_string())
    );
}

#[tokio::test]
async fn test_rsvp_after_token_rotation_refreshes_once() {
    let api = FakeApi::start().await;
    let client = http_client(&api).await;
    client
        .session
        .login(&login_input("sam@example.com"))
        .await
        .unwrap();

    // The server rotates keys; the stored token is now stale.
    *api.state.valid_access.lock().unwrap() = "rotated".to_string();

    let rsvp = client.events.rsvp("evt_2", None).await.unwrap();
    assert_eq!(rsvp.event_id, "evt_2");
    assert_eq!(api.refresh_calls(), 1);
    assert_eq!(
        api.state.last_rsvp.lock().unwrap().clone().unwrap().1,
        json!({})
    );
}
