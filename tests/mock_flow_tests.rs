// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! End-to-end flows through the mock services.
//!
//! These tests verify that:
//! 1. A deposit is held at RSVP and released at check-in
//! 2. Capacity, host and payment rules are enforced on RSVP
//! 3. Cancelling an event releases every held deposit
//! 4. Private events stay hidden from everyone but their host
//! 5. Profile updates are validated and cached

use huddle::config::Config;
use huddle::error::AppError;
use huddle::models::{
    EventFilters, EventStatus, PaymentStatus, RsvpStatus, UpdateProfileInput, Visibility,
};
use huddle::services::{
    AuthService, EventService, MockAuthService, MockEventService, MockPaymentService,
    PaymentService,
};
use huddle::HuddleClient;
use std::sync::Arc;

mod common;
use common::{event_input, login_input, register_input};

fn assert_field_error(err: &AppError, field: &str) {
    match err {
        AppError::Validation(errors) => assert!(
            errors.field_errors().contains_key(field),
            "expected error on {field}, got {errors:?}"
        ),
        other => panic!("expected validation error, got {other:?}"),
    }
}

async fn mock_client() -> HuddleClient {
    HuddleClient::build(Config::test_default()).await.unwrap()
}

#[tokio::test]
async fn test_deposit_held_and_refunded_at_check_in() {
    let client = mock_client().await;

    let host = client
        .session
        .register(&register_input("host@example.com", "Hana Host"))
        .await
        .unwrap();
    let event = client.events.create_event(&event_input(8, 500)).await.unwrap();
    assert_eq!(event.host_id, host.id);
    assert_eq!(event.status, EventStatus::Upcoming);
    client.session.logout().await;

    let attendee = client
        .session
        .register(&register_input("player@example.com", "Pat Player"))
        .await
        .unwrap();

    let err = client.events.rsvp(&event.id, None).await.unwrap_err();
    assert_field_error(&err, "paymentMethodId");

    let rsvp = client
        .events
        .rsvp(&event.id, Some("pm_card_visa"))
        .await
        .unwrap();
    assert_eq!(rsvp.status, RsvpStatus::Going);
    let authorization_id = rsvp.payment_authorization_id.clone().unwrap();
    assert_eq!(
        client.events.get_event(&event.id).await.unwrap().participant_count,
        1
    );

    let code = client.events.check_in_token(&event.id).await.unwrap();
    assert!(code.expires_at > chrono::Utc::now());

    // Attendees cannot scan their own code.
    let err = client.events.check_in(&event.id, &code.token).await.unwrap_err();
    assert!(matches!(err, AppError::Api(ref e) if e.status == Some(403)));
    client.session.logout().await;

    client
        .session
        .login(&login_input("host@example.com"))
        .await
        .unwrap();
    let result = client.events.check_in(&event.id, &code.token).await.unwrap();
    assert!(result.success);
    assert!(result.deposit_refunded);
    assert_eq!(result.refund_amount, 500);

    let participants = client.events.participants(&event.id).await.unwrap();
    assert_eq!(participants.len(), 1);
    assert_eq!(participants[0].user_id, attendee.id);
    assert_eq!(participants[0].display_name, "Pat Player");
    assert_eq!(participants[0].rsvp_status, RsvpStatus::CheckedIn);
    assert!(participants[0].checked_in_at.is_some());

    // Scanning twice does not refund twice.
    let err = client.events.check_in(&event.id, &code.token).await.unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    let captured = client.payments.capture(&authorization_id).await.unwrap_err();
    assert!(matches!(captured, AppError::Conflict(_)));
}

#[tokio::test]
async fn test_check_in_code_for_other_event_rejected() {
    let client = mock_client().await;
    client
        .session
        .register(&register_input("host@example.com", "Hana Host"))
        .await
        .unwrap();
    let first = client.events.create_event(&event_input(8, 0)).await.unwrap();
    let second = client.events.create_event(&event_input(8, 0)).await.unwrap();
    client.session.logout().await;

    client
        .session
        .register(&register_input("player@example.com", "Pat Player"))
        .await
        .unwrap();
    client.events.rsvp(&first.id, None).await.unwrap();
    let code = client.events.check_in_token(&first.id).await.unwrap();
    client.session.logout().await;

    client
        .session
        .login(&login_input("host@example.com"))
        .await
        .unwrap();
    let err = client
        .events
        .check_in(&second.id, &code.token)
        .await
        .unwrap_err();
    match err {
        AppError::Api(e) => assert_eq!(e.code, "INVALID_CHECK_IN_CODE"),
        other => panic!("unexpected error: {other:?}"),
    }

    let result = client.events.check_in(&first.id, &code.token).await.unwrap();
    assert!(!result.deposit_refunded);
    assert_eq!(result.refund_amount, 0);
}

#[tokio::test]
async fn test_rsvp_rules() {
    let client = mock_client().await;
    client
        .session
        .register(&register_input("host@example.com", "Hana Host"))
        .await
        .unwrap();
    let event = client.events.create_event(&event_input(2, 0)).await.unwrap();

    let err = client.events.rsvp(&event.id, None).await.unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)), "host RSVP: {err:?}");
    client.session.logout().await;

    for (i, expected) in [RsvpStatus::Going, RsvpStatus::Going, RsvpStatus::Waitlisted]
        .into_iter()
        .enumerate()
    {
        let email = format!("player{}@example.com", i);
        client
            .session
            .register(&register_input(&email, "Player"))
            .await
            .unwrap();
        let rsvp = client.events.rsvp(&event.id, None).await.unwrap();
        assert_eq!(rsvp.status, expected);

        if i == 0 {
            let err = client.events.rsvp(&event.id, None).await.unwrap_err();
            assert!(matches!(err, AppError::Conflict(_)), "duplicate: {err:?}");
        }
        client.session.logout().await;
    }

    let event = client.events.get_event(&event.id).await.unwrap();
    assert_eq!(event.participant_count, 2);
    assert!(event.is_full());

    // Freeing a spot does not promote the waitlist.
    client
        .session
        .login(&login_input("player0@example.com"))
        .await
        .unwrap();
    let cancelled = client.events.cancel_rsvp(&event.id).await.unwrap();
    assert_eq!(cancelled.status, RsvpStatus::Cancelled);
    let participants = client.events.participants(&event.id).await.unwrap();
    assert_eq!(participants.len(), 2);
    assert!(participants
        .iter()
        .any(|p| p.rsvp_status == RsvpStatus::Waitlisted));
    assert_eq!(
        client.events.get_event(&event.id).await.unwrap().participant_count,
        1
    );
}

#[tokio::test]
async fn test_declined_card_leaves_no_rsvp() {
    let client = mock_client().await;
    client
        .session
        .register(&register_input("host@example.com", "Hana Host"))
        .await
        .unwrap();
    let event = client.events.create_event(&event_input(8, 1000)).await.unwrap();
    client.session.logout().await;

    client
        .session
        .register(&register_input("player@example.com", "Pat Player"))
        .await
        .unwrap();
    let err = client
        .events
        .rsvp(&event.id, Some("pm_card_declined"))
        .await
        .unwrap_err();
    match err {
        AppError::Api(e) => {
            assert_eq!(e.code, "CARD_DECLINED");
            assert_eq!(e.status, Some(402));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(client.events.participants(&event.id).await.unwrap().is_empty());

    // A working card afterwards is fine.
    let rsvp = client
        .events
        .rsvp(&event.id, Some("pm_card_visa"))
        .await
        .unwrap();
    assert_eq!(rsvp.status, RsvpStatus::Going);
}

#[tokio::test]
async fn test_cancel_event_releases_deposits() {
    let auth = Arc::new(MockAuthService::new());
    let payments = Arc::new(MockPaymentService::new());
    let events = MockEventService::new(
        auth.clone(),
        payments.clone(),
        Config::test_default().check_in_secret,
    );

    auth.register(&register_input("host@example.com", "Hana Host"))
        .await
        .unwrap();
    let event = events.create_event(&event_input(8, 500)).await.unwrap();

    auth.register(&register_input("player@example.com", "Pat Player"))
        .await
        .unwrap();
    let rsvp = events.rsvp(&event.id, Some("pm_card_visa")).await.unwrap();
    let authorization_id = rsvp.payment_authorization_id.unwrap();
    assert_eq!(
        payments.authorization(&authorization_id).unwrap().status,
        PaymentStatus::Authorized
    );

    // Only the host may cancel.
    let err = events.cancel_event(&event.id).await.unwrap_err();
    assert!(matches!(err, AppError::Api(ref e) if e.status == Some(403)));

    auth.login(&login_input("host@example.com")).await.unwrap();
    let cancelled = events.cancel_event(&event.id).await.unwrap();
    assert_eq!(cancelled.status, EventStatus::Cancelled);
    assert_eq!(cancelled.participant_count, 0);
    assert_eq!(
        payments.authorization(&authorization_id).unwrap().status,
        PaymentStatus::Released
    );

    let err = events.cancel_event(&event.id).await.unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));
    let err = payments.capture(&authorization_id).await.unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));
}

#[tokio::test]
async fn test_private_events_visible_to_host_only() {
    let client = mock_client().await;
    client
        .session
        .register(&register_input("host@example.com", "Hana Host"))
        .await
        .unwrap();
    let mut input = event_input(8, 0);
    input.visibility = Visibility::Private;
    input.title = "Staff Volleyball".to_string();
    input.sport = "volleyball".to_string();
    let private = client.events.create_event(&input).await.unwrap();
    let public = client.events.create_event(&event_input(8, 0)).await.unwrap();
    assert_eq!(
        client
            .events
            .list_events(&EventFilters::default())
            .await
            .unwrap()
            .len(),
        2
    );
    client.session.logout().await;

    client
        .session
        .register(&register_input("player@example.com", "Pat Player"))
        .await
        .unwrap();
    let visible = client
        .events
        .list_events(&EventFilters::default())
        .await
        .unwrap();
    assert_eq!(visible.len(), 1);
    assert_eq!(visible[0].id, public.id);

    let err = client.events.get_event(&private.id).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
    let err = client.events.rsvp(&private.id, None).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn test_event_filters() {
    let client = mock_client().await;
    client
        .session
        .register(&register_input("host@example.com", "Hana Host"))
        .await
        .unwrap();

    let pickleball = client.events.create_event(&event_input(8, 0)).await.unwrap();
    let mut input = event_input(10, 0);
    input.title = "Sunset Soccer".to_string();
    input.sport = "soccer".to_string();
    input.description = None;
    // Lake Merritt, about 15 km from Mission Rec.
    input.location.name = "Lake Merritt".to_string();
    input.location.latitude = 37.8020;
    input.location.longitude = -122.2580;
    let soccer = client.events.create_event(&input).await.unwrap();

    let by_sport = client
        .events
        .list_events(&EventFilters {
            sport: Some("Soccer".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(by_sport.len(), 1);
    assert_eq!(by_sport[0].id, soccer.id);

    let by_query = client
        .events
        .list_events(&EventFilters {
            query: Some("doubles".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(by_query.len(), 1);
    assert_eq!(by_query[0].id, pickleball.id);

    let nearby = client
        .events
        .list_events(&EventFilters {
            near_latitude: Some(37.7599),
            near_longitude: Some(-122.4125),
            radius_km: Some(5.0),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(nearby.len(), 1);
    assert_eq!(nearby[0].id, pickleball.id);

    client.events.cancel_event(&soccer.id).await.unwrap();
    let upcoming = client
        .events
        .list_events(&EventFilters {
            status: Some(EventStatus::Upcoming),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(upcoming.len(), 1);
    assert_eq!(upcoming[0].id, pickleball.id);

    let hosted = client.users.my_events().await.unwrap();
    assert_eq!(hosted.len(), 2);
}

#[tokio::test]
async fn test_invalid_event_rejected_before_creation() {
    let client = mock_client().await;
    client
        .session
        .register(&register_input("host@example.com", "Hana Host"))
        .await
        .unwrap();

    let mut input = event_input(1, 250);
    input.title = "  ".to_string();
    let err = client.events.create_event(&input).await.unwrap_err();
    assert_field_error(&err, "title");
    assert_field_error(&err, "capacity");
    assert_field_error(&err, "deposit_amount");
    assert!(client
        .events
        .list_events(&EventFilters::default())
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_profile_update() {
    let client = mock_client().await;
    let user = client
        .session
        .register(&register_input("player@example.com", "Pat Player"))
        .await
        .unwrap();

    let profile = client.users.current_profile().await.unwrap();
    assert_eq!(profile.id, user.id);

    let updated = client
        .users
        .update_profile(&UpdateProfileInput {
            display_name: Some("  Pat P.  ".to_string()),
            home_city: Some(String::new()),
            avatar_url: None,
        })
        .await
        .unwrap();
    assert_eq!(updated.display_name, "Pat P.");
    assert_eq!(updated.home_city, None);
    assert_eq!(
        client.users.current_profile().await.unwrap().display_name,
        "Pat P."
    );
    assert_eq!(
        client.users.get_profile(&user.id).await.unwrap().display_name,
        "Pat P."
    );

    let err = client
        .users
        .update_profile(&UpdateProfileInput {
            display_name: Some("P".to_string()),
            avatar_url: Some("not a url".to_string()),
            ..Default::default()
        })
        .await
        .unwrap_err();
    assert_field_error(&err, "display_name");
    assert_field_error(&err, "avatar_url");

    let err = client.users.get_profile("user_missing").await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn test_wrong_password_and_duplicate_email() {
    let client = mock_client().await;
    client
        .session
        .register(&register_input("player@example.com", "Pat Player"))
        .await
        .unwrap();
    client.session.logout().await;

    let mut input = login_input("player@example.com");
    input.password = "WrongPass123!".to_string();
    let err = client.session.login(&input).await.unwrap_err();
    assert_eq!(err.code(), "INVALID_CREDENTIALS");
    assert!(!client.session.is_authenticated().await);

    let err = client
        .session
        .register(&register_input("PLAYER@example.com", "Someone Else"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));
}
