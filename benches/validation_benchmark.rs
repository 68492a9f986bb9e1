use chrono::{Duration, Utc};
use criterion::{criterion_group, criterion_main, Criterion};
use huddle::http::normalize_error;
use huddle::models::{CreateEventInput, EventLocation, SkillLevel, Visibility};
use huddle::validation::validate_password;
use std::hint::black_box;
use validator::Validate;

fn event_input() -> CreateEventInput {
    let starts_at = Utc::now() + Duration::days(2);
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
        ends_at: starts_at + Duration::hours(2),
        capacity: 8,
        deposit_amount: 500,
        visibility: Visibility::Public,
    }
}

fn benchmark_validation(c: &mut Criterion) {
    let valid = event_input();
    let mut invalid = event_input();
    invalid.title = "AB".to_string();
    invalid.capacity = 1;
    invalid.deposit_amount = 250;
    invalid.ends_at = invalid.starts_at - Duration::hours(1);

    let mut group = c.benchmark_group("validation");

    group.bench_function("create_event_valid", |b| {
        b.iter(|| black_box(&valid).validate())
    });

    group.bench_function("create_event_invalid", |b| {
        b.iter(|| black_box(&invalid).validate())
    });

    group.bench_function("password_strength", |b| {
        b.iter(|| validate_password(black_box("StrongPass123!")))
    });

    group.finish();
}

fn benchmark_error_normalization(c: &mut Criterion) {
    let nested: &[u8] = br#"{"error":{"code":"EVENT_FULL","message":"This event is full","details":{"capacity":10}}}"#;
    let plain: &[u8] = b"upstream connect error or disconnect/reset before headers";

    let mut group = c.benchmark_group("normalize_error");

    group.bench_function("nested_json", |b| {
        b.iter(|| normalize_error(black_box(409), black_box(nested)))
    });

    group.bench_function("plain_text", |b| {
        b.iter(|| normalize_error(black_box(503), black_box(plain)))
    });

    group.finish();
}

criterion_group!(benches, benchmark_validation, benchmark_error_normalization);
criterion_main!(benches);
