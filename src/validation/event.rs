// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Event field rules.

use super::to_result;
use crate::models::CreateEventInput;
use chrono::{DateTime, Duration, Utc};
use validator::ValidationError;

pub const TITLE_MIN: usize = 3;
pub const TITLE_MAX: usize = 100;
pub const DESCRIPTION_MAX: usize = 1000;
pub const CAPACITY_MIN: u32 = 2;
pub const CAPACITY_MAX: u32 = 100;
/// Deposits are fixed tiers in cents: none, $5, $10.
pub const ALLOWED_DEPOSITS: [u32; 3] = [0, 500, 1000];
pub const MAX_DURATION_HOURS: i64 = 12;

pub fn validate_event_title(title: &str) -> Option<String> {
    let len = title.trim().chars().count();
    if len == 0 {
        return Some("Title is required".to_string());
    }
    if len < TITLE_MIN {
        return Some(format!("Title must be at least {} characters", TITLE_MIN));
    }
    if len > TITLE_MAX {
        return Some(format!("Title must be at most {} characters", TITLE_MAX));
    }
    None
}

pub fn validate_event_description(description: &str) -> Option<String> {
    if description.chars().count() > DESCRIPTION_MAX {
        return Some(format!(
            "Description must be at most {} characters",
            DESCRIPTION_MAX
        ));
    }
    None
}

pub fn validate_capacity(capacity: u32) -> Option<String> {
    if !(CAPACITY_MIN..=CAPACITY_MAX).contains(&capacity) {
        return Some(format!(
            "Capacity must be between {} and {}",
            CAPACITY_MIN, CAPACITY_MAX
        ));
    }
    None
}

pub fn validate_deposit_amount(amount: u32) -> Option<String> {
    if !ALLOWED_DEPOSITS.contains(&amount) {
        return Some("Deposit must be $0, $5, or $10".to_string());
    }
    None
}

/// `now` is explicit so the rule stays a pure function.
pub fn validate_event_start(starts_at: DateTime<Utc>, now: DateTime<Utc>) -> Option<String> {
    if starts_at <= now {
        return Some("Event must start in the future".to_string());
    }
    None
}

pub fn validate_event_times(starts_at: DateTime<Utc>, ends_at: DateTime<Utc>) -> Option<String> {
    if ends_at <= starts_at {
        return Some("End time must be after start time".to_string());
    }
    if ends_at - starts_at > Duration::hours(MAX_DURATION_HOURS) {
        return Some(format!(
            "Event can last at most {} hours",
            MAX_DURATION_HOURS
        ));
    }
    None
}

pub fn validate_location(name: &str, latitude: f64, longitude: f64) -> Option<String> {
    if name.trim().is_empty() {
        return Some("Location name is required".to_string());
    }
    if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
        return Some("Location coordinates are out of range".to_string());
    }
    None
}

// ─── Schema adapters ─────────────────────────────────────────

pub fn check_title(title: &str) -> Result<(), ValidationError> {
    to_result("title", validate_event_title(title))
}

pub fn check_description(description: &str) -> Result<(), ValidationError> {
    to_result("description", validate_event_description(description))
}

// Numeric fields arrive by value from the derive.
pub fn check_capacity(capacity: u32) -> Result<(), ValidationError> {
    to_result("capacity", validate_capacity(capacity))
}

pub fn check_deposit(amount: u32) -> Result<(), ValidationError> {
    to_result("deposit_amount", validate_deposit_amount(amount))
}

pub fn check_start(starts_at: &DateTime<Utc>) -> Result<(), ValidationError> {
    to_result("starts_at", validate_event_start(*starts_at, Utc::now()))
}

pub fn check_create_event_times(input: &CreateEventInput) -> Result<(), ValidationError> {
    to_result(
        "event_times",
        validate_event_times(input.starts_at, input.ends_at),
    )
}
