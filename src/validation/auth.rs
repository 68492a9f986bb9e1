// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Account field rules: email, password strength, profile fields.

use super::to_result;
use serde::Serialize;
use validator::{ValidateEmail, ValidationError};

pub const PASSWORD_MIN_LENGTH: usize = 8;
pub const DISPLAY_NAME_MIN: usize = 2;
pub const DISPLAY_NAME_MAX: usize = 50;
pub const HOME_CITY_MAX: usize = 100;

pub fn validate_email(email: &str) -> Option<String> {
    let email = email.trim();
    if email.is_empty() {
        return Some("Email is required".to_string());
    }
    if !email.validate_email() {
        return Some("Please enter a valid email address".to_string());
    }
    None
}

/// Password check result with one feedback line per unmet criterion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordStrength {
    pub valid: bool,
    /// Number of criteria met (0..=5)
    pub score: u8,
    pub feedback: Vec<String>,
}

pub fn validate_password(password: &str) -> PasswordStrength {
    let checks = [
        (
            password.chars().count() >= PASSWORD_MIN_LENGTH,
            "Password must be at least 8 characters",
        ),
        (
            password.chars().any(|c| c.is_uppercase()),
            "Add an uppercase letter",
        ),
        (
            password.chars().any(|c| c.is_lowercase()),
            "Add a lowercase letter",
        ),
        (password.chars().any(|c| c.is_ascii_digit()), "Add a number"),
        (
            password
                .chars()
                .any(|c| !c.is_alphanumeric() && !c.is_whitespace()),
            "Add a special character",
        ),
    ];

    let feedback: Vec<String> = checks
        .iter()
        .filter(|(ok, _)| !ok)
        .map(|(_, msg)| msg.to_string())
        .collect();

    PasswordStrength {
        valid: feedback.is_empty(),
        score: (checks.len() - feedback.len()) as u8,
        feedback,
    }
}

pub fn validate_display_name(name: &str) -> Option<String> {
    let len = name.trim().chars().count();
    if len == 0 {
        return Some("Display name is required".to_string());
    }
    if !(DISPLAY_NAME_MIN..=DISPLAY_NAME_MAX).contains(&len) {
        return Some(format!(
            "Display name must be between {} and {} characters",
            DISPLAY_NAME_MIN, DISPLAY_NAME_MAX
        ));
    }
    None
}

pub fn validate_home_city(city: &str) -> Option<String> {
    if city.trim().chars().count() > HOME_CITY_MAX {
        return Some(format!(
            "Home city must be at most {} characters",
            HOME_CITY_MAX
        ));
    }
    None
}

// ─── Schema adapters ─────────────────────────────────────────

pub fn check_email(email: &str) -> Result<(), ValidationError> {
    to_result("email", validate_email(email))
}

pub fn check_password(password: &str) -> Result<(), ValidationError> {
    let strength = validate_password(password);
    to_result(
        "password",
        (!strength.valid).then(|| strength.feedback.join(". ")),
    )
}

pub fn check_display_name(name: &str) -> Result<(), ValidationError> {
    to_result("display_name", validate_display_name(name))
}

pub fn check_home_city(city: &str) -> Result<(), ValidationError> {
    to_result("home_city", validate_home_city(city))
}
