// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Validation rules shared by every client platform.
//!
//! Field-level checks (`validate_*`) are pure functions that return `None`
//! when the value is acceptable and a user-facing message otherwise. The
//! `check_*` adapters wrap them for `#[derive(Validate)]` schemas, so a
//! form and a whole-object check always agree.

pub mod auth;
pub mod event;

pub use auth::{
    validate_display_name, validate_email, validate_home_city, validate_password,
    PasswordStrength,
};
pub use event::{
    validate_capacity, validate_deposit_amount, validate_event_description, validate_event_start,
    validate_event_times, validate_event_title, validate_location,
};

use std::collections::BTreeMap;
use validator::{ValidationError, ValidationErrors, ValidationErrorsKind};

/// Turn a field-level result into the shape `validator` expects.
pub(crate) fn to_result(code: &'static str, message: Option<String>) -> Result<(), ValidationError> {
    match message {
        None => Ok(()),
        Some(message) => {
            let mut error = ValidationError::new(code);
            error.message = Some(message.into());
            Err(error)
        }
    }
}

/// Flatten validation errors into `field -> messages`, using dotted paths
/// for nested structs (`location.latitude`).
pub fn collect_messages(errors: &ValidationErrors) -> BTreeMap<String, Vec<String>> {
    let mut out = BTreeMap::new();
    collect_into(errors, "", &mut out);
    out
}

fn collect_into(errors: &ValidationErrors, prefix: &str, out: &mut BTreeMap<String, Vec<String>>) {
    for (field, kind) in errors.errors() {
        let path = if prefix.is_empty() {
            field.to_string()
        } else {
            format!("{}.{}", prefix, field)
        };
        match kind {
            ValidationErrorsKind::Field(list) => {
                let messages = out.entry(path).or_default();
                for error in list {
                    messages.push(
                        error
                            .message
                            .as_ref()
                            .map(|m| m.to_string())
                            .unwrap_or_else(|| error.code.to_string()),
                    );
                }
            }
            ValidationErrorsKind::Struct(nested) => collect_into(nested, &path, out),
            ValidationErrorsKind::List(items) => {
                for (index, nested) in items {
                    collect_into(nested, &format!("{}[{}]", path, index), out);
                }
            }
        }
    }
}

/// First message of the first failing field, for single-line error banners.
pub fn first_message(errors: &ValidationErrors) -> Option<String> {
    collect_messages(errors)
        .into_values()
        .flatten()
        .next()
}
