// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Event, RSVP and check-in models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;
use validator::Validate;

/// Event lifecycle: `upcoming → ongoing → completed`, or cancelled before completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub enum EventStatus {
    Upcoming,
    Ongoing,
    Completed,
    Cancelled,
}

impl EventStatus {
    /// Whether the lifecycle allows moving from `self` to `next`.
    pub fn can_transition_to(self, next: EventStatus) -> bool {
        use EventStatus::*;
        matches!(
            (self, next),
            (Upcoming, Ongoing) | (Ongoing, Completed) | (Upcoming, Cancelled) | (Ongoing, Cancelled)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, EventStatus::Completed | EventStatus::Cancelled)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub enum Visibility {
    #[default]
    Public,
    Private,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub enum SkillLevel {
    Beginner,
    Intermediate,
    Advanced,
    #[default]
    AllLevels,
}

/// Where an event takes place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct EventLocation {
    #[validate(length(min = 1, max = 200, message = "Location name is required"))]
    pub name: String,
    #[serde(default)]
    pub address: Option<String>,
    #[validate(range(min = -90.0, max = 90.0, message = "Latitude must be between -90 and 90"))]
    pub latitude: f64,
    #[validate(range(
        min = -180.0,
        max = 180.0,
        message = "Longitude must be between -180 and 180"
    ))]
    pub longitude: f64,
}

/// Event aggregate as returned by the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct Event {
    pub id: String,
    pub host_id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub sport: String,
    #[serde(default)]
    pub skill_level: SkillLevel,
    pub location: EventLocation,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub capacity: u32,
    /// Deposit in cents (0, 500 or 1000)
    pub deposit_amount: u32,
    pub visibility: Visibility,
    pub status: EventStatus,
    pub participant_count: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Event {
    pub fn requires_deposit(&self) -> bool {
        self.deposit_amount > 0
    }

    pub fn is_full(&self) -> bool {
        self.participant_count >= self.capacity
    }
}

/// Payload for `POST events`.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
#[validate(schema(function = "crate::validation::event::check_create_event_times"))]
pub struct CreateEventInput {
    #[validate(custom(function = "crate::validation::event::check_title"))]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(custom(function = "crate::validation::event::check_description"))]
    pub description: Option<String>,
    #[validate(length(min = 1, max = 50, message = "Sport is required"))]
    pub sport: String,
    #[serde(default)]
    pub skill_level: SkillLevel,
    #[validate(nested)]
    pub location: EventLocation,
    #[validate(custom(function = "crate::validation::event::check_start"))]
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    #[validate(custom(function = "crate::validation::event::check_capacity"))]
    pub capacity: u32,
    #[validate(custom(function = "crate::validation::event::check_deposit"))]
    pub deposit_amount: u32,
    #[serde(default)]
    pub visibility: Visibility,
}

/// Payload for `PATCH events/{id}`. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateEventInput {
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(custom(function = "crate::validation::event::check_title"))]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(custom(function = "crate::validation::event::check_description"))]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skill_level: Option<SkillLevel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(nested)]
    pub location: Option<EventLocation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(custom(function = "crate::validation::event::check_start"))]
    pub starts_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ends_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(custom(function = "crate::validation::event::check_capacity"))]
    pub capacity: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visibility: Option<Visibility>,
}

/// Query for browsing/searching events.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventFilters {
    /// Case-insensitive text match on title and description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sport: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<EventStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub near_latitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub near_longitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub radius_km: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub starts_after: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub enum RsvpStatus {
    Going,
    Waitlisted,
    Cancelled,
    CheckedIn,
}

/// A user's reservation for an event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rsvp {
    pub id: String,
    pub event_id: String,
    pub user_id: String,
    pub status: RsvpStatus,
    /// Deposit hold backing this RSVP, if the event requires one
    #[serde(default)]
    pub payment_authorization_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Participant row shown on the event roster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventParticipant {
    pub user_id: String,
    pub display_name: String,
    pub rsvp_status: RsvpStatus,
    #[serde(default)]
    pub checked_in_at: Option<DateTime<Utc>>,
}

/// Signed token rendered as a QR code by the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckInToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Outcome of scanning a check-in QR code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct CheckInResult {
    pub success: bool,
    pub deposit_refunded: bool,
    /// Refunded amount in cents
    pub refund_amount: u32,
    pub checked_in_at: DateTime<Utc>,
}
