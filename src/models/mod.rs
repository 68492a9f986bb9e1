// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models shared by the services and the UI layers.

pub mod auth;
pub mod event;
pub mod location;
pub mod payment;
pub mod user;

pub use auth::{AuthSession, AuthTokens, LoginInput, RegisterInput, TokenMetadata};
pub use event::{
    CheckInResult, CheckInToken, CreateEventInput, Event, EventFilters, EventLocation,
    EventParticipant, EventStatus, Rsvp, RsvpStatus, SkillLevel, UpdateEventInput, Visibility,
};
pub use location::{Coordinates, Place};
pub use payment::{AuthorizeDepositRequest, PaymentAuthorization, PaymentStatus};
pub use user::{UpdateProfileInput, User};
