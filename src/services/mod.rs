// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - API access behind async traits.
//!
//! Every service has an `Http*` implementation talking to the Huddle API and
//! a `Mock*` implementation that keeps state in memory, for offline
//! development and tests.

pub mod auth;
pub mod check_in;
pub mod event;
pub mod location;
pub mod payment;
pub mod user;

pub use auth::{AuthService, HttpAuthService, MockAuthService};
pub use event::{EventService, HttpEventService, MockEventService};
pub use location::{HttpLocationService, LocationService, MockLocationService};
pub use payment::{HttpPaymentService, MockPaymentService, PaymentService};
pub use user::{HttpUserService, MockUserService, UserService};
