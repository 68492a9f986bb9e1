// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Deposit authorization models.
//!
//! Deposits are card holds: authorized at RSVP time, released on check-in
//! or cancellation, captured when the participant no-shows.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PaymentStatus {
    Authorized,
    Captured,
    Released,
}

/// A deposit hold on a participant's card.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentAuthorization {
    pub id: String,
    pub event_id: String,
    pub user_id: String,
    /// Amount in cents
    pub amount: u32,
    pub status: PaymentStatus,
    pub created_at: DateTime<Utc>,
}

/// Payload for `POST payments/authorize`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizeDepositRequest {
    pub event_id: String,
    pub user_id: String,
    pub amount: u32,
    /// Token produced by the payment widget (e.g. `pm_...`)
    pub payment_method_id: String,
}
