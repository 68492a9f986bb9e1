// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Signed check-in codes shown as QR codes.
//!
//! Format: base64url of `event_id|user_id|issued_ms_hex|signature_hex`,
//! where the signature is HMAC-SHA256 over everything before it.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// How long a check-in code stays valid.
pub const CHECK_IN_TOKEN_TTL_HOURS: i64 = 24;

/// Tolerated clock skew for codes issued "in the future".
const MAX_CLOCK_SKEW_MINUTES: i64 = 5;

/// Decoded, verified check-in code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckInClaim {
    pub event_id: String,
    pub user_id: String,
    pub issued_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CheckInTokenError {
    #[error("Check-in code is malformed")]
    Malformed,
    #[error("Check-in code signature is invalid")]
    BadSignature,
    #[error("Check-in code has expired")]
    Expired,
    #[error("Check-in code is for a different event")]
    WrongEvent,
}

fn signature_hex(payload: &str, secret: &[u8]) -> Option<String> {
    let mut mac = HmacSha256::new_from_slice(secret).ok()?;
    mac.update(payload.as_bytes());
    Some(hex::encode(mac.finalize().into_bytes()))
}

/// Sign a check-in code for `user_id` at `event_id`.
pub fn sign_check_in_token(
    event_id: &str,
    user_id: &str,
    issued_at: DateTime<Utc>,
    secret: &[u8],
) -> Option<String> {
    let payload = format!(
        "{}|{}|{:x}",
        event_id,
        user_id,
        issued_at.timestamp_millis()
    );
    let signature = signature_hex(&payload, secret)?;
    Some(URL_SAFE_NO_PAD.encode(format!("{}|{}", payload, signature)))
}

/// Verify a scanned code against the event being checked in to.
pub fn verify_check_in_token(
    token: &str,
    expected_event_id: &str,
    now: DateTime<Utc>,
    secret: &[u8],
) -> Result<CheckInClaim, CheckInTokenError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(token.trim())
        .map_err(|_| CheckInTokenError::Malformed)?;
    let decoded = String::from_utf8(bytes).map_err(|_| CheckInTokenError::Malformed)?;

    // Signature is last; ids never contain '|'.
    let (payload, provided) = decoded
        .rsplit_once('|')
        .ok_or(CheckInTokenError::Malformed)?;
    let parts: Vec<&str> = payload.split('|').collect();
    let [event_id, user_id, issued_hex] = parts[..] else {
        return Err(CheckInTokenError::Malformed);
    };

    let expected = signature_hex(payload, secret).ok_or(CheckInTokenError::BadSignature)?;
    if !bool::from(expected.as_bytes().ct_eq(provided.as_bytes())) {
        tracing::warn!(event_id, "Check-in code signature mismatch");
        return Err(CheckInTokenError::BadSignature);
    }

    let issued_ms = i64::from_str_radix(issued_hex, 16).map_err(|_| CheckInTokenError::Malformed)?;
    let issued_at =
        DateTime::<Utc>::from_timestamp_millis(issued_ms).ok_or(CheckInTokenError::Malformed)?;

    if issued_at > now + Duration::minutes(MAX_CLOCK_SKEW_MINUTES)
        || now - issued_at >= Duration::hours(CHECK_IN_TOKEN_TTL_HOURS)
    {
        return Err(CheckInTokenError::Expired);
    }
    if event_id != expected_event_id {
        return Err(CheckInTokenError::WrongEvent);
    }

    Ok(CheckInClaim {
        event_id: event_id.to_string(),
        user_id: user_id.to_string(),
        issued_at,
    })
}
