// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! HTTP access to the Huddle API.
//!
//! [`ApiTransport`] owns the reqwest client, base URL and retry policy and
//! sends unauthenticated requests. [`HttpClient`] layers the bearer token
//! and the 401 refresh path on top of it.

mod client;
mod refresher;
mod response;
mod transport;

pub use client::HttpClient;
pub use refresher::HttpRefresher;
pub use response::normalize_error;
pub use transport::{ApiTransport, RetryPolicy, RETRYABLE_STATUSES};
