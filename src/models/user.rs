//! User profile model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;
use validator::Validate;

/// User profile owned by the authenticated session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct User {
    pub id: String,
    pub email: String,
    pub display_name: String,
    pub home_city: Option<String>,
    /// Share of RSVPs the user actually showed up for (0..1)
    pub reliability_score: f64,
    pub level: u32,
    pub xp: u32,
    #[serde(default)]
    pub avatar_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Partial profile update. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct UpdateProfileInput {
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(custom(function = "crate::validation::auth::check_display_name"))]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(custom(function = "crate::validation::auth::check_home_city"))]
    pub home_city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(url(message = "Avatar must be a valid URL"))]
    pub avatar_url: Option<String>,
}

impl User {
    /// Apply a validated profile update in place.
    pub fn apply_update(&mut self, input: &UpdateProfileInput, now: DateTime<Utc>) {
        if let Some(name) = &input.display_name {
            self.display_name = name.trim().to_string();
        }
        if let Some(city) = &input.home_city {
            let city = city.trim();
            self.home_city = (!city.is_empty()).then(|| city.to_string());
        }
        if let Some(url) = &input.avatar_url {
            self.avatar_url = Some(url.clone());
        }
        self.updated_at = now;
    }
}
