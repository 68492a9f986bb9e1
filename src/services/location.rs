// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Place search.

use crate::error::{AppError, Result};
use crate::http::HttpClient;
use crate::models::{Coordinates, Place};
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;

#[async_trait]
pub trait LocationService: Send + Sync {
    async fn search_places(&self, query: &str) -> Result<Vec<Place>>;
    /// Places within `radius_km`, nearest first.
    async fn nearby(&self, center: Coordinates, radius_km: f64) -> Result<Vec<Place>>;
}

pub struct HttpLocationService {
    client: Arc<HttpClient>,
}

impl HttpLocationService {
    pub fn new(client: Arc<HttpClient>) -> Self {
        Self { client }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct NearbyQuery {
    latitude: f64,
    longitude: f64,
    radius_km: f64,
}

#[async_trait]
impl LocationService for HttpLocationService {
    async fn search_places(&self, query: &str) -> Result<Vec<Place>> {
        self.client
            .get_query("locations/search", &[("q", query)])
            .await
    }

    async fn nearby(&self, center: Coordinates, radius_km: f64) -> Result<Vec<Place>> {
        let query = NearbyQuery {
            latitude: center.latitude,
            longitude: center.longitude,
            radius_km,
        };
        self.client.get_query("locations/nearby", &query).await
    }
}

/// Fixed set of Bay Area courts and fields.
pub struct MockLocationService {
    places: Vec<Place>,
}

impl Default for MockLocationService {
    fn default() -> Self {
        Self::new()
    }
}

impl MockLocationService {
    pub fn new() -> Self {
        let place = |id: &str, name: &str, address: &str, lat: f64, lng: f64| Place {
            id: id.to_string(),
            name: name.to_string(),
            address: Some(address.to_string()),
            coordinates: Coordinates::new(lat, lng),
        };
        Self {
            places: vec![
                place(
                    "place_dolores",
                    "Dolores Park Tennis Courts",
                    "Dolores St & 18th St, San Francisco, CA",
                    37.7596,
                    -122.4269,
                ),
                place(
                    "place_mission_rec",
                    "Mission Playground",
                    "2450 Harrison St, San Francisco, CA",
                    37.7590,
                    -122.4128,
                ),
                place(
                    "place_lake_merritt",
                    "Lake Merritt Pickleball",
                    "666 Bellevue Ave, Oakland, CA",
                    37.8087,
                    -122.2560,
                ),
                place(
                    "place_cal_fields",
                    "Clark Kerr Fields",
                    "2601 Warring St, Berkeley, CA",
                    37.8636,
                    -122.2486,
                ),
                place(
                    "place_cuesta",
                    "Cuesta Park",
                    "615 Cuesta Dr, Mountain View, CA",
                    37.3714,
                    -122.0800,
                ),
            ],
        }
    }
}

#[async_trait]
impl LocationService for MockLocationService {
    async fn search_places(&self, query: &str) -> Result<Vec<Place>> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return Ok(Vec::new());
        }
        Ok(self
            .places
            .iter()
            .filter(|p| {
                p.name.to_lowercase().contains(&needle)
                    || p
                        .address
                        .as_deref()
                        .is_some_and(|a| a.to_lowercase().contains(&needle))
            })
            .cloned()
            .collect())
    }

    async fn nearby(&self, center: Coordinates, radius_km: f64) -> Result<Vec<Place>> {
        if radius_km.is_nan() || radius_km <= 0.0 {
            return Err(AppError::field("radiusKm", "Radius must be positive"));
        }
        let mut found: Vec<(f64, &Place)> = self
            .places
            .iter()
            .map(|p| (center.distance_km(&p.coordinates), p))
            .filter(|(distance, _)| *distance <= radius_km)
            .collect();
        found.sort_by(|a, b| a.0.total_cmp(&b.0));
        Ok(found.into_iter().map(|(_, p)| p.clone()).collect())
    }
}
