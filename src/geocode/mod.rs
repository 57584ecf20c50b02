//
// Copyright (c) 2020-2022 science+computing ag and other contributors
//
// This program and the accompanying materials are made
// available under the terms of the Eclipse Public License 2.0
// which is available at https://www.eclipse.org/legal/epl-2.0/
//
// SPDX-License-Identifier: EPL-2.0
//

use std::time::Duration;

use anyhow::Context;
use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;

use crate::config::GeocodingConfig;
use crate::endpoint::ValidationError;

pub type Coordinates = (f64, f64);

/// Resolves a free-text location ("San Francisco, CA, USA") to coordinates.
///
/// `Ok(None)` means the service answered but knows no such place.
#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn geocode(&self, location: &str) -> Result<Option<Coordinates>, ValidationError>;
}

pub struct HttpGeocoder {
    client: reqwest::Client,
    base_url: String,
}

impl HttpGeocoder {
    pub fn new(config: &GeocodingConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            // nominatim rejects requests without an identifying agent
            .user_agent(concat!("veridock/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Building HTTP client for geocoding")?;

        Ok(HttpGeocoder {
            client,
            base_url: config.base_url().trim_end_matches('/').to_string(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct Place {
    lat: String,
    lon: String,
}

#[async_trait]
impl Geocoder for HttpGeocoder {
    async fn geocode(&self, location: &str) -> Result<Option<Coordinates>, ValidationError> {
        let url = format!("{}/search", self.base_url);
        let places: Vec<Place> = self
            .client
            .get(&url)
            .query(&[("q", location), ("format", "json"), ("limit", "1")])
            .send()
            .await
            .map_err(|e| ValidationError::dependency(format!("Querying geocoder for {:?}: {}", location, e)))?
            .error_for_status()
            .map_err(|e| ValidationError::dependency(format!("Geocoder rejected lookup of {:?}: {}", location, e)))?
            .json()
            .await
            .map_err(|e| ValidationError::dependency(format!("Reading geocoder response for {:?}: {}", location, e)))?;

        match places.first() {
            None => Ok(None),
            Some(place) => {
                let latitude = place.lat.parse::<f64>().map_err(|e| {
                    ValidationError::dependency(format!("Geocoder returned unparseable latitude {:?}: {}", place.lat, e))
                })?;
                let longitude = place.lon.parse::<f64>().map_err(|e| {
                    ValidationError::dependency(format!("Geocoder returned unparseable longitude {:?}: {}", place.lon, e))
                })?;
                Ok(Some((latitude, longitude)))
            }
        }
    }
}
