//! Device geolocation for emergency alerts.
//!
//! There is no GPS assumption: the default implementation resolves a rough
//! position from the device's public IP. Accuracy is city-level, which is
//! enough for a "last known location" line in an alert message.

use crate::error::{AssistantError, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

/// A resolved position plus a human-readable place name.
#[derive(Debug, Clone, PartialEq)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
    pub place: String,
}

impl Location {
    /// Shareable maps link for the alert body.
    pub fn maps_url(&self) -> String {
        format!(
            "https://maps.google.com/?q={},{}",
            self.latitude, self.longitude
        )
    }
}

/// Position resolution seam.
#[async_trait]
pub trait Geolocator: Send + Sync {
    async fn locate(&self) -> Result<Location>;
}

#[derive(Debug, Deserialize)]
struct IpApiResponse {
    status: String,
    #[serde(default)]
    lat: f64,
    #[serde(default)]
    lon: f64,
    #[serde(default)]
    city: String,
    #[serde(default)]
    country: String,
}

/// [`Geolocator`] backed by the ip-api.com JSON endpoint.
pub struct IpGeolocator {
    client: reqwest::Client,
    endpoint: String,
}

impl IpGeolocator {
    pub fn new(timeout: Duration) -> Result<Self> {
        Self::with_endpoint("http://ip-api.com/json", timeout)
    }

    pub fn with_endpoint(endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AssistantError::Geolocation(format!("client: {e}")))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }
}

#[async_trait]
impl Geolocator for IpGeolocator {
    async fn locate(&self) -> Result<Location> {
        let body: IpApiResponse = self
            .client
            .get(&self.endpoint)
            .send()
            .await
            .map_err(|e| AssistantError::Geolocation(format!("request: {e}")))?
            .json()
            .await
            .map_err(|e| AssistantError::Geolocation(format!("body: {e}")))?;

        if body.status != "success" {
            return Err(AssistantError::Geolocation(format!(
                "lookup returned status '{}'",
                body.status
            )));
        }

        Ok(Location {
            latitude: body.lat,
            longitude: body.lon,
            place: format!("{}, {}", body.city, body.country),
        })
    }
}
