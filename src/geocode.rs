// src/geocode.rs
//! Address to `lat,lng` resolution.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{info, warn};

/// Fallback location used whenever an address cannot be resolved.
pub const UNKNOWN_LOCATION: &str = "0,0";

pub const DEFAULT_GEOCODE_ENDPOINT: &str = "https://maps.googleapis.com/maps/api/geocode/json";

#[async_trait]
pub trait Geocoder: Send + Sync {
    /// Resolve an address to `"<lat>,<lng>"`, or `"0,0"` on failure.
    async fn geocode(&self, address: &str) -> String;
}

#[derive(Debug, Deserialize)]
struct GeocodeResponse {
    status: String,
    #[serde(default)]
    results: Vec<GeocodeResult>,
}

#[derive(Debug, Deserialize)]
struct GeocodeResult {
    geometry: Geometry,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    location: LatLng,
}

#[derive(Debug, Deserialize)]
struct LatLng {
    lat: f64,
    lng: f64,
}

impl GeocodeResponse {
    fn best_location(&self) -> Option<String> {
        if self.status != "OK" {
            return None;
        }
        self.results
            .first()
            .map(|r| format!("{},{}", r.geometry.location.lat, r.geometry.location.lng))
    }
}

pub struct HttpGeocoder {
    client: Client,
    endpoint: String,
    api_key: String,
    region: Option<String>,
}

impl HttpGeocoder {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            endpoint: DEFAULT_GEOCODE_ENDPOINT.to_string(),
            api_key: api_key.into(),
            region: None,
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Bias results towards a region (ccTLD code such as `es`).
    pub fn with_region(mut self, region: Option<String>) -> Self {
        self.region = region;
        self
    }

    async fn lookup(&self, address: &str) -> Result<GeocodeResponse, reqwest::Error> {
        let mut params = vec![("address", address), ("key", self.api_key.as_str())];
        if let Some(region) = self.region.as_deref() {
            params.push(("region", region));
        }
        self.client
            .get(&self.endpoint)
            .query(&params)
            .send()
            .await?
            .error_for_status()?
            .json::<GeocodeResponse>()
            .await
    }
}

#[async_trait]
impl Geocoder for HttpGeocoder {
    async fn geocode(&self, address: &str) -> String {
        if address.trim().is_empty() {
            return UNKNOWN_LOCATION.to_string();
        }
        info!("Geocoding: {}", address);
        match self.lookup(address).await {
            Ok(response) => match response.best_location() {
                Some(location) => {
                    info!("Results: {}", location);
                    location
                }
                None => {
                    warn!("Error geocoding: {} ({})", address, response.status);
                    UNKNOWN_LOCATION.to_string()
                }
            },
            Err(e) => {
                warn!("Error geocoding: {} ({})", address, e);
                UNKNOWN_LOCATION.to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_best_location_takes_first_result() {
        let response: GeocodeResponse = serde_json::from_str(
            r#"{"status":"OK","results":[
                {"geometry":{"location":{"lat":40.5,"lng":-3.25}}},
                {"geometry":{"location":{"lat":1.0,"lng":1.0}}}
            ]}"#,
        )
        .unwrap();
        assert_eq!(response.best_location().as_deref(), Some("40.5,-3.25"));
    }

    #[test]
    fn test_zero_results_has_no_location() {
        let response: GeocodeResponse =
            serde_json::from_str(r#"{"status":"ZERO_RESULTS","results":[]}"#).unwrap();
        assert_eq!(response.best_location(), None);
    }

    #[tokio::test]
    async fn test_blank_address_skips_lookup() {
        let geocoder = HttpGeocoder::new("key").with_endpoint("http://127.0.0.1:9/unused");
        assert_eq!(geocoder.geocode("   ").await, UNKNOWN_LOCATION);
    }
}
