//! HTTP geocoding client against a Google-style geocoding endpoint (§6):
//! `{status, results[].geometry.location.{lat,lng}, results[].geometry.location_type}`.
//! Retry ladder mirrors `scrape::Fetcher`; caching and the street-omission
//! fallback follow `geocodify_geocoder.py`'s `GeocodifyClient.geocode`.

use crate::core::error::{PipelineError, Result};
use crate::geocode::{build_address, is_in_germany, AddressParts, GeocodeCache, Precision};
use async_trait::async_trait;
use backoff::ExponentialBackoffBuilder;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone, Default)]
pub struct GeocodeRequest {
    pub street: Option<String>,
    pub house_number: Option<String>,
    pub district: Option<String>,
    pub city: Option<String>,
    pub state: String,
    pub location_hint: Option<String>,
    pub cross_street: Option<String>,
}

#[derive(Debug, Clone)]
pub struct GeocodeResult {
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub precision: Precision,
}

#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn geocode(&self, request: GeocodeRequest) -> Result<GeocodeResult>;
}

#[derive(Debug, Deserialize)]
struct GoogleGeocodeResponse {
    status: String,
    #[serde(default)]
    results: Vec<GoogleResult>,
}

#[derive(Debug, Deserialize)]
struct GoogleResult {
    geometry: GoogleGeometry,
}

#[derive(Debug, Deserialize)]
struct GoogleGeometry {
    location: GoogleLatLng,
    #[serde(default)]
    location_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GoogleLatLng {
    lat: f64,
    lng: f64,
}

pub struct GeocodeClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    cache: Arc<GeocodeCache>,
}

impl GeocodeClient {
    pub fn new(base_url: String, api_key: String, cache: Arc<GeocodeCache>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| PipelineError::PermanentRemote(e.to_string()))?;
        Ok(GeocodeClient { http, base_url, api_key, cache })
    }

    async fn query_provider(&self, address: &str) -> Result<Option<(f64, f64, Option<String>)>> {
        let backoff = ExponentialBackoffBuilder::new()
            .with_initial_interval(Duration::from_millis(500))
            .with_max_interval(Duration::from_secs(20))
            .with_max_elapsed_time(Some(Duration::from_secs(60)))
            .build();

        let outcome = backoff::future::retry(backoff, || async {
            let response = self
                .http
                .get(&self.base_url)
                .query(&[("address", address.as_str()), ("key", self.api_key.as_str())])
                .send()
                .await
                .map_err(|e| {
                    if e.is_timeout() || e.is_connect() {
                        backoff::Error::transient(PipelineError::Transient(e.to_string()))
                    } else {
                        backoff::Error::permanent(PipelineError::PermanentRemote(e.to_string()))
                    }
                })?;

            let status = response.status();
            if status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                return Err(backoff::Error::transient(PipelineError::Transient(format!(
                    "geocoder returned {status}"
                ))));
            }
            if !status.is_success() {
                return Err(backoff::Error::permanent(PipelineError::PermanentRemote(format!(
                    "geocoder returned {status}"
                ))));
            }

            let body: GoogleGeocodeResponse = response
                .json()
                .await
                .map_err(|e| backoff::Error::permanent(PipelineError::Parse(e.to_string())))?;

            Ok(body)
        })
        .await?;

        if outcome.status != "OK" {
            debug!(status = %outcome.status, address, "geocoder returned no result");
            return Ok(None);
        }
        match outcome.results.into_iter().next() {
            Some(result) => Ok(Some((
                result.geometry.location.lat,
                result.geometry.location.lng,
                result.geometry.location_type,
            ))),
            None => Ok(None),
        }
    }

    async fn resolve_once(&self, address: &str) -> Result<GeocodeResult> {
        if let Some(cached) = self.cache.get(address) {
            // Re-derive the precision the original lookup stored (e.g.
            // `outside_germany`) rather than collapsing every hit to a
            // generic "cached" label — callers (notably `geocode`'s
            // street-omission guard) need to know a cached result was
            // outside Germany so they still retry the fallback address.
            let precision = cached
                .precision
                .as_deref()
                .and_then(Precision::from_str)
                .unwrap_or(if cached.is_hit() { Precision::Approximate } else { Precision::None });
            return Ok(GeocodeResult { lat: cached.lat, lon: cached.lon, precision });
        }

        let resolved = self.query_provider(address).await?;
        let result = match resolved {
            Some((lat, lon, location_type)) if is_in_germany(lat, lon) => {
                let precision = location_type
                    .as_deref()
                    .map(Precision::from_provider_location_type)
                    .unwrap_or(Precision::Approximate);
                self.cache.insert(
                    address.to_string(),
                    crate::geocode::cache::CachedGeocode {
                        lat: Some(lat),
                        lon: Some(lon),
                        precision: Some(precision.as_str().to_string()),
                    },
                );
                GeocodeResult { lat: Some(lat), lon: Some(lon), precision }
            }
            Some((lat, lon, _)) => {
                warn!(address, lat, lon, "geocoder returned coordinates outside Germany");
                self.cache.insert(
                    address.to_string(),
                    crate::geocode::cache::CachedGeocode {
                        lat: Some(lat),
                        lon: Some(lon),
                        precision: Some(Precision::OutsideGermany.as_str().to_string()),
                    },
                );
                GeocodeResult { lat: Some(lat), lon: Some(lon), precision: Precision::OutsideGermany }
            }
            None => {
                self.cache.insert(address.to_string(), crate::geocode::cache::CachedGeocode::default());
                GeocodeResult { lat: None, lon: None, precision: Precision::None }
            }
        };
        Ok(result)
    }
}

#[async_trait]
impl Geocoder for GeocodeClient {
    /// Street-level lookup first; if it yields nothing or lands outside
    /// Germany, retries with street omitted, per §4.4's fallback rule.
    async fn geocode(&self, request: GeocodeRequest) -> Result<GeocodeResult> {
        let parts = AddressParts {
            street: request.street.as_deref(),
            house_number: request.house_number.as_deref(),
            district: request.district.as_deref(),
            city: request.city.as_deref(),
            state: &request.state,
            location_hint: request.location_hint.as_deref(),
            cross_street: request.cross_street.as_deref(),
        };

        let Some(address) = build_address(&parts, false) else {
            return Ok(GeocodeResult { lat: None, lon: None, precision: Precision::None });
        };

        let first = self.resolve_once(&address).await?;
        if first.lat.is_some() && !matches!(first.precision, Precision::OutsideGermany) {
            return Ok(first);
        }
        if parts.street.is_none() {
            return Ok(first);
        }

        let Some(fallback_address) = build_address(&parts, true) else {
            return Ok(first);
        };
        let fallback = self.resolve_once(&fallback_address).await?;
        Ok(fallback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn precision_maps_google_location_types() {
        assert_eq!(Precision::from_provider_location_type("ROOFTOP").as_str(), "rooftop");
        assert_eq!(Precision::from_provider_location_type("RANGE_INTERPOLATED").as_str(), "range");
        assert_eq!(Precision::from_provider_location_type("GARBAGE").as_str(), "approximate");
    }
}
