//! Geocoding provider clients
//!
//! `HttpGeocoder` talks to a Mapbox-compatible forward geocoding endpoint:
//! `GET {base}/geocoding/v5/mapbox.places/{query}.json?access_token=..&limit=1`.

use super::{Coordinates, GeocodeError, GeocodeHit, Geocoder};
use alumni_common::config::GeocodingConfig;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use url::Url;

const USER_AGENT: &str = concat!("alumni-network/", env!("CARGO_PKG_VERSION"));

/// Enforces a fixed minimum interval between consecutive requests
pub struct RateLimiter {
    last_request: Mutex<Option<Instant>>,
    min_interval: Duration,
}

impl RateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            last_request: Mutex::new(None),
            min_interval,
        }
    }

    /// Wait if necessary to comply with the interval
    pub async fn wait(&self) {
        let mut last = self.last_request.lock().await;

        if let Some(last_time) = *last {
            let elapsed = last_time.elapsed();
            if elapsed < self.min_interval {
                let wait_time = self.min_interval - elapsed;
                tracing::debug!("Rate limiting: waiting {:?}", wait_time);
                tokio::time::sleep(wait_time).await;
            }
        }

        *last = Some(Instant::now());
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }
}

#[derive(Debug, Deserialize)]
struct FeatureCollection {
    #[serde(default)]
    features: Vec<Feature>,
}

#[derive(Debug, Deserialize)]
struct Feature {
    /// `[longitude, latitude]`
    center: Vec<f64>,
    place_name: Option<String>,
}

/// HTTP geocoding client
pub struct HttpGeocoder {
    http_client: reqwest::Client,
    base_url: Url,
    access_token: String,
    rate_limiter: RateLimiter,
}

impl HttpGeocoder {
    pub fn new(config: &GeocodingConfig, access_token: String) -> Result<Self, GeocodeError> {
        let base_url = Url::parse(&config.provider_url)
            .map_err(|e| GeocodeError::Parse(format!("Invalid provider URL: {}", e)))?;

        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| GeocodeError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url,
            access_token,
            rate_limiter: RateLimiter::new(Duration::from_millis(config.min_interval_ms)),
        })
    }

    /// Request URL for one query (the query is a single percent-encoded path segment)
    pub fn lookup_url(&self, query: &str) -> Result<Url, GeocodeError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| GeocodeError::Parse("Provider URL cannot be a base".to_string()))?
            .pop_if_empty()
            .extend(["geocoding", "v5", "mapbox.places"])
            .push(&format!("{}.json", query));
        url.query_pairs_mut()
            .append_pair("access_token", &self.access_token)
            .append_pair("limit", "1")
            .append_pair("autocomplete", "false");
        Ok(url)
    }
}

#[async_trait]
impl Geocoder for HttpGeocoder {
    async fn lookup(&self, query: &str) -> Result<Option<GeocodeHit>, GeocodeError> {
        self.rate_limiter.wait().await;

        let url = self.lookup_url(query)?;
        tracing::debug!(query = %query, "Querying geocoding provider");

        let response = self
            .http_client
            .get(url)
            .send()
            .await
            .map_err(|e| GeocodeError::Network(e.to_string()))?;

        let status = response.status();
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Err(GeocodeError::Unauthorized)
            }
            StatusCode::TOO_MANY_REQUESTS => return Err(GeocodeError::RateLimited),
            s if !s.is_success() => {
                let body = response.text().await.unwrap_or_default();
                return Err(GeocodeError::Api(s.as_u16(), body));
            }
            _ => {}
        }

        let collection: FeatureCollection = response
            .json()
            .await
            .map_err(|e| GeocodeError::Parse(e.to_string()))?;

        let Some(feature) = collection.features.into_iter().next() else {
            return Ok(None);
        };

        let coordinates = match feature.center.as_slice() {
            [longitude, latitude, ..] => Coordinates {
                latitude: *latitude,
                longitude: *longitude,
            },
            _ => return Err(GeocodeError::Parse("Feature center missing".to_string())),
        };
        if !coordinates.is_valid() {
            return Err(GeocodeError::Parse(format!(
                "Coordinates out of range: {:?}",
                coordinates
            )));
        }

        Ok(Some(GeocodeHit {
            coordinates,
            place_name: feature.place_name,
        }))
    }
}

/// Stand-in used when geocoding is turned off or has no access token
pub struct DisabledGeocoder;

#[async_trait]
impl Geocoder for DisabledGeocoder {
    async fn lookup(&self, _query: &str) -> Result<Option<GeocodeHit>, GeocodeError> {
        Err(GeocodeError::Disabled)
    }
}
