//! Geocoding with fallback attempts
//!
//! A profile address is turned into an ordered list of search strings, from
//! most to least specific. Each string is sent to the geocoding provider in
//! turn and the first non-empty answer wins:
//!
//! 1. `city, state, country` (parts that are present)
//! 2. `city, country`
//! 3. `city, state` plus a synthetic `USA` when the country is missing and
//!    the state is a US state
//! 4. `city`
//!
//! The provider client enforces a fixed delay between requests, so the
//! fallback loop itself never sleeps. The same routine serves the geocode
//! API route, the admin re-geocoding job and the backfill binary.

mod client;

pub use client::{DisabledGeocoder, HttpGeocoder, RateLimiter};

use alumni_common::db::AlumniProfile;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Country appended to US addresses that omit it
pub const SYNTHETIC_US_COUNTRY: &str = "USA";

/// Geocoding errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeocodeError {
    #[error("Address has no city to geocode")]
    NoCandidates,

    #[error("No result for any of {attempts} candidate queries")]
    NotFound { attempts: usize },

    #[error("Geocoding is disabled")]
    Disabled,

    #[error("Geocoding provider rejected the access token")]
    Unauthorized,

    #[error("Geocoding provider rate limit exceeded")]
    RateLimited,

    #[error("Network error: {0}")]
    Network(String),

    #[error("Provider error {0}: {1}")]
    Api(u16, String),

    #[error("Parse error: {0}")]
    Parse(String),
}

impl GeocodeError {
    /// Errors that would repeat identically for every remaining candidate
    pub fn aborts_fallback(&self) -> bool {
        matches!(self, GeocodeError::Unauthorized | GeocodeError::Disabled)
    }
}

/// Address fields used to build candidate queries
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressParts {
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
}

impl AddressParts {
    pub fn new(city: Option<&str>, state: Option<&str>, country: Option<&str>) -> Self {
        Self {
            city: city.map(str::to_string),
            state: state.map(str::to_string),
            country: country.map(str::to_string),
        }
    }

    pub fn from_profile(profile: &AlumniProfile) -> Self {
        Self {
            city: profile.city.clone(),
            state: profile.state.clone(),
            country: profile.country.clone(),
        }
    }

    /// Same address after trimming and ignoring case
    pub fn same_as(&self, other: &AddressParts) -> bool {
        fn norm(v: &Option<String>) -> String {
            v.as_deref().unwrap_or("").trim().to_lowercase()
        }
        norm(&self.city) == norm(&other.city)
            && norm(&self.state) == norm(&other.state)
            && norm(&self.country) == norm(&other.country)
    }
}

/// WGS84 coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

/// One provider answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeocodeHit {
    pub coordinates: Coordinates,
    pub place_name: Option<String>,
}

/// Successful fallback result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeocodeMatch {
    pub coordinates: Coordinates,
    pub place_name: Option<String>,
    /// Candidate query that produced the hit
    pub query: String,
    /// 1-based position of that query in the candidate list
    pub attempt: usize,
}

/// Forward geocoding provider
#[async_trait]
pub trait Geocoder: Send + Sync {
    /// Look up one free-text query; `Ok(None)` when the provider has no result
    async fn lookup(&self, query: &str) -> Result<Option<GeocodeHit>, GeocodeError>;
}

const US_STATES: &[(&str, &str)] = &[
    ("AL", "Alabama"),
    ("AK", "Alaska"),
    ("AZ", "Arizona"),
    ("AR", "Arkansas"),
    ("CA", "California"),
    ("CO", "Colorado"),
    ("CT", "Connecticut"),
    ("DE", "Delaware"),
    ("DC", "District of Columbia"),
    ("FL", "Florida"),
    ("GA", "Georgia"),
    ("HI", "Hawaii"),
    ("ID", "Idaho"),
    ("IL", "Illinois"),
    ("IN", "Indiana"),
    ("IA", "Iowa"),
    ("KS", "Kansas"),
    ("KY", "Kentucky"),
    ("LA", "Louisiana"),
    ("ME", "Maine"),
    ("MD", "Maryland"),
    ("MA", "Massachusetts"),
    ("MI", "Michigan"),
    ("MN", "Minnesota"),
    ("MS", "Mississippi"),
    ("MO", "Missouri"),
    ("MT", "Montana"),
    ("NE", "Nebraska"),
    ("NV", "Nevada"),
    ("NH", "New Hampshire"),
    ("NJ", "New Jersey"),
    ("NM", "New Mexico"),
    ("NY", "New York"),
    ("NC", "North Carolina"),
    ("ND", "North Dakota"),
    ("OH", "Ohio"),
    ("OK", "Oklahoma"),
    ("OR", "Oregon"),
    ("PA", "Pennsylvania"),
    ("PR", "Puerto Rico"),
    ("RI", "Rhode Island"),
    ("SC", "South Carolina"),
    ("SD", "South Dakota"),
    ("TN", "Tennessee"),
    ("TX", "Texas"),
    ("UT", "Utah"),
    ("VT", "Vermont"),
    ("VA", "Virginia"),
    ("WA", "Washington"),
    ("WV", "West Virginia"),
    ("WI", "Wisconsin"),
    ("WY", "Wyoming"),
];

/// US state name or two-letter code, case-insensitive
pub fn is_us_state(value: &str) -> bool {
    let value = value.trim().replace('.', "");
    let value = value.as_str();
    US_STATES
        .iter()
        .any(|(code, name)| code.eq_ignore_ascii_case(value) || name.eq_ignore_ascii_case(value))
}

fn clean(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Build the ordered, de-duplicated candidate queries for an address
///
/// An address without a city yields no candidates.
pub fn candidate_queries(address: &AddressParts) -> Vec<String> {
    let Some(city) = clean(&address.city) else {
        return Vec::new();
    };
    let state = clean(&address.state);
    let country = clean(&address.country);

    let join = |parts: &[Option<&str>]| parts.iter().flatten().copied().collect::<Vec<_>>().join(", ");

    let mut tiers = Vec::with_capacity(4);
    tiers.push(join(&[Some(city), state, country]));
    if country.is_some() {
        tiers.push(join(&[Some(city), country]));
    }
    if let Some(state) = state {
        let synthetic = match country {
            None if is_us_state(state) => Some(SYNTHETIC_US_COUNTRY),
            _ => None,
        };
        tiers.push(join(&[Some(city), Some(state), synthetic]));
    }
    tiers.push(city.to_string());

    let mut candidates: Vec<String> = Vec::with_capacity(tiers.len());
    for query in tiers {
        if !candidates.iter().any(|seen| seen.eq_ignore_ascii_case(&query)) {
            candidates.push(query);
        }
    }
    candidates
}

/// Geocode an address, trying candidates until one returns a result
///
/// When no candidate produced an empty answer and every attempt failed, the
/// last provider error is returned instead of `NotFound`.
pub async fn geocode_with_fallback(
    geocoder: &dyn Geocoder,
    address: &AddressParts,
) -> Result<GeocodeMatch, GeocodeError> {
    let candidates = candidate_queries(address);
    if candidates.is_empty() {
        return Err(GeocodeError::NoCandidates);
    }

    let mut last_error = None;
    let mut provider_answered = false;

    for (index, query) in candidates.iter().enumerate() {
        match geocoder.lookup(query).await {
            Ok(Some(hit)) => {
                info!(query = %query, attempt = index + 1, "Geocoded address");
                return Ok(GeocodeMatch {
                    coordinates: hit.coordinates,
                    place_name: hit.place_name,
                    query: query.clone(),
                    attempt: index + 1,
                });
            }
            Ok(None) => {
                debug!(query = %query, "No geocoding result, trying next candidate");
                provider_answered = true;
            }
            Err(e) if e.aborts_fallback() => return Err(e),
            Err(e) => {
                warn!(query = %query, error = %e, "Geocoding attempt failed");
                last_error = Some(e);
            }
        }
    }

    match last_error {
        Some(e) if !provider_answered => Err(e),
        _ => Err(GeocodeError::NotFound {
            attempts: candidates.len(),
        }),
    }
}
