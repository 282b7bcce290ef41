//! HTTP API handlers

pub mod admin;
pub mod geocode;
pub mod health;
pub mod map;
pub mod profiles;
pub mod sse;

pub use admin::admin_routes;
pub use geocode::geocode_routes;
pub use health::health_routes;
pub use map::map_routes;
pub use profiles::profile_routes;
pub use sse::event_stream;

use crate::auth::CurrentUser;
use crate::db::{ProfileFilter, Visibility};
use crate::error::{ApiError, ApiResult};
use serde::Deserialize;

/// Which profiles a signed-in user may see
pub fn visibility_for(user: &CurrentUser) -> Visibility {
    if user.is_admin() {
        Visibility::All
    } else {
        Visibility::PublicOr(user.id().to_string())
    }
}

/// Directory query string shared by the listing and the map
///
/// Numbers arrive as strings so an empty form field means "no filter".
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DirectoryQuery {
    pub q: Option<String>,
    pub graduation_year: Option<String>,
    pub industry: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub page: Option<String>,
    pub sort: Option<String>,
    pub order: Option<String>,
}

fn parse_number(field: &str, value: &Option<String>) -> ApiResult<Option<i64>> {
    match value.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(None),
        Some(v) => v
            .parse::<i64>()
            .map(Some)
            .map_err(|_| ApiError::BadRequest(format!("{} must be a number, got '{}'", field, v))),
    }
}

impl DirectoryQuery {
    pub fn filter(&self) -> ApiResult<ProfileFilter> {
        Ok(ProfileFilter {
            q: self.q.clone(),
            graduation_year: parse_number("graduation_year", &self.graduation_year)?,
            industry: self.industry.clone(),
            city: self.city.clone(),
            country: self.country.clone(),
        })
    }

    pub fn page(&self) -> ApiResult<i64> {
        Ok(parse_number("page", &self.page)?.unwrap_or(1))
    }
}
