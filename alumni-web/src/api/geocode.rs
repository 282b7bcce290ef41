//! Ad-hoc geocoding of an address (used by the profile form preview)

use axum::{extract::State, routing::post, Json, Router};
use serde::Serialize;

use crate::error::ApiResult;
use crate::geocode::{geocode_with_fallback, AddressParts};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct GeocodeResponse {
    pub latitude: f64,
    pub longitude: f64,
    pub query: String,
    pub place_name: Option<String>,
    pub attempt: usize,
}

/// POST /api/geocode
pub async fn geocode_address(
    State(state): State<AppState>,
    Json(address): Json<AddressParts>,
) -> ApiResult<Json<GeocodeResponse>> {
    let found = geocode_with_fallback(state.geocoder.as_ref(), &address).await?;
    Ok(Json(GeocodeResponse {
        latitude: found.coordinates.latitude,
        longitude: found.coordinates.longitude,
        query: found.query,
        place_name: found.place_name,
        attempt: found.attempt,
    }))
}

pub fn geocode_routes() -> Router<AppState> {
    Router::new().route("/api/geocode", post(geocode_address))
}
