//! Map markers
//!
//! Profiles at the same coordinates (rounded to 5 decimals, about a metre)
//! share one marker so co-located alumni do not hide each other.

use alumni_common::db::AlumniProfile;
use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use std::collections::HashMap;

use super::{visibility_for, DirectoryQuery};
use crate::auth::CurrentUser;
use crate::db::profiles as profile_db;
use crate::error::ApiResult;
use crate::AppState;

const COORDINATE_SCALE: f64 = 100_000.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarkerProfile {
    pub id: String,
    pub name: String,
    pub city: Option<String>,
    pub country: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Marker {
    pub latitude: f64,
    pub longitude: f64,
    pub count: usize,
    pub label: String,
    pub profiles: Vec<MarkerProfile>,
}

fn marker_label(profile: &AlumniProfile) -> String {
    let label = [&profile.city, &profile.country]
        .iter()
        .filter_map(|p| p.as_deref())
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(", ");
    if label.is_empty() {
        profile.location_label()
    } else {
        label
    }
}

/// Group located profiles into markers, in first-seen order
pub fn group_markers(profiles: &[AlumniProfile]) -> Vec<Marker> {
    let mut markers: Vec<Marker> = Vec::new();
    let mut index: HashMap<(i64, i64), usize> = HashMap::new();

    for profile in profiles {
        let Some((latitude, longitude)) = profile.coordinates() else {
            continue;
        };
        let key = (
            (latitude * COORDINATE_SCALE).round() as i64,
            (longitude * COORDINATE_SCALE).round() as i64,
        );
        let entry = MarkerProfile {
            id: profile.id.clone(),
            name: profile.full_name(),
            city: profile.city.clone(),
            country: profile.country.clone(),
        };

        match index.get(&key) {
            Some(&i) => {
                markers[i].count += 1;
                markers[i].profiles.push(entry);
            }
            None => {
                index.insert(key, markers.len());
                markers.push(Marker {
                    latitude: key.0 as f64 / COORDINATE_SCALE,
                    longitude: key.1 as f64 / COORDINATE_SCALE,
                    count: 1,
                    label: marker_label(profile),
                    profiles: vec![entry],
                });
            }
        }
    }
    markers
}

/// GET /api/map/markers
pub async fn markers(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<DirectoryQuery>,
) -> ApiResult<Json<Vec<Marker>>> {
    let filter = query.filter()?;
    let profiles = profile_db::list_profiles(
        &state.db,
        &filter,
        &visibility_for(&user),
        Default::default(),
        Default::default(),
        None,
    )
    .await?;

    Ok(Json(group_markers(&profiles)))
}

pub fn map_routes() -> Router<AppState> {
    Router::new().route("/api/map/markers", get(markers))
}
