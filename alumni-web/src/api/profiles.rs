//! Directory and profile CRUD handlers

use alumni_common::db::AlumniProfile;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use chrono::Utc;
use serde::Serialize;
use tracing::info;

use super::{visibility_for, DirectoryQuery};
use crate::auth::CurrentUser;
use crate::db::profiles::{self as profile_db, Facets};
use crate::db::{ProfileSort, SortOrder, Visibility};
use crate::error::{ApiError, ApiResult};
use crate::pagination::calculate_pagination;
use crate::services::profiles::ProfileInput;
use crate::services::regeocode::geocode_profile;
use crate::AppState;

/// GET /api/profiles response
#[derive(Debug, Serialize)]
pub struct ProfileListResponse {
    pub total_results: i64,
    pub page: i64,
    pub page_size: i64,
    pub total_pages: i64,
    pub profiles: Vec<AlumniProfile>,
}

fn can_edit(user: &CurrentUser, profile: &AlumniProfile) -> bool {
    user.is_admin() || profile.user_id.as_deref() == Some(user.id())
}

fn is_visible(visibility: &Visibility, profile: &AlumniProfile) -> bool {
    match visibility {
        Visibility::All => true,
        Visibility::PublicOr(user_id) => {
            profile.is_public || profile.user_id.as_deref() == Some(user_id.as_str())
        }
    }
}

/// Load a profile the caller may see, 404 otherwise
async fn load_visible(state: &AppState, user: &CurrentUser, id: &str) -> ApiResult<AlumniProfile> {
    profile_db::get_profile(&state.db, id)
        .await?
        .filter(|p| is_visible(&visibility_for(user), p))
        .ok_or_else(|| ApiError::NotFound(format!("Profile not found: {}", id)))
}

async fn ensure_email_free(state: &AppState, email: &str, except_id: Option<&str>) -> ApiResult<()> {
    if let Some(other) = profile_db::get_profile_by_email(&state.db, email).await? {
        if Some(other.id.as_str()) != except_id {
            return Err(ApiError::Conflict(format!(
                "A profile with email {} already exists",
                email
            )));
        }
    }
    Ok(())
}

/// Geocode after a save; geocoding problems are recorded, never returned
async fn geocode_and_reload(state: &AppState, profile: AlumniProfile) -> ApiResult<AlumniProfile> {
    geocode_profile(
        &state.db,
        state.geocoder.as_ref(),
        Some(&state.event_bus),
        &profile,
        false,
    )
    .await?;

    let reloaded = profile_db::get_profile(&state.db, &profile.id).await?;
    Ok(reloaded.unwrap_or(profile))
}

/// GET /api/profiles
pub async fn list_profiles(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<DirectoryQuery>,
) -> ApiResult<Json<ProfileListResponse>> {
    let filter = query.filter()?;
    let sort = ProfileSort::parse(query.sort.as_deref()).map_err(ApiError::BadRequest)?;
    let order = SortOrder::parse(query.order.as_deref());
    let visibility = visibility_for(&user);

    let total = profile_db::count_profiles(&state.db, &filter, &visibility).await?;
    let pagination = calculate_pagination(total, query.page()?, state.config.server.page_size);

    let profiles = profile_db::list_profiles(
        &state.db,
        &filter,
        &visibility,
        sort,
        order,
        Some((pagination.page_size, pagination.offset)),
    )
    .await?;

    Ok(Json(ProfileListResponse {
        total_results: total,
        page: pagination.page,
        page_size: pagination.page_size,
        total_pages: pagination.total_pages,
        profiles,
    }))
}

/// GET /api/profiles/:id
pub async fn get_profile(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<Json<AlumniProfile>> {
    Ok(Json(load_visible(&state, &user, &id).await?))
}

/// GET /api/me/profile
pub async fn get_my_profile(
    State(state): State<AppState>,
    user: CurrentUser,
) -> ApiResult<Json<AlumniProfile>> {
    profile_db::get_profile_by_user(&state.db, user.id())
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("You have no profile yet".to_string()))
}

/// POST /api/profiles
///
/// Members create their own (single) profile; admins create unowned ones.
pub async fn create_profile(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(input): Json<ProfileInput>,
) -> ApiResult<(StatusCode, Json<AlumniProfile>)> {
    let input = input.normalized();
    input.validate().map_err(ApiError::Validation)?;

    let owner = if user.is_admin() {
        None
    } else {
        if profile_db::get_profile_by_user(&state.db, user.id()).await?.is_some() {
            return Err(ApiError::Conflict("You already have a profile".to_string()));
        }
        Some(user.id().to_string())
    };
    ensure_email_free(&state, &input.email, None).await?;

    let profile = input.into_profile(owner, Utc::now());
    profile_db::insert_profile(&state.db, &profile).await?;
    info!(profile_id = %profile.id, user_id = %user.id(), "Profile created");

    let profile = geocode_and_reload(&state, profile).await?;
    Ok((StatusCode::CREATED, Json(profile)))
}

/// PUT /api/profiles/:id
///
/// Re-geocodes only when city, state or country changed.
pub async fn update_profile(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
    Json(input): Json<ProfileInput>,
) -> ApiResult<Json<AlumniProfile>> {
    let mut profile = load_visible(&state, &user, &id).await?;
    if !can_edit(&user, &profile) {
        return Err(ApiError::Forbidden("Only the owner or an admin may edit this profile".to_string()));
    }

    let input = input.normalized();
    input.validate().map_err(ApiError::Validation)?;
    ensure_email_free(&state, &input.email, Some(&profile.id)).await?;

    let address_changed = input.apply_to(&mut profile, Utc::now());
    profile_db::update_profile(&state.db, &profile).await?;
    info!(profile_id = %profile.id, address_changed, "Profile updated");

    let profile = if address_changed {
        geocode_and_reload(&state, profile).await?
    } else {
        profile
    };
    Ok(Json(profile))
}

/// DELETE /api/profiles/:id
pub async fn delete_profile(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    let profile = load_visible(&state, &user, &id).await?;
    if !can_edit(&user, &profile) {
        return Err(ApiError::Forbidden("Only the owner or an admin may delete this profile".to_string()));
    }

    profile_db::delete_profile(&state.db, &profile.id).await?;
    info!(profile_id = %profile.id, user_id = %user.id(), "Profile deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/facets
pub async fn facets(State(state): State<AppState>, user: CurrentUser) -> ApiResult<Json<Facets>> {
    Ok(Json(profile_db::facets(&state.db, &visibility_for(&user)).await?))
}

pub fn profile_routes() -> Router<AppState> {
    Router::new()
        .route("/api/profiles", get(list_profiles).post(create_profile))
        .route(
            "/api/profiles/:id",
            get(get_profile).put(update_profile).delete(delete_profile),
        )
        .route("/api/me/profile", get(get_my_profile))
        .route("/api/facets", get(facets))
}
