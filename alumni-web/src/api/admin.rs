//! Admin console API
//!
//! Users and roles, re-geocoding and bulk-email jobs, import/export and the
//! event stream. Every route here sits behind `require_admin`.

use alumni_common::db::{AlumniProfile, EmailLogEntry, Job, JobKind, JobState, Role, User};
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::auth::CurrentUser;
use crate::db::profiles as profile_db;
use crate::db::{email_log, jobs as job_db, users, GeocodeScope, ProfileFilter, Visibility};
use crate::email::{validate_template, EmailTemplate, RenderedEmail};
use crate::error::{ApiError, ApiResult, FieldError};
use crate::services::bulk_email::{select_recipients, send_bulk};
use crate::services::import::{export_csv, import_profiles, ImportFormat, ImportReport};
use crate::services::regeocode::geocode_profiles;
use crate::AppState;

// ========================================
// Users
// ========================================

/// GET /api/admin/users
pub async fn list_users(State(state): State<AppState>) -> ApiResult<Json<Vec<User>>> {
    Ok(Json(users::list_users(&state.db).await?))
}

#[derive(Debug, Deserialize)]
pub struct SetRoleRequest {
    pub role: Role,
}

/// PUT /api/admin/users/:id/role
pub async fn set_user_role(
    State(state): State<AppState>,
    admin: CurrentUser,
    Path(id): Path<String>,
    Json(request): Json<SetRoleRequest>,
) -> ApiResult<Json<User>> {
    if id == admin.id() {
        return Err(ApiError::BadRequest("You cannot change your own role".to_string()));
    }
    if !users::set_role(&state.db, &id, request.role).await? {
        return Err(ApiError::NotFound(format!("User not found: {}", id)));
    }
    info!(user_id = %id, role = ?request.role, by = %admin.id(), "User role changed");

    users::get_user(&state.db, &id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("User not found: {}", id)))
}

// ========================================
// Jobs
// ========================================

#[derive(Debug, Serialize)]
pub struct JobStartedResponse {
    pub job_id: String,
    pub total: i64,
}

#[derive(Debug, Default, Deserialize)]
pub struct BatchGeocodeRequest {
    #[serde(default)]
    pub scope: GeocodeScope,
    #[serde(default)]
    pub limit: Option<i64>,
}

impl BatchGeocodeRequest {
    /// An empty body selects the defaults; anything else must be valid JSON
    pub fn from_body(body: &[u8]) -> ApiResult<Self> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }
        serde_json::from_slice(body)
            .map_err(|e| ApiError::BadRequest(format!("Invalid batch request: {}", e)))
    }
}

/// POST /api/admin/geocode/batch
pub async fn start_batch_geocode(
    State(state): State<AppState>,
    admin: CurrentUser,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<JobStartedResponse>)> {
    let request = BatchGeocodeRequest::from_body(&body)?;
    let profiles = profile_db::select_for_geocoding(&state.db, request.scope, request.limit).await?;

    let handle = state
        .jobs
        .start(
            &state.db,
            &state.event_bus,
            JobKind::Regeocode,
            profiles.len() as i64,
            Some(admin.id().to_string()),
        )
        .await?;
    let response = JobStartedResponse {
        job_id: handle.id().to_string(),
        total: profiles.len() as i64,
    };
    info!(job_id = %response.job_id, scope = ?request.scope, total = response.total, "Re-geocoding requested");

    let jobs = state.jobs.clone();
    jobs.spawn(handle, move |mut handle| async move {
        let token = handle.token().clone();
        let result = geocode_profiles(
            &state.db,
            state.geocoder.as_ref(),
            Some(&state.event_bus),
            &profiles,
            &token,
            Some(&mut handle),
            false,
        )
        .await;
        (handle, result.map(|_| ()))
    })
    .await;

    Ok((StatusCode::ACCEPTED, Json(response)))
}

#[derive(Debug, Deserialize)]
pub struct JobListQuery {
    pub kind: Option<JobKind>,
    pub limit: Option<i64>,
}

/// GET /api/admin/jobs
pub async fn list_jobs(
    State(state): State<AppState>,
    Query(query): Query<JobListQuery>,
) -> ApiResult<Json<Vec<Job>>> {
    let limit = query.limit.unwrap_or(50).clamp(1, 500);
    Ok(Json(job_db::list_jobs(&state.db, query.kind, limit).await?))
}

/// GET /api/admin/jobs/:id
pub async fn get_job(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<Job>> {
    job_db::get_job(&state.db, &id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Job not found: {}", id)))
}

/// POST /api/admin/jobs/:id/cancel
pub async fn cancel_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<(StatusCode, Json<Job>)> {
    let job = job_db::get_job(&state.db, &id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Job not found: {}", id)))?;

    if job.state != JobState::Running || !state.jobs.cancel(&id).await {
        return Err(ApiError::Conflict(format!("Job {} is not running", id)));
    }
    Ok((StatusCode::ACCEPTED, Json(job)))
}

// ========================================
// Import / export
// ========================================

#[derive(Debug, Deserialize)]
pub struct ImportRequest {
    #[serde(default)]
    pub format: ImportFormat,
    pub content: String,
    #[serde(default)]
    pub dry_run: bool,
}

/// POST /api/admin/import
///
/// 200 with the report when every row is valid, 422 with the same report
/// shape when anything was rejected.
pub async fn import(
    State(state): State<AppState>,
    Json(request): Json<ImportRequest>,
) -> ApiResult<(StatusCode, Json<ImportReport>)> {
    let report = import_profiles(&state.db, request.format, &request.content, request.dry_run).await?;
    let status = if report.errors.is_empty() {
        StatusCode::OK
    } else {
        StatusCode::UNPROCESSABLE_ENTITY
    };
    Ok((status, Json(report)))
}

/// GET /api/admin/export.csv
pub async fn export(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let profiles = profile_db::list_profiles(
        &state.db,
        &ProfileFilter::default(),
        &Visibility::All,
        Default::default(),
        Default::default(),
        None,
    )
    .await?;
    let csv = export_csv(&profiles)?;

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"alumni.csv\"",
            ),
        ],
        csv,
    ))
}

// ========================================
// Email
// ========================================

/// Validate subject and body, naming the offending field
fn check_template(template: &EmailTemplate) -> ApiResult<()> {
    let mut errors = Vec::new();
    for (field, value) in [("subject", &template.subject), ("body", &template.body)] {
        if value.trim().is_empty() {
            errors.push(FieldError::new(field, "is required"));
        } else if let Err(e) = validate_template(value) {
            errors.push(FieldError::new(field, e.to_string()));
        }
    }
    if errors.is_empty() {
        Ok(())
    } else {
        Err(ApiError::Validation(errors))
    }
}

#[derive(Debug, Deserialize)]
pub struct PreviewRequest {
    pub subject: String,
    pub body: String,
    pub profile_id: String,
}

#[derive(Debug, Serialize)]
pub struct PreviewResponse {
    pub recipient: String,
    #[serde(flatten)]
    pub email: RenderedEmail,
}

/// POST /api/admin/email/preview
pub async fn preview_email(
    State(state): State<AppState>,
    Json(request): Json<PreviewRequest>,
) -> ApiResult<Json<PreviewResponse>> {
    let template = EmailTemplate {
        subject: request.subject,
        body: request.body,
    };
    check_template(&template)?;

    let profile = profile_db::get_profile(&state.db, &request.profile_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Profile not found: {}", request.profile_id)))?;
    let email = template
        .render_for(&profile)
        .map_err(|e| ApiError::Unprocessable(e.to_string()))?;

    Ok(Json(PreviewResponse {
        recipient: profile.email,
        email,
    }))
}

#[derive(Debug, Deserialize)]
pub struct SendRequest {
    pub subject: String,
    pub body: String,
    #[serde(default)]
    pub filters: ProfileFilter,
}

#[derive(Debug, Serialize)]
pub struct SendResponse {
    pub job_id: String,
    pub recipients: usize,
}

/// POST /api/admin/email/send
pub async fn send_email(
    State(state): State<AppState>,
    admin: CurrentUser,
    Json(request): Json<SendRequest>,
) -> ApiResult<(StatusCode, Json<SendResponse>)> {
    let template = EmailTemplate {
        subject: request.subject,
        body: request.body,
    };
    check_template(&template)?;

    let matching: Vec<AlumniProfile> = profile_db::list_profiles(
        &state.db,
        &request.filters,
        &Visibility::All,
        Default::default(),
        Default::default(),
        None,
    )
    .await?;
    let recipients = select_recipients(matching);
    if recipients.is_empty() {
        return Err(ApiError::Unprocessable(
            "No profiles match the filters and accept email".to_string(),
        ));
    }

    let handle = state
        .jobs
        .start(
            &state.db,
            &state.event_bus,
            JobKind::BulkEmail,
            recipients.len() as i64,
            Some(admin.id().to_string()),
        )
        .await?;
    let response = SendResponse {
        job_id: handle.id().to_string(),
        recipients: recipients.len(),
    };
    info!(job_id = %response.job_id, recipients = response.recipients, "Bulk email requested");

    let jobs = state.jobs.clone();
    jobs.spawn(handle, move |mut handle| async move {
        let result = send_bulk(
            &state.db,
            state.email.as_ref(),
            &template,
            &state.config.email.from_address,
            state.config.email.per_second,
            &recipients,
            &mut handle,
        )
        .await;
        if let Err(e) = &result {
            error!(job_id = %handle.id(), error = %e, "Bulk email stopped");
        }
        (handle, result.map(|_| ()))
    })
    .await;

    Ok((StatusCode::ACCEPTED, Json(response)))
}

#[derive(Debug, Deserialize)]
pub struct EmailLogQuery {
    pub job_id: Option<String>,
    pub limit: Option<i64>,
}

/// GET /api/admin/email/log
pub async fn list_email_log(
    State(state): State<AppState>,
    Query(query): Query<EmailLogQuery>,
) -> ApiResult<Json<Vec<EmailLogEntry>>> {
    let limit = query.limit.unwrap_or(200).clamp(1, 1000);
    let entries = email_log::list_entries(&state.db, query.job_id.as_deref(), limit).await?;
    Ok(Json(entries))
}

pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/api/admin/users", get(list_users))
        .route("/api/admin/users/:id/role", put(set_user_role))
        .route("/api/admin/geocode/batch", post(start_batch_geocode))
        .route("/api/admin/jobs", get(list_jobs))
        .route("/api/admin/jobs/:id", get(get_job))
        .route("/api/admin/jobs/:id/cancel", post(cancel_job))
        .route("/api/admin/events", get(super::event_stream))
        .route("/api/admin/import", post(import))
        .route("/api/admin/export.csv", get(export))
        .route("/api/admin/email/preview", post(preview_email))
        .route("/api/admin/email/send", post(send_email))
        .route("/api/admin/email/log", get(list_email_log))
}
