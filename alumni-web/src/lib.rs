//! alumni-web library
//!
//! HTTP service for the alumni directory: profile CRUD, map markers,
//! geocoding, admin console (users, re-geocoding jobs, import/export, bulk
//! email) and server-rendered pages. Exposed as a library for the binaries
//! and integration tests.

pub mod api;
pub mod auth;
pub mod db;
pub mod email;
pub mod error;
pub mod geocode;
pub mod pagination;
pub mod services;
pub mod startup;
pub mod ui;

pub use crate::error::{ApiError, ApiResult};

use alumni_common::config::TomlConfig;
use alumni_common::events::EventBus;
use axum::Router;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::auth::AuthProvider;
use crate::email::EmailProvider;
use crate::geocode::Geocoder;
use crate::services::jobs::JobRegistry;

/// Events buffered per SSE subscriber before the oldest are dropped
pub const EVENT_BUS_CAPACITY: usize = 256;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub config: Arc<TomlConfig>,
    pub auth: Arc<dyn AuthProvider>,
    pub geocoder: Arc<dyn Geocoder>,
    pub email: Arc<dyn EmailProvider>,
    /// Job and geocode events for the admin SSE stream
    pub event_bus: EventBus,
    /// Cancellation tokens of running admin jobs
    pub jobs: JobRegistry,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(
        db: SqlitePool,
        config: TomlConfig,
        auth: Arc<dyn AuthProvider>,
        geocoder: Arc<dyn Geocoder>,
        email: Arc<dyn EmailProvider>,
    ) -> Self {
        Self {
            db,
            config: Arc::new(config),
            auth,
            geocoder,
            email,
            event_bus: EventBus::new(EVENT_BUS_CAPACITY),
            jobs: JobRegistry::new(),
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
///
/// Pages and `/health` are public; every `/api` route requires a signed-in
/// user and `/api/admin` additionally the admin role.
pub fn build_router(state: AppState) -> Router {
    use axum::middleware;

    let admin = api::admin_routes().route_layer(middleware::from_fn(auth::require_admin));

    let protected = Router::new()
        .merge(api::profile_routes())
        .merge(api::map_routes())
        .merge(api::geocode_routes())
        .merge(admin)
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_user,
        ));

    let public = Router::new()
        .merge(ui::ui_routes())
        .merge(api::health_routes());

    Router::new()
        .merge(protected)
        .merge(public)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
