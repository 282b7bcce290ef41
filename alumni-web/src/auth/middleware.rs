//! Request authentication middleware

use alumni_common::db::User;
use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts},
    middleware::Next,
    response::Response,
};
use tracing::{debug, warn};

use super::AuthError;
use crate::db::users;
use crate::AppState;

/// Signed-in user, inserted into request extensions by [`require_user`]
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

impl CurrentUser {
    pub fn id(&self) -> &str {
        &self.0.id
    }

    pub fn is_admin(&self) -> bool {
        self.0.is_admin()
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .ok_or(AuthError::MissingToken)
    }
}

fn bearer_token(request: &Request) -> Option<&str> {
    let value = request.headers().get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

/// Verify the bearer token and record the user
///
/// Emails listed in `auth.admin_emails` are promoted to admin on every
/// login; other users keep their stored role.
pub async fn require_user(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let token = match bearer_token(&request) {
        Some(token) => token.to_string(),
        None if state.auth.allows_anonymous() => String::new(),
        None => return Err(AuthError::MissingToken),
    };

    let identity = state.auth.verify(&token).await.map_err(|e| {
        debug!(error = %e, path = %request.uri().path(), "Authentication failed");
        e
    })?;

    let promote = state.auth.grants_admin() || state.config.auth.is_admin_email(&identity.email);
    let user = users::upsert_user(
        &state.db,
        &identity.id,
        &identity.email,
        identity.name.as_deref(),
        promote,
    )
    .await
    .map_err(|e| {
        warn!(error = %e, "Failed to record user");
        AuthError::Internal(e.to_string())
    })?;

    request.extensions_mut().insert(CurrentUser(user));
    Ok(next.run(request).await)
}

/// Reject non-admins; must run after [`require_user`]
pub async fn require_admin(request: Request, next: Next) -> Result<Response, AuthError> {
    let is_admin = request
        .extensions()
        .get::<CurrentUser>()
        .ok_or(AuthError::MissingToken)?
        .is_admin();

    if !is_admin {
        return Err(AuthError::Forbidden);
    }
    Ok(next.run(request).await)
}
