//! Authentication
//!
//! Identity is owned by an auth provider; this service only verifies bearer
//! tokens and mirrors the resulting user into the `users` table. Three
//! providers exist:
//! - [`SignedTokenProvider`]: tokens signed with the local shared secret
//!   (issued by `alumni-web issue-token`)
//! - [`RemoteAuthProvider`]: tokens checked against a hosted provider's
//!   userinfo endpoint
//! - [`DisabledAuthProvider`]: no verification, every caller is a local admin

mod middleware;

pub use middleware::{require_admin, require_user, CurrentUser};

use alumni_common::token::{verify_token, TokenError};
use async_trait::async_trait;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use reqwest::StatusCode as ReqwestStatus;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Identity asserted by the auth provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub id: String,
    pub email: String,
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("Missing bearer token")]
    MissingToken,

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Token expired")]
    Expired,

    #[error("Admin role required")]
    Forbidden,

    #[error("Auth provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("Auth error: {0}")]
    Internal(String),
}

impl From<TokenError> for AuthError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Expired { .. } => AuthError::Expired,
            other => AuthError::InvalidToken(other.to_string()),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            AuthError::MissingToken | AuthError::InvalidToken(_) | AuthError::Expired => {
                (StatusCode::UNAUTHORIZED, "UNAUTHORIZED")
            }
            AuthError::Forbidden => (StatusCode::FORBIDDEN, "FORBIDDEN"),
            AuthError::ProviderUnavailable(_) => (StatusCode::BAD_GATEWAY, "AUTH_UNAVAILABLE"),
            AuthError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        };

        let mut response = (
            status,
            Json(json!({ "error": { "code": code, "message": self.to_string() } })),
        )
            .into_response();
        if status == StatusCode::UNAUTHORIZED {
            response.headers_mut().insert(
                axum::http::header::WWW_AUTHENTICATE,
                axum::http::HeaderValue::from_static("Bearer"),
            );
        }
        response
    }
}

/// Verifies bearer tokens
#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn verify(&self, token: &str) -> Result<AuthUser, AuthError>;

    /// Every verified user is an admin (local development)
    fn grants_admin(&self) -> bool {
        false
    }

    /// Requests without a token are accepted
    fn allows_anonymous(&self) -> bool {
        false
    }
}

/// Built-in provider for tokens signed with the shared secret
pub struct SignedTokenProvider {
    shared_secret: i64,
}

impl SignedTokenProvider {
    pub fn new(shared_secret: i64) -> Self {
        Self { shared_secret }
    }
}

#[async_trait]
impl AuthProvider for SignedTokenProvider {
    async fn verify(&self, token: &str) -> Result<AuthUser, AuthError> {
        let now = chrono::Utc::now().timestamp();
        let claims = verify_token(token, self.shared_secret, now)?;
        Ok(AuthUser {
            id: claims.sub,
            email: claims.email,
            name: claims.name,
        })
    }
}

#[derive(Debug, Deserialize)]
struct UserInfo {
    #[serde(alias = "sub")]
    id: String,
    email: String,
    #[serde(default)]
    name: Option<String>,
}

/// Hosted auth provider (`GET {base}/v1/userinfo` with the bearer token)
pub struct RemoteAuthProvider {
    http_client: reqwest::Client,
    userinfo_url: Url,
}

impl RemoteAuthProvider {
    pub fn new(base_url: &str) -> Result<Self, AuthError> {
        let mut userinfo_url = Url::parse(base_url)
            .map_err(|e| AuthError::Internal(format!("Invalid auth provider URL: {}", e)))?;
        userinfo_url
            .path_segments_mut()
            .map_err(|_| AuthError::Internal("Auth provider URL cannot be a base".to_string()))?
            .pop_if_empty()
            .extend(["v1", "userinfo"]);

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| AuthError::Internal(e.to_string()))?;

        Ok(Self {
            http_client,
            userinfo_url,
        })
    }
}

#[async_trait]
impl AuthProvider for RemoteAuthProvider {
    async fn verify(&self, token: &str) -> Result<AuthUser, AuthError> {
        let response = self
            .http_client
            .get(self.userinfo_url.clone())
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| AuthError::ProviderUnavailable(e.to_string()))?;

        match response.status() {
            ReqwestStatus::UNAUTHORIZED | ReqwestStatus::FORBIDDEN => Err(AuthError::InvalidToken(
                "rejected by auth provider".to_string(),
            )),
            s if !s.is_success() => Err(AuthError::ProviderUnavailable(format!(
                "userinfo returned {}",
                s
            ))),
            _ => {
                let info: UserInfo = response
                    .json()
                    .await
                    .map_err(|e| AuthError::ProviderUnavailable(e.to_string()))?;
                Ok(AuthUser {
                    id: info.id,
                    email: info.email,
                    name: info.name,
                })
            }
        }
    }
}

/// Id of the user every request maps to when auth is disabled
pub const LOCAL_ADMIN_ID: &str = "local-admin";

/// No verification: every request is the local admin
pub struct DisabledAuthProvider;

#[async_trait]
impl AuthProvider for DisabledAuthProvider {
    async fn verify(&self, _token: &str) -> Result<AuthUser, AuthError> {
        Ok(AuthUser {
            id: LOCAL_ADMIN_ID.to_string(),
            email: "admin@localhost".to_string(),
            name: Some("Local admin".to_string()),
        })
    }

    fn grants_admin(&self) -> bool {
        true
    }

    fn allows_anonymous(&self) -> bool {
        true
    }
}
