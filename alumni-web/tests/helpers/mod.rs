//! Shared fixtures for alumni-web integration tests

#![allow(dead_code)]

use alumni_common::config::TomlConfig;
use alumni_common::db::connect_in_memory;
use alumni_common::token::{issue_token, TokenClaims};
use alumni_web::auth::SignedTokenProvider;
use alumni_web::email::LogEmailProvider;
use alumni_web::geocode::{Coordinates, GeocodeError, GeocodeHit, Geocoder};
use alumni_web::{build_router, AppState};
use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tower::util::ServiceExt;

pub const TEST_SECRET: i64 = 1_234_567_890;
pub const ADMIN_EMAIL: &str = "admin@example.org";

/// Geocoder answering from a fixed table of exact queries
#[derive(Default)]
pub struct TableGeocoder {
    places: HashMap<String, Coordinates>,
    failure: Option<GeocodeError>,
    pub queries: Mutex<Vec<String>>,
}

impl TableGeocoder {
    pub fn new(places: &[(&str, f64, f64)]) -> Self {
        Self {
            places: places
                .iter()
                .map(|(q, latitude, longitude)| {
                    (
                        q.to_string(),
                        Coordinates {
                            latitude: *latitude,
                            longitude: *longitude,
                        },
                    )
                })
                .collect(),
            ..Default::default()
        }
    }

    /// Every lookup fails with `error`
    pub fn failing(error: GeocodeError) -> Self {
        Self {
            failure: Some(error),
            ..Default::default()
        }
    }
}

#[async_trait]
impl Geocoder for TableGeocoder {
    async fn lookup(&self, query: &str) -> Result<Option<GeocodeHit>, GeocodeError> {
        self.queries.lock().unwrap().push(query.to_string());
        if let Some(error) = &self.failure {
            return Err(error.clone());
        }
        Ok(self.places.get(query).map(|c| GeocodeHit {
            coordinates: *c,
            place_name: Some(query.to_string()),
        }))
    }
}

/// Places known to the default test geocoder
pub fn default_geocoder() -> TableGeocoder {
    TableGeocoder::new(&[
        ("Paris, France", 48.8566, 2.3522),
        ("Boston, MA, USA", 42.3601, -71.0589),
        ("Berlin, Germany", 52.52, 13.405),
    ])
}

pub struct TestApp {
    pub state: AppState,
    pub email: Arc<LogEmailProvider>,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_geocoder(default_geocoder()).await
    }

    pub async fn with_geocoder(geocoder: TableGeocoder) -> Self {
        let pool = connect_in_memory().await.expect("in-memory database");
        let mut config = TomlConfig::default();
        config.auth.admin_emails = vec![ADMIN_EMAIL.to_string()];
        config.server.page_size = 2;
        config.email.per_second = 100;

        let email = Arc::new(LogEmailProvider::new());
        let state = AppState::new(
            pool,
            config,
            Arc::new(SignedTokenProvider::new(TEST_SECRET)),
            Arc::new(geocoder),
            email.clone(),
        );
        Self { state, email }
    }

    pub fn router(&self) -> Router {
        build_router(self.state.clone())
    }

    /// Send a request and decode the JSON body (`Value::Null` when empty or not JSON)
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let (status, text) = self.request_text(method, uri, token, body).await;
        let json = serde_json::from_str(&text).unwrap_or(Value::Null);
        (status, json)
    }

    pub async fn request_text(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, String) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, String::from_utf8_lossy(&bytes).to_string())
    }

    pub async fn get(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        self.request(Method::GET, uri, Some(token), None).await
    }

    pub async fn post(&self, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.request(Method::POST, uri, Some(token), Some(body)).await
    }

    pub async fn put(&self, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.request(Method::PUT, uri, Some(token), Some(body)).await
    }

    pub async fn delete(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        self.request(Method::DELETE, uri, Some(token), None).await
    }

    /// Poll a job until it leaves the running state
    pub async fn wait_for_job(&self, job_id: &str, token: &str) -> Value {
        for _ in 0..200 {
            let (status, job) = self.get(&format!("/api/admin/jobs/{}", job_id), token).await;
            assert_eq!(status, StatusCode::OK);
            if job["state"] != "running" {
                return job;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        panic!("job {} did not finish", job_id);
    }
}

/// Signed token valid for one hour
pub fn token_for(user_id: &str, email: &str) -> String {
    let claims = TokenClaims {
        sub: user_id.to_string(),
        email: email.to_string(),
        name: Some(format!("User {}", user_id)),
        exp: chrono::Utc::now().timestamp() + 3600,
    };
    issue_token(&claims, TEST_SECRET).unwrap()
}

pub fn admin_token() -> String {
    token_for("admin-1", ADMIN_EMAIL)
}

pub fn member_token(n: u32) -> String {
    token_for(&format!("member-{}", n), &format!("member{}@example.org", n))
}
