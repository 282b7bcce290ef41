//! HTTP-level tests for the alumni-web router

mod helpers;

use alumni_common::db::JobKind;
use alumni_common::events::AppEvent;
use alumni_web::geocode::GeocodeError;
use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
};
use helpers::{admin_token, member_token, TableGeocoder, TestApp};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::time::Duration;
use tower::util::ServiceExt;

fn profile_body(first: &str, last: &str, email: &str, city: &str, country: &str) -> Value {
    json!({
        "first_name": first,
        "last_name": last,
        "email": email,
        "graduation_year": 2015,
        "industry": "Software",
        "city": city,
        "country": country,
        "is_public": true
    })
}

async fn create(app: &TestApp, token: &str, body: Value) -> Value {
    let (status, profile) = app.post("/api/profiles", token, body).await;
    assert_eq!(status, StatusCode::CREATED, "create failed: {}", profile);
    profile
}

// ========================================
// Public routes and authentication
// ========================================

#[tokio::test]
async fn test_health_is_public() {
    let app = TestApp::new().await;
    let (status, body) = app.request(Method::GET, "/health", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "alumni-web");
    assert!(body["uptime_seconds"].as_i64().unwrap() >= 0);
}

#[tokio::test]
async fn test_pages_are_public_html() {
    let app = TestApp::new().await;
    for uri in ["/", "/map", "/admin", "/profiles/abc"] {
        let (status, html) = app.request_text(Method::GET, uri, None, None).await;
        assert_eq!(status, StatusCode::OK, "{}", uri);
        assert!(html.starts_with("<!DOCTYPE html>"), "{}", uri);
    }
}

#[tokio::test]
async fn test_api_requires_token() {
    let app = TestApp::new().await;
    let (status, body) = app.request(Method::GET, "/api/profiles", None, None).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["error"]["message"].is_string());
}

#[tokio::test]
async fn test_api_rejects_forged_token() {
    let app = TestApp::new().await;
    let forged = helpers::token_for("x", "x@example.org").replace('.', ".0");
    let (status, _) = app.get("/api/profiles", &forged).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

// ========================================
// Profiles
// ========================================

#[tokio::test]
async fn test_create_geocodes_and_lists() {
    let app = TestApp::new().await;
    let admin = admin_token();

    let profile = create(&app, &admin, profile_body("Ada", "Lovelace", "ada@example.org", "Paris", "France")).await;
    assert_eq!(profile["geocode_status"], "ok");
    assert_eq!(profile["latitude"], 48.8566);
    assert!(profile["user_id"].is_null(), "admin-created profiles are unowned");

    let (status, list) = app.get("/api/profiles", &admin).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list["total_results"], 1);
    assert_eq!(list["profiles"][0]["email"], "ada@example.org");
}

#[tokio::test]
async fn test_unknown_city_is_saved_as_failed() {
    let app = TestApp::new().await;
    let profile = create(
        &app,
        &admin_token(),
        profile_body("Grace", "Hopper", "grace@example.org", "Atlantis", "Nowhere"),
    )
    .await;

    assert_eq!(profile["geocode_status"], "failed");
    assert!(profile["latitude"].is_null());
}

#[tokio::test]
async fn test_validation_errors_name_fields() {
    let app = TestApp::new().await;
    let (status, body) = app
        .post(
            "/api/profiles",
            &admin_token(),
            json!({ "first_name": "", "last_name": "X", "email": "not-an-email" }),
        )
        .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    let fields: Vec<&str> = body["error"]["fields"]
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f["field"].as_str().unwrap())
        .collect();
    assert!(fields.contains(&"first_name"));
    assert!(fields.contains(&"email"));
}

#[tokio::test]
async fn test_duplicate_email_conflicts() {
    let app = TestApp::new().await;
    let admin = admin_token();
    create(&app, &admin, profile_body("A", "One", "same@example.org", "Paris", "France")).await;

    let (status, _) = app
        .post("/api/profiles", &admin, profile_body("B", "Two", "SAME@example.org", "Paris", "France"))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_member_owns_a_single_profile() {
    let app = TestApp::new().await;
    let member = member_token(1);

    let profile = create(&app, &member, profile_body("Mia", "Member", "mia@example.org", "Berlin", "Germany")).await;
    assert_eq!(profile["user_id"], "member-1");

    let (status, mine) = app.get("/api/me/profile", &member).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(mine["id"], profile["id"]);

    let (status, _) = app
        .post("/api/profiles", &member, profile_body("Mia", "Again", "mia2@example.org", "Berlin", "Germany"))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_private_profiles_hidden_from_other_members() {
    let app = TestApp::new().await;
    let owner = member_token(1);
    let other = member_token(2);

    let mut body = profile_body("Pat", "Private", "pat@example.org", "Paris", "France");
    body["is_public"] = json!(false);
    let profile = create(&app, &owner, body).await;
    let uri = format!("/api/profiles/{}", profile["id"].as_str().unwrap());

    let (status, _) = app.get(&uri, &other).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (_, list) = app.get("/api/profiles", &other).await;
    assert_eq!(list["total_results"], 0);

    let (status, _) = app.get(&uri, &owner).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app.get(&uri, &admin_token()).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_only_owner_or_admin_may_edit() {
    let app = TestApp::new().await;
    let owner = member_token(1);
    let profile = create(&app, &owner, profile_body("Olga", "Owner", "olga@example.org", "Paris", "France")).await;
    let uri = format!("/api/profiles/{}", profile["id"].as_str().unwrap());

    let mut update = profile_body("Olga", "Owner", "olga@example.org", "Paris", "France");
    update["company"] = json!("Acme");

    let (status, _) = app.put(&uri, &member_token(2), update.clone()).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app.delete(&uri, &member_token(2)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, updated) = app.put(&uri, &owner, update).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["company"], "Acme");

    let (status, _) = app.delete(&uri, &admin_token()).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = app.get(&uri, &owner).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_address_change_regeocodes() {
    let app = TestApp::new().await;
    let admin = admin_token();
    let profile = create(&app, &admin, profile_body("Max", "Mover", "max@example.org", "Paris", "France")).await;
    let uri = format!("/api/profiles/{}", profile["id"].as_str().unwrap());

    let (status, moved) = app
        .put(&uri, &admin, profile_body("Max", "Mover", "max@example.org", "Berlin", "Germany"))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(moved["geocode_status"], "ok");
    assert_eq!(moved["latitude"], 52.52);
}

#[tokio::test]
async fn test_pagination_and_filters() {
    let app = TestApp::new().await;
    let admin = admin_token();
    create(&app, &admin, profile_body("A", "Alpha", "a@example.org", "Paris", "France")).await;
    create(&app, &admin, profile_body("B", "Beta", "b@example.org", "Paris", "France")).await;
    create(&app, &admin, profile_body("C", "Gamma", "c@example.org", "Berlin", "Germany")).await;

    let (_, page2) = app.get("/api/profiles?page=2", &admin).await;
    assert_eq!(page2["total_pages"], 2);
    assert_eq!(page2["page"], 2);
    assert_eq!(page2["profiles"].as_array().unwrap().len(), 1);
    assert_eq!(page2["profiles"][0]["last_name"], "Gamma");

    let (_, germany) = app.get("/api/profiles?country=germany", &admin).await;
    assert_eq!(germany["total_results"], 1);

    let (_, search) = app.get("/api/profiles?q=bet&sort=last_name&order=desc", &admin).await;
    assert_eq!(search["total_results"], 1);
    assert_eq!(search["profiles"][0]["last_name"], "Beta");

    let (status, _) = app.get("/api/profiles?sort=password", &admin).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = app.get("/api/profiles?graduation_year=soon", &admin).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_facets_list_distinct_values() {
    let app = TestApp::new().await;
    let admin = admin_token();
    create(&app, &admin, profile_body("A", "Alpha", "a@example.org", "Paris", "France")).await;
    create(&app, &admin, profile_body("B", "Beta", "b@example.org", "Berlin", "Germany")).await;

    let (status, facets) = app.get("/api/facets", &admin).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(facets["countries"], json!(["France", "Germany"]));
    assert_eq!(facets["graduation_years"], json!([2015]));
}

// ========================================
// Map and geocoding
// ========================================

#[tokio::test]
async fn test_markers_group_colocated_profiles() {
    let app = TestApp::new().await;
    let admin = admin_token();
    create(&app, &admin, profile_body("A", "Alpha", "a@example.org", "Paris", "France")).await;
    create(&app, &admin, profile_body("B", "Beta", "b@example.org", "Paris", "France")).await;
    create(&app, &admin, profile_body("C", "Gamma", "c@example.org", "Berlin", "Germany")).await;
    create(&app, &admin, profile_body("D", "Delta", "d@example.org", "Atlantis", "Nowhere")).await;

    let (status, markers) = app.get("/api/map/markers", &admin).await;
    assert_eq!(status, StatusCode::OK);
    let markers = markers.as_array().unwrap();
    assert_eq!(markers.len(), 2);

    let paris = markers.iter().find(|m| m["label"] == "Paris, France").unwrap();
    assert_eq!(paris["count"], 2);
    assert_eq!(paris["profiles"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_geocode_endpoint_falls_back() {
    let app = TestApp::new().await;
    let (status, body) = app
        .post("/api/geocode", &member_token(1), json!({ "city": "Boston", "state": "MA" }))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["query"], "Boston, MA, USA");
    assert_eq!(body["attempt"], 2);
}

#[tokio::test]
async fn test_geocode_endpoint_error_statuses() {
    let app = TestApp::new().await;
    let member = member_token(1);

    let (status, _) = app.post("/api/geocode", &member, json!({ "country": "France" })).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, _) = app.post("/api/geocode", &member, json!({ "city": "Atlantis" })).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let rejected = TestApp::with_geocoder(TableGeocoder::failing(GeocodeError::Unauthorized)).await;
    let (status, _) = rejected
        .post("/api/geocode", &member, json!({ "city": "Paris", "country": "France" }))
        .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
}

// ========================================
// Admin console
// ========================================

#[tokio::test]
async fn test_admin_routes_forbidden_for_members() {
    let app = TestApp::new().await;
    for uri in ["/api/admin/users", "/api/admin/jobs", "/api/admin/email/log"] {
        let (status, _) = app.get(uri, &member_token(1)).await;
        assert_eq!(status, StatusCode::FORBIDDEN, "{}", uri);
    }
}

#[tokio::test]
async fn test_role_changes() {
    let app = TestApp::new().await;
    let admin = admin_token();
    let member = member_token(1);

    // Both users sign in once
    app.get("/api/profiles", &member).await;
    let (_, users) = app.get("/api/admin/users", &admin).await;
    assert_eq!(users.as_array().unwrap().len(), 2);

    let (status, _) = app
        .put("/api/admin/users/admin-1/role", &admin, json!({ "role": "member" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, user) = app
        .put("/api/admin/users/member-1/role", &admin, json!({ "role": "admin" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(user["role"], "admin");

    let (status, _) = app.get("/api/admin/users", &member).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .put("/api/admin/users/nobody/role", &admin, json!({ "role": "admin" }))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_batch_geocode_job_runs_to_completion() {
    let app = TestApp::new().await;
    let admin = admin_token();

    // Imported rows stay pending until a batch runs
    let csv = "first_name,last_name,email,city,country\n\
               Ada,Lovelace,ada@example.org,Paris,France\n\
               Alan,Turing,alan@example.org,Atlantis,Nowhere\n";
    let (status, report) = app
        .post("/api/admin/import", &admin, json!({ "format": "csv", "content": csv }))
        .await;
    assert_eq!(status, StatusCode::OK, "{}", report);
    assert_eq!(report["inserted"], 2);

    let (status, started) = app
        .post("/api/admin/geocode/batch", &admin, json!({ "scope": "pending" }))
        .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(started["total"], 2);

    let job = app.wait_for_job(started["job_id"].as_str().unwrap(), &admin).await;
    assert_eq!(job["state"], "completed");
    assert_eq!(job["processed"], 2);
    assert_eq!(job["succeeded"], 1);
    assert_eq!(job["failed"], 1);

    let (_, markers) = app.get("/api/map/markers", &admin).await;
    assert_eq!(markers.as_array().unwrap().len(), 1);

    let (_, jobs) = app.get("/api/admin/jobs?kind=regeocode", &admin).await;
    assert_eq!(jobs.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_batch_geocode_rejected_token_fails_job() {
    let app = TestApp::with_geocoder(TableGeocoder::failing(GeocodeError::Unauthorized)).await;
    let admin = admin_token();
    let csv = "first_name,last_name,email,city,country\nAda,Lovelace,ada@example.org,Paris,France\n";
    app.post("/api/admin/import", &admin, json!({ "format": "csv", "content": csv }))
        .await;

    let (status, started) = app.post("/api/admin/geocode/batch", &admin, json!({})).await;
    assert_eq!(status, StatusCode::ACCEPTED);

    let job = app.wait_for_job(started["job_id"].as_str().unwrap(), &admin).await;
    assert_eq!(job["state"], "failed");
    assert!(job["error"].as_str().unwrap().contains("rejected the access token"));
}

#[tokio::test]
async fn test_batch_geocode_rejects_bad_requests() {
    let app = TestApp::new().await;
    let admin = admin_token();

    let (status, body) = app
        .post("/api/admin/geocode/batch", &admin, json!({ "scope": "bogus" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");

    let (status, _) = app
        .post("/api/admin/geocode/batch", &admin, json!({ "limit": "ten" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Nothing was started
    let (_, jobs) = app.get("/api/admin/jobs", &admin).await;
    assert!(jobs.as_array().unwrap().is_empty());

    // An empty body means the default scope
    let (status, started) = app
        .request(Method::POST, "/api/admin/geocode/batch", Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    app.wait_for_job(started["job_id"].as_str().unwrap(), &admin).await;
}

#[tokio::test]
async fn test_cancel_unknown_or_finished_job() {
    let app = TestApp::new().await;
    let admin = admin_token();

    let (status, _) = app.post("/api/admin/jobs/missing/cancel", &admin, json!({})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, started) = app.post("/api/admin/geocode/batch", &admin, json!({})).await;
    let job_id = started["job_id"].as_str().unwrap().to_string();
    app.wait_for_job(&job_id, &admin).await;

    let (status, _) = app
        .post(&format!("/api/admin/jobs/{}/cancel", job_id), &admin, json!({}))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_import_update_keeps_fields_not_in_file() {
    let app = TestApp::new().await;
    let admin = admin_token();
    let mut body = profile_body("Ada", "Lovelace", "ada@example.org", "Paris", "France");
    body["company"] = json!("Analytical Engines");
    body["bio"] = json!("First programmer");
    let created = create(&app, &admin, body).await;

    let csv = "first_name,last_name,email,graduation_year
Ada,Lovelace,ada@example.org,2016
";
    let (status, report) = app
        .post("/api/admin/import", &admin, json!({ "format": "csv", "content": csv }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["updated"], 1);

    let id = created["id"].as_str().unwrap();
    let (_, ada) = app.get(&format!("/api/profiles/{}", id), &admin).await;
    assert_eq!(ada["graduation_year"], 2016);
    assert_eq!(ada["company"], "Analytical Engines");
    assert_eq!(ada["bio"], "First programmer");
    assert_eq!(ada["industry"], "Software");
    assert_eq!(ada["geocode_status"], "ok");
}

#[tokio::test]
async fn test_import_reports_row_errors_without_writing() {
    let app = TestApp::new().await;
    let admin = admin_token();
    let csv = "First Name,Last Name,Email\n\
               Ada,Lovelace,ada@example.org\n\
               ,Nobody,nobody@example.org\n";

    let (status, report) = app
        .post("/api/admin/import", &admin, json!({ "format": "csv", "content": csv }))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(report["total_rows"], 2);
    assert_eq!(report["inserted"], 0);
    assert_eq!(report["errors"][0]["row"], 2);

    let (_, list) = app.get("/api/profiles", &admin).await;
    assert_eq!(list["total_results"], 0);
}

#[tokio::test]
async fn test_import_dry_run_then_export() {
    let app = TestApp::new().await;
    let admin = admin_token();
    let rows = json!([
        { "firstName": "Ada", "lastName": "Lovelace", "email": "ada@example.org", "city": "Paris" }
    ]);

    let (status, report) = app
        .post(
            "/api/admin/import",
            &admin,
            json!({ "format": "json", "content": rows.to_string(), "dry_run": true }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", report);
    assert_eq!(report["inserted"], 1);
    assert_eq!(report["dry_run"], true);
    let (_, list) = app.get("/api/profiles", &admin).await;
    assert_eq!(list["total_results"], 0);

    app.post("/api/admin/import", &admin, json!({ "format": "json", "content": rows.to_string() }))
        .await;
    let (status, csv) = app
        .request_text(Method::GET, "/api/admin/export.csv", Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let mut lines = csv.lines();
    assert!(lines.next().unwrap().starts_with("id,"));
    assert!(lines.next().unwrap().contains("ada@example.org"));
}

#[tokio::test]
async fn test_email_preview_renders_variables() {
    let app = TestApp::new().await;
    let admin = admin_token();
    let profile = create(&app, &admin, profile_body("Ada", "Lovelace", "ada@example.org", "Paris", "France")).await;

    let (status, preview) = app
        .post(
            "/api/admin/email/preview",
            &admin,
            json!({
                "subject": "Hello {{first_name}}",
                "body": "Class of {{graduation_year}}",
                "profile_id": profile["id"]
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", preview);
    assert_eq!(preview["recipient"], "ada@example.org");
    assert_eq!(preview["subject"], "Hello Ada");
    assert_eq!(preview["text"], "Class of 2015");

    let (status, body) = app
        .post(
            "/api/admin/email/preview",
            &admin,
            json!({ "subject": "Hi {{nickname}}", "body": "x", "profile_id": profile["id"] }),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["fields"][0]["field"], "subject");
}

#[tokio::test]
async fn test_bulk_email_skips_opted_out() {
    let app = TestApp::new().await;
    let admin = admin_token();
    create(&app, &admin, profile_body("Ada", "Lovelace", "ada@example.org", "Paris", "France")).await;
    let mut opted_out = profile_body("Bob", "Quiet", "bob@example.org", "Paris", "France");
    opted_out["email_opt_out"] = json!(true);
    create(&app, &admin, opted_out).await;

    let (status, sent) = app
        .post(
            "/api/admin/email/send",
            &admin,
            json!({ "subject": "News", "body": "Hi {{first_name}}", "filters": { "country": "France" } }),
        )
        .await;
    assert_eq!(status, StatusCode::ACCEPTED, "{}", sent);
    assert_eq!(sent["recipients"], 1);

    let job_id = sent["job_id"].as_str().unwrap();
    let job = app.wait_for_job(job_id, &admin).await;
    assert_eq!(job["state"], "completed");
    assert_eq!(app.email.sent_count(), 1);

    let (_, log) = app
        .get(&format!("/api/admin/email/log?job_id={}", job_id), &admin)
        .await;
    let log = log.as_array().unwrap();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0]["recipient"], "ada@example.org");
    assert_eq!(log[0]["status"], "sent");
}

#[tokio::test]
async fn test_bulk_email_without_recipients() {
    let app = TestApp::new().await;
    let (status, _) = app
        .post(
            "/api/admin/email/send",
            &admin_token(),
            json!({ "subject": "News", "body": "Hello", "filters": { "country": "Mars" } }),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

// ========================================
// Event stream
// ========================================

#[tokio::test]
async fn test_event_stream_forwards_events() {
    let app = TestApp::new().await;
    let request = Request::builder()
        .uri("/api/admin/events")
        .header(header::AUTHORIZATION, format!("Bearer {}", admin_token()))
        .body(Body::empty())
        .unwrap();

    let response = app.router().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers()[header::CONTENT_TYPE]
        .to_str()
        .unwrap()
        .starts_with("text/event-stream"));

    app.state.event_bus.emit_lossy(AppEvent::JobStarted {
        job_id: "job-1".to_string(),
        kind: JobKind::Regeocode,
        total: 3,
        timestamp: chrono::Utc::now(),
    });

    let mut body = response.into_body();
    let mut text = String::new();
    while !text.contains("\n\n") {
        let frame = tokio::time::timeout(Duration::from_secs(5), body.frame())
            .await
            .expect("no SSE frame within 5s")
            .expect("stream ended")
            .unwrap();
        if let Ok(data) = frame.into_data() {
            text.push_str(&String::from_utf8_lossy(&data));
        }
    }

    assert!(text.contains("event: JobStarted"), "frame: {}", text);
    let data = text
        .lines()
        .find_map(|line| line.strip_prefix("data: "))
        .unwrap();
    let event: Value = serde_json::from_str(data).unwrap();
    assert_eq!(event["type"], "JobStarted");
    assert_eq!(event["job_id"], "job-1");
    assert_eq!(event["total"], 3);
}

#[tokio::test]
async fn test_event_stream_is_admin_only() {
    let app = TestApp::new().await;
    let (status, _) = app.get("/api/admin/events", &member_token(1)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}
