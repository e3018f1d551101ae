//! # Login and Access Control Tests
//!
//! Covers the dual-table login, the candidate login policy, logout, legacy
//! password upgrades and the admin-only routes.
//!
//! ## Running the Tests
//!
//! ```bash
//! cargo test --test auth_test
//! ```

mod common;

use axum::http::{header, Request, StatusCode};
use axum::body::Body;
use serde_json::json;
use sqlx::Row;
use tower::util::ServiceExt;

use common::*;
use exam_audio_portal::activity::activity_timestamp;
use exam_audio_portal::auth::{self, AccountKind};
use exam_audio_portal::config::LoginPolicy;
use exam_audio_portal::playback;
use exam_audio_portal::stage::Activity;

async fn stored_candidate_password(portal: &TestPortal, user_id: &str) -> String {
    sqlx::query("SELECT password FROM exuser WHERE user_id = ?")
        .bind(user_id)
        .fetch_one(&portal.pool)
        .await
        .unwrap()
        .get("password")
}

#[tokio::test]
async fn test_admin_login_issues_token_with_role() {
    let portal = setup_portal().await;

    let request = json_request(
        "POST",
        "/api/login",
        None,
        Some(json!({ "user_id": portal.admin_id.to_string(), "password": ADMIN_PASSWORD })),
    );
    let response = portal.app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let cookies: Vec<String> = response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .map(|v| v.to_str().unwrap().to_string())
        .collect();
    assert_eq!(cookies.len(), 1, "admins only get the session cookie");
    assert!(cookies[0].starts_with("authToken="));
    assert!(cookies[0].contains("HttpOnly"));
    assert!(cookies[0].contains("SameSite=Lax"));

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["role"], ADMIN_ROLE);
    assert_eq!(body["kind"], "admin");

    let claims = auth::decode_token(&portal.config, body["token"].as_str().unwrap()).unwrap();
    assert_eq!(claims.sub, portal.admin_id.to_string());
    assert_eq!(claims.role, ADMIN_ROLE);
    assert_eq!(claims.kind, AccountKind::Admin);
}

#[tokio::test]
async fn test_numeric_user_id_is_accepted() {
    let portal = setup_portal().await;
    let (status, body) = portal
        .post_json(
            "/api/login",
            None,
            json!({ "user_id": portal.admin_id, "password": ADMIN_PASSWORD }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["kind"], "admin");
}

#[tokio::test]
async fn test_bad_credentials_share_one_message() {
    let portal = setup_portal().await;

    let attempts = [
        json!({ "user_id": "nobody", "password": "x" }),
        json!({ "user_id": CANDIDATE_ID, "password": "wrong" }),
        json!({ "user_id": portal.admin_id.to_string(), "password": "wrong" }),
    ];
    for attempt in attempts {
        let (status, body) = portal.post_json("/api/login", None, attempt.clone()).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{}", attempt);
        assert_eq!(body["error"], "Invalid credentials");
    }
}

#[tokio::test]
async fn test_missing_credentials_are_rejected() {
    let portal = setup_portal().await;
    let (status, _) = portal
        .post_json("/api/login", None, json!({ "user_id": CANDIDATE_ID }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = portal
        .post_json("/api/login", None, json!({ "password": "x" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unreadable_login_body_uses_error_envelope() {
    let portal = setup_portal().await;

    let requests = [
        Request::builder()
            .method("POST")
            .uri("/api/login")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{\"user_id\": "))
            .unwrap(),
        Request::builder()
            .method("POST")
            .uri("/api/login")
            .header(header::CONTENT_TYPE, "text/plain")
            .body(Body::from("user_id=C1001"))
            .unwrap(),
        Request::builder()
            .method("POST")
            .uri("/api/login")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("[1, 2]"))
            .unwrap(),
    ];
    for request in requests {
        let (status, body) = portal.send(request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string(), "{}", body);
    }
}

#[tokio::test]
async fn test_candidate_login_sets_flag_cookie_and_timestamp() {
    let portal = setup_portal().await;

    let request = json_request(
        "POST",
        "/api/login",
        None,
        Some(json!({ "user_id": CANDIDATE_ID, "password": CANDIDATE_PASSWORD })),
    );
    let response = portal.app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let cookies: Vec<String> = response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .map(|v| v.to_str().unwrap().to_string())
        .collect();
    assert!(cookies.iter().any(|c| c.starts_with("authToken=")));
    assert!(cookies
        .iter()
        .any(|c| c.starts_with(&format!("user_id={};", CANDIDATE_ID))));

    let progress = playback::candidate_progress(&portal.pool, CANDIDATE_ID)
        .await
        .unwrap();
    assert!(progress.logged_in);
    assert!(activity_timestamp(&portal.pool, CANDIDATE_ID, Activity::Login)
        .await
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn test_legacy_plaintext_password_is_upgraded() {
    let portal = setup_portal().await;
    assert_eq!(stored_candidate_password(&portal, CANDIDATE_ID).await, CANDIDATE_PASSWORD);

    let (status, _) = portal
        .post_json(
            "/api/login",
            None,
            json!({ "user_id": CANDIDATE_ID, "password": CANDIDATE_PASSWORD }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let stored = stored_candidate_password(&portal, CANDIDATE_ID).await;
    assert!(auth::is_bcrypt_hash(&stored));
    assert!(bcrypt::verify(CANDIDATE_PASSWORD, &stored).unwrap());
}

#[tokio::test]
async fn test_single_session_rejects_second_login() {
    let portal = setup_portal().await;
    let credentials = json!({ "user_id": CANDIDATE_ID, "password": CANDIDATE_PASSWORD });

    let (status, _) = portal.post_json("/api/login", None, credentials.clone()).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = portal.post_json("/api/login", None, credentials.clone()).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "User is already logged in elsewhere");
}

#[tokio::test]
async fn test_allow_concurrent_accepts_second_login() {
    let mut config = test_config();
    config.login_policy = LoginPolicy::AllowConcurrent;
    let portal = setup_portal_with(config).await;
    let credentials = json!({ "user_id": CANDIDATE_ID, "password": CANDIDATE_PASSWORD });

    let (status, _) = portal.post_json("/api/login", None, credentials.clone()).await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = portal.post_json("/api/login", None, credentials).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["kind"], "candidate");
}

#[tokio::test]
async fn test_logout_clears_flag_and_allows_login_again() {
    let portal = setup_portal().await;
    let credentials = json!({ "user_id": CANDIDATE_ID, "password": CANDIDATE_PASSWORD });

    let (_, body) = portal.post_json("/api/login", None, credentials.clone()).await;
    let token = body["token"].as_str().unwrap().to_string();

    let (status, body) = portal
        .post_json("/api/logout", Some(&token), json!({ "user_id": CANDIDATE_ID }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert!(activity_timestamp(&portal.pool, CANDIDATE_ID, Activity::Logout)
        .await
        .unwrap()
        .is_some());

    let (status, _) = portal.post_json("/api/login", None, credentials).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_candidate_cannot_log_out_someone_else() {
    let portal = setup_portal().await;
    let token = portal.candidate_token(CANDIDATE_ID);
    let (status, _) = portal
        .post_json("/api/logout", Some(&token), json!({ "user_id": OTHER_CANDIDATE_ID }))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_admin_routes_require_admin_token() {
    let portal = setup_portal().await;

    let (status, _) = portal.get("/api/tables", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let candidate = portal.candidate_token(CANDIDATE_ID);
    for uri in ["/api/tables", "/api/users", "/api/report", "/api/table-data/exuser"] {
        let (status, _) = portal.get(uri, Some(&candidate)).await;
        assert_eq!(status, StatusCode::FORBIDDEN, "{}", uri);
    }

    let (status, _) = portal.get("/api/tables", Some(&portal.admin_token())).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_session_cookie_is_accepted() {
    let portal = setup_portal().await;
    let request = Request::builder()
        .method("GET")
        .uri("/api/tables")
        .header(header::COOKIE, format!("theme=dark; authToken={}", portal.admin_token()))
        .body(Body::empty())
        .unwrap();
    let (status, body) = portal.send(request).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["tables"].is_array());
}

#[tokio::test]
async fn test_admin_user_management() {
    let portal = setup_portal().await;
    let admin = portal.admin_token();

    let (status, body) = portal
        .post_json(
            "/api/users",
            Some(&admin),
            json!({ "role": "proctor", "password": "proctor-pass" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let new_id = body["user_id"].as_i64().unwrap();
    assert_ne!(new_id, portal.admin_id);

    let (status, body) = portal.get("/api/users", Some(&admin)).await;
    assert_eq!(status, StatusCode::OK);
    let users = body.as_array().unwrap();
    assert_eq!(users.len(), 2);
    assert!(users.iter().all(|u| u.get("password").is_none()));
    assert!(users.iter().any(|u| u["role"] == "proctor"));

    let (status, body) = portal
        .post_json(
            "/api/login",
            None,
            json!({ "user_id": new_id, "password": "proctor-pass" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["role"], "proctor");

    let (status, _) = portal
        .post_json("/api/users", Some(&admin), json!({ "role": "proctor" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_hash_passwords_upgrades_every_plaintext_value() {
    let portal = setup_portal().await;
    let upgraded = auth::upgrade_plaintext_passwords(&portal.pool, &portal.config)
        .await
        .unwrap();
    // Both candidates; the admin was created hashed
    assert_eq!(upgraded, 2);
    assert!(auth::is_bcrypt_hash(&stored_candidate_password(&portal, OTHER_CANDIDATE_ID).await));

    let again = auth::upgrade_plaintext_passwords(&portal.pool, &portal.config)
        .await
        .unwrap();
    assert_eq!(again, 0);
}

#[tokio::test]
async fn test_health_needs_no_token() {
    let portal = setup_portal().await;
    let (status, body) = portal.get("/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}
