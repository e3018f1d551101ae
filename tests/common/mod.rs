//! Shared setup for the portal integration tests.
//!
//! Every test gets its own temporary SQLite file with the portal schema, one
//! admin, two candidates and a schedule for batch `B1` / subject `ENG`.
#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use chrono::Utc;
use serde_json::Value;
use sqlx::SqlitePool;
use std::sync::Arc;
use tower::util::ServiceExt;

use exam_audio_portal::auth::{self, AccountKind};
use exam_audio_portal::config::PortalConfig;
use exam_audio_portal::constants::CANDIDATE_ROLE;
use exam_audio_portal::queries::{candidates, schedule};
use exam_audio_portal::serve::{router, AppState};
use exam_audio_portal::tables::{self, ImportMode};

pub const ADMIN_ROLE: &str = "superadmin";
pub const ADMIN_PASSWORD: &str = "admin-secret";
pub const CANDIDATE_ID: &str = "C1001";
pub const OTHER_CANDIDATE_ID: &str = "C1002";
pub const CANDIDATE_PASSWORD: &str = "cand-pass";
pub const DURATION: f64 = 300.0;
pub const FALLBACK_LINK: &str = "https://cdn.test/done.mp3";

pub const LINK_1: &str = "https://cdn.test/b1/eng/passage1.mp3";
pub const LINK_2: &str = "https://cdn.test/b1/eng/passage2.mp3";
pub const COUNTDOWN_LINK: &str = "https://cdn.test/b1/eng/countdown.mp3";
pub const TRIAL_LINK: &str = "https://cdn.test/b1/eng/trial.mp3";
pub const TEST_AUDIO_LINK: &str = "https://cdn.test/b1/eng/soundcheck.mp3";

pub struct TestPortal {
    pub app: Router,
    pub pool: SqlitePool,
    pub config: PortalConfig,
    pub admin_id: i64,
    _guard: tempfile::TempDir,
}

/// Default configuration for tests; cheap bcrypt cost keeps them fast
pub fn test_config() -> PortalConfig {
    let mut config = PortalConfig::with_secret("integration-test-secret-0123456789");
    config.bcrypt_cost = 4;
    config.fallback_link = FALLBACK_LINK.to_string();
    config
}

pub async fn setup_portal() -> TestPortal {
    setup_portal_with(test_config()).await
}

pub async fn setup_portal_with(config: PortalConfig) -> TestPortal {
    let (pool, guard) = exam_audio_portal::db::create_test_connection_in_temporary_file()
        .await
        .unwrap();
    exam_audio_portal::db::init_database_schema(&pool)
        .await
        .unwrap();

    let admin_id = auth::create_admin(&pool, &config, ADMIN_ROLE, ADMIN_PASSWORD)
        .await
        .unwrap();

    // Candidates keep plaintext passwords, as after a CSV import
    for user_id in [CANDIDATE_ID, OTHER_CANDIDATE_ID] {
        let sql = candidates::insert(user_id, CANDIDATE_PASSWORD, "B1", "ENG", "CTR1", Some(DURATION));
        sqlx::query(&sql).execute(&pool).await.unwrap();
    }

    let sql = schedule::insert_links(
        "B1",
        "ENG",
        LINK_1,
        LINK_2,
        COUNTDOWN_LINK,
        TRIAL_LINK,
        TEST_AUDIO_LINK,
    );
    sqlx::query(&sql).execute(&pool).await.unwrap();

    tables::import_csv(
        &pool,
        "center",
        b"center_code,Center_name\nCTR1,Main Hall\n",
        ImportMode::Append,
    )
    .await
    .unwrap();

    let app = router(Arc::new(AppState {
        pool: pool.clone(),
        config: config.clone(),
    }));

    TestPortal {
        app,
        pool,
        config,
        admin_id,
        _guard: guard,
    }
}

impl TestPortal {
    pub fn admin_token(&self) -> String {
        auth::issue_token(
            &self.config,
            &self.admin_id.to_string(),
            ADMIN_ROLE,
            AccountKind::Admin,
            Utc::now(),
        )
        .unwrap()
    }

    pub fn candidate_token(&self, user_id: &str) -> String {
        auth::issue_token(
            &self.config,
            user_id,
            CANDIDATE_ROLE,
            AccountKind::Candidate,
            Utc::now(),
        )
        .unwrap()
    }

    /// Send a request and return the status with the parsed JSON body
    /// (`Value::Null` when the body is empty or not JSON)
    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.send(json_request("GET", uri, token, None)).await
    }

    pub async fn put_json(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.send(json_request("PUT", uri, token, Some(body))).await
    }

    pub async fn post_json(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.send(json_request("POST", uri, token, Some(body))).await
    }
}

/// Build a request with an optional bearer token and JSON body
pub fn json_request(method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

/// Build a multipart CSV upload with the file in `field`
pub fn csv_upload(uri: &str, token: &str, field: &str, csv: &str) -> Request<Body> {
    let boundary = "portal-test-boundary";
    let body = format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"{f}\"; filename=\"data.csv\"\r\n\
         Content-Type: text/csv\r\n\r\n{csv}\r\n--{b}--\r\n",
        b = boundary,
        f = field,
        csv = csv
    );
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", boundary),
        )
        .body(Body::from(body))
        .unwrap()
}
