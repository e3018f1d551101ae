//! # Candidate Report Tests
//!
//! The report joins exuser with schedule, center and logs. Lookups that do
//! not match must leave nulls instead of dropping the candidate.

mod common;

use axum::http::StatusCode;
use chrono::{TimeZone, Utc};

use common::*;
use exam_audio_portal::playback;
use exam_audio_portal::queries::candidates;
use exam_audio_portal::report::candidate_report;
use exam_audio_portal::stage::Stage;

#[tokio::test]
async fn test_report_joins_schedule_center_and_logs() {
    let portal = setup_portal().await;
    let at = Utc.with_ymd_and_hms(2024, 3, 1, 6, 30, 0).unwrap();
    playback::deliver_stage(&portal.pool, &portal.config, Stage::Passage1, CANDIDATE_ID, at)
        .await
        .unwrap();
    playback::update_position(&portal.pool, Stage::Passage1, CANDIDATE_ID, 75.0)
        .await
        .unwrap();

    let report = candidate_report(&portal.pool).await.unwrap();
    assert_eq!(report.len(), 2);

    let row = report.iter().find(|r| r.user_id == CANDIDATE_ID).unwrap();
    assert_eq!(row.batch_code.as_deref(), Some("B1"));
    assert_eq!(row.center_name.as_deref(), Some("Main Hall"));
    assert_eq!(row.passage1_position, Some(75.0));
    assert_eq!(row.duration, Some(DURATION));
    assert_eq!(row.passage1_at.as_deref(), Some("01/03/2024, 12:00:00 PM"));
    assert_eq!(row.passage2_at, None);
    assert!(!row.started);

    // No logs row yet for the other candidate
    let other = report.iter().find(|r| r.user_id == OTHER_CANDIDATE_ID).unwrap();
    assert_eq!(other.passage1_at, None);
    assert_eq!(other.center_name.as_deref(), Some("Main Hall"));
}

#[tokio::test]
async fn test_report_keeps_candidates_without_schedule_or_center() {
    let portal = setup_portal().await;
    let sql = candidates::insert("C0001", "pw", "B7", "HIN", "CTR9", None);
    sqlx::query(&sql).execute(&portal.pool).await.unwrap();

    let report = candidate_report(&portal.pool).await.unwrap();
    assert_eq!(report.len(), 3);
    // Ordered by user id
    assert_eq!(report[0].user_id, "C0001");
    assert_eq!(report[0].center_name, None);
    assert_eq!(report[0].batch_date, None);
    assert_eq!(report[0].duration, None);
}

#[tokio::test]
async fn test_report_route_is_admin_only() {
    let portal = setup_portal().await;

    let (status, body) = portal.get("/api/report", Some(&portal.admin_token())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 2);
    assert_eq!(body[0]["user_id"], CANDIDATE_ID);

    let (status, _) = portal
        .get("/api/report", Some(&portal.candidate_token(CANDIDATE_ID)))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}
