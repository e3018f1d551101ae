//! Stage-gated audio delivery and resume-position tracking.
//!
//! A single procedure serves every [`Stage`]: look the candidate up, find the
//! stage's link in their batch schedule, decide between the real link and the
//! fallback, then stamp the first access. The stage only decides which
//! columns are read and written.

use chrono::{DateTime, Utc};
use log::{debug, info};
use serde::Serialize;
use serde_json::Value;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use crate::activity::record_first_access;
use crate::config::PortalConfig;
use crate::error::{ApiError, ApiResult};
use crate::queries::{candidates, schedule};
use crate::schema::Schedule;
use crate::stage::{Activity, Stage};

/// What a candidate receives when asking for a stage
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageDelivery {
    pub stage: Stage,
    pub link: String,
    /// Resume offset; absent when the fallback link is returned
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<f64>,
    /// The stage was already played to the end
    pub completed: bool,
    /// `link` is sealed with the shared link key
    pub sealed: bool,
}

/// Sound-check asset of a batch; not gated by progress
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TestAudioDelivery {
    pub link: String,
    pub sealed: bool,
}

/// Per-candidate progress as stored in exuser
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CandidateProgress {
    pub user_id: String,
    pub batch_code: Option<String>,
    pub subject_code: Option<String>,
    pub center_code: Option<String>,
    pub started: bool,
    pub logged_in: bool,
    pub duration: Option<f64>,
    pub countdown_position: Option<f64>,
    pub trial_position: Option<f64>,
    pub passage1_position: Option<f64>,
    pub passage2_position: Option<f64>,
}

/// Interpret a stored flag; tables imported from CSV hold "TRUE"/"FALSE" text
pub fn parse_flag(value: Option<&str>) -> bool {
    match value.map(str::trim) {
        Some(v) => {
            v.eq_ignore_ascii_case("true")
                || v.eq_ignore_ascii_case("yes")
                || v.parse::<f64>().map(|n| n != 0.0).unwrap_or(false)
        }
        None => false,
    }
}

/// Interpret a stored duration or position; blank and non-numeric cells are unknown
pub fn parse_number(value: Option<&str>) -> Option<f64> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .and_then(|v| v.parse::<f64>().ok())
        .filter(|n| n.is_finite())
}

/// Read a column selected with `CAST(.. AS TEXT)` as a number
pub fn number_column(row: &SqliteRow, column: &str) -> sqlx::Result<Option<f64>> {
    let text: Option<String> = row.try_get(column)?;
    Ok(parse_number(text.as_deref()))
}

/// True once a started candidate's position has reached the stage duration
pub fn is_stage_consumed(started: bool, position: Option<f64>, duration: Option<f64>) -> bool {
    match (position, duration) {
        (Some(position), Some(duration)) => started && position >= duration,
        _ => false,
    }
}

fn seal_link(config: &PortalConfig, link: String) -> ApiResult<(String, bool)> {
    match config.link_cipher() {
        Some(cipher) => Ok((cipher.seal(&link)?, true)),
        None => Ok((link, false)),
    }
}

async fn batch_link(
    pool: &SqlitePool,
    batch_code: Option<String>,
    subject_code: Option<String>,
    column: Schedule,
) -> ApiResult<String> {
    let (Some(batch_code), Some(subject_code)) = (batch_code, subject_code) else {
        return Err(ApiError::NotFound("Audio link not found".to_string()));
    };
    let link: Option<Option<String>> =
        sqlx::query_scalar(&schedule::select_link(&batch_code, &subject_code, column))
            .fetch_optional(pool)
            .await?;
    link.flatten()
        .filter(|l| !l.trim().is_empty())
        .ok_or_else(|| ApiError::NotFound("Audio link not found".to_string()))
}

/// Decide which link `user_id` gets for `stage` and stamp the first access
pub async fn deliver_stage(
    pool: &SqlitePool,
    config: &PortalConfig,
    stage: Stage,
    user_id: &str,
    now: DateTime<Utc>,
) -> ApiResult<StageDelivery> {
    let row = sqlx::query(&candidates::select_stage_state(user_id, stage))
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    let batch_code: Option<String> = row.try_get("batch_code")?;
    let subject_code: Option<String> = row.try_get("subject_code")?;
    let status: Option<String> = row.try_get("status")?;
    let position = number_column(&row, "position")?;
    let duration = number_column(&row, "duration")?;

    let link = batch_link(pool, batch_code, subject_code, stage.link_column()).await?;

    let started = parse_flag(status.as_deref());
    let delivery = if is_stage_consumed(started, position, duration) {
        debug!("Stage {} already consumed by {}", stage, user_id);
        StageDelivery {
            stage,
            link: config.fallback_link.clone(),
            position: None,
            completed: true,
            sealed: false,
        }
    } else {
        let (link, sealed) = seal_link(config, link)?;
        StageDelivery {
            stage,
            link,
            position,
            completed: false,
            sealed,
        }
    };

    record_first_access(pool, config, user_id, stage.activity(), now).await?;
    Ok(delivery)
}

/// Return the batch's sound-check link and stamp the first access
pub async fn deliver_test_audio(
    pool: &SqlitePool,
    config: &PortalConfig,
    user_id: &str,
    now: DateTime<Utc>,
) -> ApiResult<TestAudioDelivery> {
    let row = sqlx::query(&candidates::select_batch(user_id))
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;
    let link = batch_link(
        pool,
        row.try_get("batch_code")?,
        row.try_get("subject_code")?,
        Schedule::Testaudio,
    )
    .await?;

    let (link, sealed) = seal_link(config, link)?;
    record_first_access(pool, config, user_id, Activity::TestAudio, now).await?;
    Ok(TestAudioDelivery { link, sealed })
}

/// Parse a resume-position request body.
///
/// Accepts `{"position": n}`, `{"last_played_position": n}` or a bare number,
/// where `n` is a JSON number or a numeric string.
pub fn parse_position_body(body: &[u8]) -> ApiResult<f64> {
    let value: Value = serde_json::from_slice(body)
        .map_err(|e| ApiError::InvalidArgument(format!("Invalid JSON body: {}", e)))?;

    let raw = match &value {
        Value::Object(map) => map
            .get("position")
            .or_else(|| map.get("last_played_position"))
            .ok_or_else(|| ApiError::InvalidArgument("position is required".to_string()))?,
        other => other,
    };

    let position = match raw {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|p| p.is_finite() && *p >= 0.0)
    .ok_or_else(|| ApiError::InvalidArgument("position must be a non-negative number".to_string()))?;

    Ok(position)
}

/// Overwrite the resume position of `stage`
pub async fn update_position(
    pool: &SqlitePool,
    stage: Stage,
    user_id: &str,
    position: f64,
) -> ApiResult<()> {
    let result = sqlx::query(&candidates::update_position(user_id, stage, position))
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound("User not found".to_string()));
    }
    debug!("Position of {} for {} set to {}", stage, user_id, position);
    Ok(())
}

/// Flag the candidate as having started the exam
///
/// Does not check that any stage was actually played to the end.
pub async fn mark_started(pool: &SqlitePool, user_id: &str) -> ApiResult<()> {
    let result = sqlx::query(&candidates::update_status(user_id, true))
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound("User not found".to_string()));
    }
    info!("Candidate {} marked as started", user_id);
    Ok(())
}

pub async fn candidate_progress(pool: &SqlitePool, user_id: &str) -> ApiResult<CandidateProgress> {
    let row = sqlx::query(&candidates::select_progress(user_id))
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    let status: Option<String> = row.try_get("status")?;
    let login: Option<String> = row.try_get("login")?;
    Ok(CandidateProgress {
        user_id: user_id.to_string(),
        batch_code: row.try_get("batch_code")?,
        subject_code: row.try_get("subject_code")?,
        center_code: row.try_get("center_code")?,
        started: parse_flag(status.as_deref()),
        logged_in: parse_flag(login.as_deref()),
        duration: number_column(&row, "duration")?,
        countdown_position: number_column(&row, Stage::Countdown.as_str())?,
        trial_position: number_column(&row, Stage::Trial.as_str())?,
        passage1_position: number_column(&row, Stage::Passage1.as_str())?,
        passage2_position: number_column(&row, Stage::Passage2.as_str())?,
    })
}
