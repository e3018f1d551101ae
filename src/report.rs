use serde::Serialize;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use crate::error::ApiResult;
use crate::playback::{number_column, parse_flag};
use crate::queries::report;
use crate::stage::Stage;

/// One candidate with schedule, center and activity details joined in
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CandidateReport {
    pub user_id: String,
    pub batch_code: Option<String>,
    pub subject_code: Option<String>,
    pub center_code: Option<String>,
    pub center_name: Option<String>,
    pub batch_date: Option<String>,
    pub batch_time: Option<String>,
    pub subject_language: Option<String>,
    pub subject_speed: Option<String>,
    pub started: bool,
    pub logged_in: bool,
    pub duration: Option<f64>,
    pub countdown_position: Option<f64>,
    pub trial_position: Option<f64>,
    pub passage1_position: Option<f64>,
    pub passage2_position: Option<f64>,
    pub login_at: Option<String>,
    pub logout_at: Option<String>,
    pub information_at: Option<String>,
    pub instruction_at: Option<String>,
    pub testaudio_at: Option<String>,
    pub countdown_at: Option<String>,
    pub trial_passage_at: Option<String>,
    pub passage1_at: Option<String>,
    pub passage2_at: Option<String>,
}

fn position(row: &SqliteRow, stage: Stage) -> sqlx::Result<Option<f64>> {
    number_column(row, &format!("{}_position", stage.as_str()))
}

impl CandidateReport {
    fn from_row(row: &SqliteRow) -> sqlx::Result<Self> {
        let status: Option<String> = row.try_get("status")?;
        let login: Option<String> = row.try_get("login")?;
        Ok(Self {
            user_id: row.try_get("user_id")?,
            batch_code: row.try_get("batch_code")?,
            subject_code: row.try_get("subject_code")?,
            center_code: row.try_get("center_code")?,
            center_name: row.try_get("Center_name")?,
            batch_date: row.try_get("batch_date")?,
            batch_time: row.try_get("batch_time")?,
            subject_language: row.try_get("subject_language")?,
            subject_speed: row.try_get("subject_speed")?,
            started: parse_flag(status.as_deref()),
            logged_in: parse_flag(login.as_deref()),
            duration: number_column(row, "duration")?,
            countdown_position: position(row, Stage::Countdown)?,
            trial_position: position(row, Stage::Trial)?,
            passage1_position: position(row, Stage::Passage1)?,
            passage2_position: position(row, Stage::Passage2)?,
            login_at: row.try_get("Logging")?,
            logout_at: row.try_get("logout")?,
            information_at: row.try_get("information")?,
            instruction_at: row.try_get("Instruction")?,
            testaudio_at: row.try_get("testaudio")?,
            countdown_at: row.try_get("countdown")?,
            trial_passage_at: row.try_get("trial_passage")?,
            passage1_at: row.try_get("passage1")?,
            passage2_at: row.try_get("passage2")?,
        })
    }
}

/// Every candidate ordered by id; lookups that do not match stay null
pub async fn candidate_report(pool: &SqlitePool) -> ApiResult<Vec<CandidateReport>> {
    let rows = sqlx::query(&report::select_candidate_report())
        .fetch_all(pool)
        .await?;
    Ok(rows
        .iter()
        .map(CandidateReport::from_row)
        .collect::<sqlx::Result<Vec<_>>>()?)
}
