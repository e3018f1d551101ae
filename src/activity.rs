use chrono::{DateTime, Utc};
use log::debug;
use sqlx::SqlitePool;

use crate::config::PortalConfig;
use crate::error::ApiResult;
use crate::queries::activity;
use crate::stage::Activity;

/// Stamp `activity` for `user_id` unless it was stamped before.
///
/// Returns true when this call wrote the timestamp.
pub async fn record_first_access(
    pool: &SqlitePool,
    config: &PortalConfig,
    user_id: &str,
    activity: Activity,
    now: DateTime<Utc>,
) -> ApiResult<bool> {
    sqlx::query(&activity::ensure_row(user_id)?)
        .execute(pool)
        .await?;

    let timestamp = config.local_timestamp(now);
    let result = sqlx::query(&activity::set_once(user_id, activity.column(), &timestamp))
        .execute(pool)
        .await?;

    let written = result.rows_affected() > 0;
    if written {
        debug!(
            "Recorded first {} for user {} at {}",
            activity.as_str(),
            user_id,
            timestamp
        );
    }
    Ok(written)
}

/// Current value of one activity column, if the candidate has a logs row
pub async fn activity_timestamp(
    pool: &SqlitePool,
    user_id: &str,
    activity: Activity,
) -> ApiResult<Option<String>> {
    let value: Option<Option<String>> =
        sqlx::query_scalar(&activity::select_column(user_id, activity.column()))
            .fetch_optional(pool)
            .await?;
    Ok(value.flatten())
}
