use sea_query::{Alias, Expr, Query, SqliteQueryBuilder};

use crate::schema::Exuser;
use crate::stage::Stage;

/// SELECT batch_code, subject_code, CAST(status AS TEXT) AS status,
///        CAST(<stage position> AS TEXT) AS position, CAST(duration AS TEXT) AS duration
/// FROM exuser WHERE user_id = ?
pub fn select_stage_state(user_id: &str, stage: Stage) -> String {
    Query::select()
        .column(Exuser::BatchCode)
        .column(Exuser::SubjectCode)
        .expr_as(
            Expr::col(Exuser::Status).cast_as(Alias::new("TEXT")),
            Alias::new("status"),
        )
        .expr_as(
            Expr::col(stage.position_column()).cast_as(Alias::new("TEXT")),
            Alias::new("position"),
        )
        .expr_as(
            Expr::col(Exuser::Duration).cast_as(Alias::new("TEXT")),
            Alias::new("duration"),
        )
        .from(Exuser::Table)
        .and_where(Expr::col(Exuser::UserId).eq(user_id))
        .to_string(SqliteQueryBuilder)
}

/// SELECT batch_code, subject_code FROM exuser WHERE user_id = ?
pub fn select_batch(user_id: &str) -> String {
    Query::select()
        .column(Exuser::BatchCode)
        .column(Exuser::SubjectCode)
        .from(Exuser::Table)
        .and_where(Expr::col(Exuser::UserId).eq(user_id))
        .to_string(SqliteQueryBuilder)
}

/// Full progress row with every flag and position read back as text
pub fn select_progress(user_id: &str) -> String {
    let mut query = Query::select();
    query
        .column(Exuser::UserId)
        .column(Exuser::BatchCode)
        .column(Exuser::SubjectCode)
        .column(Exuser::CenterCode)
        .expr_as(
            Expr::col(Exuser::Status).cast_as(Alias::new("TEXT")),
            Alias::new("status"),
        )
        .expr_as(
            Expr::col(Exuser::Login).cast_as(Alias::new("TEXT")),
            Alias::new("login"),
        )
        .expr_as(
            Expr::col(Exuser::Duration).cast_as(Alias::new("TEXT")),
            Alias::new("duration"),
        );
    for stage in Stage::ALL {
        query.expr_as(
            Expr::col(stage.position_column()).cast_as(Alias::new("TEXT")),
            Alias::new(stage.as_str()),
        );
    }
    query
        .from(Exuser::Table)
        .and_where(Expr::col(Exuser::UserId).eq(user_id))
        .to_string(SqliteQueryBuilder)
}

/// SELECT CAST(user_id AS TEXT), password, CAST(login AS TEXT) AS login FROM exuser WHERE user_id = ?
pub fn select_credentials(user_id: &str) -> String {
    Query::select()
        .expr_as(
            Expr::col(Exuser::UserId).cast_as(Alias::new("TEXT")),
            Alias::new("user_id"),
        )
        .column(Exuser::Password)
        .expr_as(
            Expr::col(Exuser::Login).cast_as(Alias::new("TEXT")),
            Alias::new("login"),
        )
        .from(Exuser::Table)
        .and_where(Expr::col(Exuser::UserId).eq(user_id))
        .to_string(SqliteQueryBuilder)
}

/// SELECT CAST(user_id AS TEXT), password FROM exuser
pub fn select_all_credentials() -> String {
    Query::select()
        .expr_as(
            Expr::col(Exuser::UserId).cast_as(Alias::new("TEXT")),
            Alias::new("user_id"),
        )
        .column(Exuser::Password)
        .from(Exuser::Table)
        .to_string(SqliteQueryBuilder)
}

/// UPDATE exuser SET <stage position> = ? WHERE user_id = ?
pub fn update_position(user_id: &str, stage: Stage, position: f64) -> String {
    Query::update()
        .table(Exuser::Table)
        .value(stage.position_column(), position)
        .and_where(Expr::col(Exuser::UserId).eq(user_id))
        .to_string(SqliteQueryBuilder)
}

/// UPDATE exuser SET status = ? WHERE user_id = ?
pub fn update_status(user_id: &str, started: bool) -> String {
    Query::update()
        .table(Exuser::Table)
        .value(Exuser::Status, started as i32)
        .and_where(Expr::col(Exuser::UserId).eq(user_id))
        .to_string(SqliteQueryBuilder)
}

/// UPDATE exuser SET login = ? WHERE user_id = ?
pub fn update_login(user_id: &str, logged_in: bool) -> String {
    Query::update()
        .table(Exuser::Table)
        .value(Exuser::Login, logged_in as i32)
        .and_where(Expr::col(Exuser::UserId).eq(user_id))
        .to_string(SqliteQueryBuilder)
}

/// UPDATE exuser SET password = ? WHERE user_id = ?
pub fn update_password(user_id: &str, password_hash: &str) -> String {
    Query::update()
        .table(Exuser::Table)
        .value(Exuser::Password, password_hash)
        .and_where(Expr::col(Exuser::UserId).eq(user_id))
        .to_string(SqliteQueryBuilder)
}

/// INSERT INTO exuser (user_id, password, batch_code, subject_code, center_code, duration)
/// VALUES (?, ?, ?, ?, ?, ?)
pub fn insert(
    user_id: &str,
    password: &str,
    batch_code: &str,
    subject_code: &str,
    center_code: &str,
    duration: Option<f64>,
) -> String {
    Query::insert()
        .into_table(Exuser::Table)
        .columns([
            Exuser::UserId,
            Exuser::Password,
            Exuser::BatchCode,
            Exuser::SubjectCode,
            Exuser::CenterCode,
            Exuser::Duration,
        ])
        .values_panic([
            user_id.into(),
            password.into(),
            batch_code.into(),
            subject_code.into(),
            center_code.into(),
            duration.into(),
        ])
        .to_string(SqliteQueryBuilder)
}
