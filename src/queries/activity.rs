use sea_query::{Expr, OnConflict, Query, SqliteQueryBuilder};

use crate::schema::Logs;

/// INSERT INTO logs (user_id) SELECT ? WHERE NOT EXISTS (SELECT 1 FROM logs WHERE user_id = ?)
/// ON CONFLICT DO NOTHING
///
/// Does not rely on a unique index because logs may have been recreated by a CSV import.
pub fn ensure_row(user_id: &str) -> Result<String, sea_query::error::Error> {
    let existing = Query::select()
        .expr(Expr::val(1))
        .from(Logs::Table)
        .and_where(Expr::col(Logs::UserId).eq(user_id))
        .to_owned();
    let missing = Query::select()
        .expr(Expr::val(user_id))
        .and_where(Expr::exists(existing).not())
        .to_owned();
    Ok(Query::insert()
        .into_table(Logs::Table)
        .columns([Logs::UserId])
        .select_from(missing)?
        .on_conflict(OnConflict::new().do_nothing().to_owned())
        .to_string(SqliteQueryBuilder))
}

/// UPDATE logs SET <column> = ? WHERE user_id = ? AND <column> IS NULL
pub fn set_once(user_id: &str, column: Logs, timestamp: &str) -> String {
    Query::update()
        .table(Logs::Table)
        .value(column, timestamp)
        .and_where(Expr::col(Logs::UserId).eq(user_id))
        .and_where(Expr::col(column).is_null())
        .to_string(SqliteQueryBuilder)
}

/// SELECT <column> FROM logs WHERE user_id = ?
pub fn select_column(user_id: &str, column: Logs) -> String {
    Query::select()
        .column(column)
        .from(Logs::Table)
        .and_where(Expr::col(Logs::UserId).eq(user_id))
        .to_string(SqliteQueryBuilder)
}
