use sea_query::{Alias, Expr, Order, Query, SqliteQueryBuilder};

use crate::schema::Users;

/// SELECT CAST(user_id AS TEXT) AS user_id, role, password FROM users WHERE user_id = ?
pub fn select_credentials(user_id: &str) -> String {
    Query::select()
        .expr_as(
            Expr::col(Users::UserId).cast_as(Alias::new("TEXT")),
            Alias::new("user_id"),
        )
        .column(Users::Role)
        .column(Users::Password)
        .from(Users::Table)
        .and_where(Expr::col(Users::UserId).eq(user_id))
        .to_string(SqliteQueryBuilder)
}

/// SELECT CAST(user_id AS TEXT) AS user_id, password FROM users
pub fn select_all_credentials() -> String {
    Query::select()
        .expr_as(
            Expr::col(Users::UserId).cast_as(Alias::new("TEXT")),
            Alias::new("user_id"),
        )
        .column(Users::Password)
        .from(Users::Table)
        .to_string(SqliteQueryBuilder)
}

/// SELECT CAST(user_id AS TEXT) AS user_id, role FROM users ORDER BY user_id
pub fn select_all() -> String {
    Query::select()
        .expr_as(
            Expr::col(Users::UserId).cast_as(Alias::new("TEXT")),
            Alias::new("user_id"),
        )
        .column(Users::Role)
        .from(Users::Table)
        .order_by(Users::UserId, Order::Asc)
        .to_string(SqliteQueryBuilder)
}

/// INSERT INTO users (role, password) VALUES (?, ?)
pub fn insert(role: &str, password_hash: &str) -> String {
    Query::insert()
        .into_table(Users::Table)
        .columns([Users::Role, Users::Password])
        .values_panic([role.into(), password_hash.into()])
        .to_string(SqliteQueryBuilder)
}

/// UPDATE users SET password = ? WHERE user_id = ?
pub fn update_password(user_id: &str, password_hash: &str) -> String {
    Query::update()
        .table(Users::Table)
        .value(Users::Password, password_hash)
        .and_where(Expr::col(Users::UserId).eq(user_id))
        .to_string(SqliteQueryBuilder)
}
