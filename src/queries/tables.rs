//! Statements over tables whose names and columns are only known at runtime.
//!
//! Callers must validate identifiers first (see [`crate::tables::validate_identifier`]);
//! sea-query quotes them but does not reject odd names.

use sea_query::{
    Alias, Asterisk, ColumnDef, Expr, Order, Query, SimpleExpr, SqliteQueryBuilder, Table,
};

/// CREATE TABLE [IF NOT EXISTS] <table> (<col> TEXT, ...)
pub fn create_text_table(table: &str, columns: &[String], if_not_exists: bool) -> String {
    let mut stmt = Table::create();
    stmt.table(Alias::new(table));
    if if_not_exists {
        stmt.if_not_exists();
    }
    for column in columns {
        stmt.col(ColumnDef::new(Alias::new(column)).text());
    }
    stmt.to_string(SqliteQueryBuilder)
}

/// DROP TABLE IF EXISTS <table>
pub fn drop_table(table: &str) -> String {
    Table::drop()
        .table(Alias::new(table))
        .if_exists()
        .to_string(SqliteQueryBuilder)
}

/// DELETE FROM <table>
pub fn delete_all(table: &str) -> String {
    Query::delete()
        .from_table(Alias::new(table))
        .to_string(SqliteQueryBuilder)
}

/// INSERT INTO <table> (<cols>) VALUES (<values>)
pub fn insert_row(table: &str, columns: &[String], values: Vec<SimpleExpr>) -> String {
    Query::insert()
        .into_table(Alias::new(table))
        .columns(columns.iter().map(|c| Alias::new(c.as_str())))
        .values_panic(values)
        .to_string(SqliteQueryBuilder)
}

/// SELECT * FROM <table> ORDER BY rowid
pub fn select_all(table: &str) -> String {
    Query::select()
        .column(Asterisk)
        .from(Alias::new(table))
        .order_by(Alias::new("rowid"), Order::Asc)
        .to_string(SqliteQueryBuilder)
}

/// SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name
pub fn select_table_names() -> String {
    Query::select()
        .column(Alias::new("name"))
        .from(Alias::new("sqlite_master"))
        .and_where(Expr::col(Alias::new("type")).eq("table"))
        .order_by(Alias::new("name"), Order::Asc)
        .to_string(SqliteQueryBuilder)
}

/// SELECT name FROM pragma_table_info(?) ORDER BY cid
///
/// The table name is bound as a parameter, so this one stays a plain statement.
pub const SELECT_COLUMN_NAMES: &str = "SELECT name FROM pragma_table_info(?) ORDER BY cid";
