use sea_query::{ColumnDef, Index, SqliteQueryBuilder, Table};

use crate::schema::{Center, Exuser, Logs, Metadata, Schedule, Users};

/// CREATE TABLE IF NOT EXISTS metadata (key TEXT PRIMARY KEY, value TEXT NOT NULL)
pub fn create_metadata_table() -> String {
    Table::create()
        .table(Metadata::Table)
        .if_not_exists()
        .col(ColumnDef::new(Metadata::Key).string().primary_key())
        .col(ColumnDef::new(Metadata::Value).string().not_null())
        .to_string(SqliteQueryBuilder)
}

/// CREATE TABLE IF NOT EXISTS users (
///     user_id INTEGER PRIMARY KEY AUTOINCREMENT,
///     role TEXT,
///     password TEXT
/// )
pub fn create_users_table() -> String {
    Table::create()
        .table(Users::Table)
        .if_not_exists()
        .col(
            ColumnDef::new(Users::UserId)
                .integer()
                .primary_key()
                .auto_increment(),
        )
        .col(ColumnDef::new(Users::Role).text())
        .col(ColumnDef::new(Users::Password).text())
        .to_string(SqliteQueryBuilder)
}

/// CREATE TABLE IF NOT EXISTS exuser (
///     user_id TEXT PRIMARY KEY,
///     password TEXT, batch_code TEXT, subject_code TEXT, center_code TEXT,
///     status INTEGER NOT NULL DEFAULT 0,
///     login INTEGER NOT NULL DEFAULT 0,
///     last_played_position REAL DEFAULT 0, last_played_position2 REAL DEFAULT 0,
///     countdown_position REAL DEFAULT 0, trial_position REAL DEFAULT 0,
///     duration REAL
/// )
pub fn create_exuser_table() -> String {
    Table::create()
        .table(Exuser::Table)
        .if_not_exists()
        .col(ColumnDef::new(Exuser::UserId).text().primary_key())
        .col(ColumnDef::new(Exuser::Password).text())
        .col(ColumnDef::new(Exuser::BatchCode).text())
        .col(ColumnDef::new(Exuser::SubjectCode).text())
        .col(ColumnDef::new(Exuser::CenterCode).text())
        .col(ColumnDef::new(Exuser::Status).integer().not_null().default(0))
        .col(ColumnDef::new(Exuser::Login).integer().not_null().default(0))
        .col(ColumnDef::new(Exuser::LastPlayedPosition).double().default(0))
        .col(ColumnDef::new(Exuser::LastPlayedPosition2).double().default(0))
        .col(ColumnDef::new(Exuser::CountdownPosition).double().default(0))
        .col(ColumnDef::new(Exuser::TrialPosition).double().default(0))
        .col(ColumnDef::new(Exuser::Duration).double())
        .to_string(SqliteQueryBuilder)
}

/// CREATE TABLE IF NOT EXISTS schedule (batch_code TEXT, subject_code TEXT, link_1 TEXT, ...)
pub fn create_schedule_table() -> String {
    Table::create()
        .table(Schedule::Table)
        .if_not_exists()
        .col(ColumnDef::new(Schedule::BatchCode).text())
        .col(ColumnDef::new(Schedule::SubjectCode).text())
        .col(ColumnDef::new(Schedule::Link1).text())
        .col(ColumnDef::new(Schedule::Link2).text())
        .col(ColumnDef::new(Schedule::Countdown).text())
        .col(ColumnDef::new(Schedule::Trialaudio).text())
        .col(ColumnDef::new(Schedule::Testaudio).text())
        .col(ColumnDef::new(Schedule::BatchTime).text())
        .col(ColumnDef::new(Schedule::BatchDate).text())
        .col(ColumnDef::new(Schedule::SubjectSpeed).text())
        .col(ColumnDef::new(Schedule::SubjectLanguage).text())
        .to_string(SqliteQueryBuilder)
}

/// CREATE INDEX IF NOT EXISTS idx_schedule_batch_subject ON schedule(batch_code, subject_code)
pub fn create_schedule_lookup_index() -> String {
    Index::create()
        .if_not_exists()
        .name("idx_schedule_batch_subject")
        .table(Schedule::Table)
        .col(Schedule::BatchCode)
        .col(Schedule::SubjectCode)
        .to_string(SqliteQueryBuilder)
}

/// CREATE TABLE IF NOT EXISTS center (center_code TEXT, Center_name TEXT)
pub fn create_center_table() -> String {
    Table::create()
        .table(Center::Table)
        .if_not_exists()
        .col(ColumnDef::new(Center::CenterCode).text())
        .col(ColumnDef::new(Center::CenterName).text())
        .to_string(SqliteQueryBuilder)
}

/// CREATE TABLE IF NOT EXISTS logs (
///     user_id TEXT PRIMARY KEY,
///     Logging TEXT, logout TEXT, information TEXT, Instruction TEXT, testaudio TEXT,
///     trial_passage TEXT, passage1 TEXT, passage2 TEXT, countdown TEXT
/// )
pub fn create_logs_table() -> String {
    Table::create()
        .table(Logs::Table)
        .if_not_exists()
        .col(ColumnDef::new(Logs::UserId).text().primary_key())
        .col(ColumnDef::new(Logs::Logging).text())
        .col(ColumnDef::new(Logs::Logout).text())
        .col(ColumnDef::new(Logs::Information).text())
        .col(ColumnDef::new(Logs::Instruction).text())
        .col(ColumnDef::new(Logs::Testaudio).text())
        .col(ColumnDef::new(Logs::TrialPassage).text())
        .col(ColumnDef::new(Logs::Passage1).text())
        .col(ColumnDef::new(Logs::Passage2).text())
        .col(ColumnDef::new(Logs::Countdown).text())
        .to_string(SqliteQueryBuilder)
}

/// CREATE UNIQUE INDEX IF NOT EXISTS idx_logs_user_id ON logs(user_id)
///
/// Needed when logs was recreated by a CSV import without the primary key.
pub fn create_logs_user_index() -> String {
    Index::create()
        .if_not_exists()
        .unique()
        .name("idx_logs_user_id")
        .table(Logs::Table)
        .col(Logs::UserId)
        .to_string(SqliteQueryBuilder)
}
