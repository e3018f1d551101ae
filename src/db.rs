use log::info;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::time::Duration;

use crate::constants::EXPECTED_DB_VERSION;
use crate::queries::{ddl, metadata};

type DynError = Box<dyn std::error::Error + Send + Sync>;

/// Open a file-based database pool for production use
/// Creates the file if missing and enables WAL mode
pub async fn open_database_connection(db_path: &Path) -> Result<SqlitePool, DynError> {
    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(5));

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;
    info!("SQLite database: {}", db_path.display());
    Ok(pool)
}

/// Create a database in a fresh temporary directory for testing
/// The returned guard must be kept alive for as long as the pool is used
pub async fn create_test_connection_in_temporary_file(
) -> Result<(SqlitePool, tempfile::TempDir), DynError> {
    let dir = tempfile::tempdir()?;
    let pool = open_database_connection(&dir.path().join("test.sqlite")).await?;
    Ok((pool, dir))
}

/// Initialize database schema
/// Creates the portal tables if missing and stamps or checks the schema version
pub async fn init_database_schema(pool: &SqlitePool) -> Result<(), DynError> {
    for sql in [
        ddl::create_metadata_table(),
        ddl::create_users_table(),
        ddl::create_exuser_table(),
        ddl::create_schedule_table(),
        ddl::create_schedule_lookup_index(),
        ddl::create_center_table(),
        ddl::create_logs_table(),
    ] {
        sqlx::query(&sql).execute(pool).await?;
    }

    // Best effort: a logs table recreated by a CSV import may hold duplicate user ids
    if let Err(e) = sqlx::query(&ddl::create_logs_user_index())
        .execute(pool)
        .await
    {
        log::warn!("Could not create unique index on logs.user_id: {}", e);
    }

    sqlx::query(&metadata::insert_if_absent("version", EXPECTED_DB_VERSION))
        .execute(pool)
        .await?;
    verify_schema_version(pool).await
}

/// Fail unless the metadata version matches EXPECTED_DB_VERSION
pub async fn verify_schema_version(pool: &SqlitePool) -> Result<(), DynError> {
    let db_version: Option<String> = sqlx::query_scalar(&metadata::select_by_key("version"))
        .fetch_optional(pool)
        .await
        .map_err(|e| format!("Failed to read version from metadata: {}", e))?;

    match db_version {
        Some(v) if v == EXPECTED_DB_VERSION => Ok(()),
        Some(v) => Err(format!(
            "Unsupported database version: '{}'. This application only supports version '{}'",
            v, EXPECTED_DB_VERSION
        )
        .into()),
        None => Err("Database has no schema version; run init-db first".into()),
    }
}
