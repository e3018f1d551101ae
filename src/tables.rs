//! Generic CSV import/export and table maintenance.
//!
//! Imported tables get one TEXT column per header field. Every bulk write
//! runs in a single transaction so a bad row leaves the table untouched.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use clap::ValueEnum;
use log::info;
use sea_query::SimpleExpr;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool, TypeInfo, ValueRef};
use std::collections::HashSet;

use crate::constants::INTERNAL_TABLES;
use crate::error::{ApiError, ApiResult};
use crate::queries::tables;

/// How an import treats an existing table of the same name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportMode {
    /// Create the table if missing and add the rows to it
    #[default]
    Append,
    /// Drop the table and recreate it from the file
    Replace,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportSummary {
    pub table: String,
    pub columns: Vec<String>,
    pub rows: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct TableData {
    pub columns: Vec<String>,
    #[serde(rename = "tableData")]
    pub rows: Vec<Map<String, Value>>,
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    name.len() <= 64 && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Column names must be plain SQL identifiers
pub fn validate_identifier(name: &str) -> ApiResult<()> {
    if is_identifier(name) {
        Ok(())
    } else {
        Err(ApiError::InvalidArgument(format!(
            "'{}' is not a valid identifier",
            name
        )))
    }
}

/// Table names must be identifiers and must not name internal tables
pub fn validate_table_name(name: &str) -> ApiResult<()> {
    validate_identifier(name)?;
    let lower = name.to_ascii_lowercase();
    if lower.starts_with("sqlite_") || INTERNAL_TABLES.contains(&lower.as_str()) {
        return Err(ApiError::InvalidArgument(format!(
            "Table '{}' is reserved",
            name
        )));
    }
    Ok(())
}

async fn existing_columns(pool: &SqlitePool, table: &str) -> ApiResult<Vec<String>> {
    Ok(sqlx::query_scalar(tables::SELECT_COLUMN_NAMES)
        .bind(table)
        .fetch_all(pool)
        .await?)
}

async fn require_columns(pool: &SqlitePool, table: &str) -> ApiResult<Vec<String>> {
    let columns = existing_columns(pool, table).await?;
    if columns.is_empty() {
        return Err(ApiError::NotFound(format!("Table '{}' not found", table)));
    }
    Ok(columns)
}

fn check_known_columns<'a>(
    table: &str,
    known: &[String],
    requested: impl IntoIterator<Item = &'a String>,
) -> ApiResult<()> {
    let known: HashSet<String> = known.iter().map(|c| c.to_ascii_lowercase()).collect();
    for column in requested {
        if !known.contains(&column.to_ascii_lowercase()) {
            return Err(ApiError::InvalidArgument(format!(
                "Table '{}' has no column '{}'",
                table, column
            )));
        }
    }
    Ok(())
}

/// Parse `data` as CSV and load it into `table`
pub async fn import_csv(
    pool: &SqlitePool,
    table: &str,
    data: &[u8],
    mode: ImportMode,
) -> ApiResult<ImportSummary> {
    validate_table_name(table)?;

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::Headers)
        .from_reader(data);

    let columns: Vec<String> = reader
        .headers()
        .map_err(|e| ApiError::InvalidArgument(format!("Malformed CSV header: {}", e)))?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').to_string())
        .collect();
    if columns.is_empty() || columns.iter().all(|c| c.is_empty()) {
        return Err(ApiError::InvalidArgument(
            "No data found in the CSV file".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    for column in &columns {
        validate_identifier(column)?;
        if !seen.insert(column.to_ascii_lowercase()) {
            return Err(ApiError::InvalidArgument(format!(
                "Duplicate column '{}' in CSV header",
                column
            )));
        }
    }

    let mut rows = Vec::new();
    for record in reader.records() {
        let record =
            record.map_err(|e| ApiError::InvalidArgument(format!("Malformed CSV: {}", e)))?;
        rows.push(record);
    }
    if rows.is_empty() {
        return Err(ApiError::InvalidArgument(
            "No data found in the CSV file".to_string(),
        ));
    }

    if mode == ImportMode::Append {
        let existing = existing_columns(pool, table).await?;
        if !existing.is_empty() {
            check_known_columns(table, &existing, &columns)?;
        }
    }

    let mut tx = pool.begin().await?;
    if mode == ImportMode::Replace {
        sqlx::query(&tables::drop_table(table))
            .execute(&mut *tx)
            .await?;
    }
    sqlx::query(&tables::create_text_table(
        table,
        &columns,
        mode == ImportMode::Append,
    ))
    .execute(&mut *tx)
    .await?;

    for record in &rows {
        let values: Vec<SimpleExpr> = record.iter().map(|field| field.into()).collect();
        sqlx::query(&tables::insert_row(table, &columns, values))
            .execute(&mut *tx)
            .await?;
    }
    tx.commit().await?;

    info!(
        "CSV data imported into table '{}' ({} rows, {:?})",
        table,
        rows.len(),
        mode
    );
    Ok(ImportSummary {
        table: table.to_string(),
        columns,
        rows: rows.len(),
    })
}

fn cell_value(row: &SqliteRow, index: usize) -> ApiResult<Value> {
    let raw = row.try_get_raw(index)?;
    if raw.is_null() {
        return Ok(Value::Null);
    }
    let value = match raw.type_info().name() {
        "INTEGER" => Value::from(row.try_get::<i64, _>(index)?),
        "REAL" => Value::from(row.try_get::<f64, _>(index)?),
        "BLOB" => Value::String(BASE64.encode(row.try_get::<Vec<u8>, _>(index)?)),
        _ => Value::String(row.try_get::<String, _>(index)?),
    };
    Ok(value)
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Every row of `table` as JSON objects in column order
pub async fn table_data(pool: &SqlitePool, table: &str) -> ApiResult<TableData> {
    validate_table_name(table)?;
    let columns = require_columns(pool, table).await?;

    let rows = sqlx::query(&tables::select_all(table))
        .fetch_all(pool)
        .await?;
    let rows = rows
        .iter()
        .map(|row| {
            let mut object = Map::new();
            for (index, column) in columns.iter().enumerate() {
                object.insert(column.clone(), cell_value(row, index)?);
            }
            Ok(object)
        })
        .collect::<ApiResult<Vec<_>>>()?;

    Ok(TableData { columns, rows })
}

/// Render `table` as CSV with a header row
pub async fn export_csv(pool: &SqlitePool, table: &str) -> ApiResult<Vec<u8>> {
    let data = table_data(pool, table).await?;

    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(&data.columns)?;
    for row in &data.rows {
        writer.write_record(data.columns.iter().map(|c| {
            row.get(c).map(cell_text).unwrap_or_default()
        }))?;
    }
    writer
        .into_inner()
        .map_err(|e| ApiError::Internal(format!("Failed to finish CSV export: {}", e)))
}

/// User tables, without sqlite internals and portal metadata
pub async fn list_tables(pool: &SqlitePool) -> ApiResult<Vec<String>> {
    let names: Vec<String> = sqlx::query_scalar(&tables::select_table_names())
        .fetch_all(pool)
        .await?;
    Ok(names
        .into_iter()
        .filter(|name| validate_table_name(name).is_ok())
        .collect())
}

fn json_to_expr(value: &Value) -> SimpleExpr {
    match value {
        Value::Null => Option::<String>::None.into(),
        Value::Bool(b) => (*b as i32).into(),
        Value::Number(n) => match n.as_i64() {
            Some(i) => i.into(),
            None => n.as_f64().unwrap_or_default().into(),
        },
        Value::String(s) => s.as_str().into(),
        other => other.to_string().into(),
    }
}

/// Replace the contents of `table` with `rows` in one transaction
pub async fn save_changes(
    pool: &SqlitePool,
    table: &str,
    rows: &[Map<String, Value>],
) -> ApiResult<usize> {
    validate_table_name(table)?;
    let known = require_columns(pool, table).await?;
    for (index, row) in rows.iter().enumerate() {
        if row.is_empty() {
            return Err(ApiError::InvalidArgument(format!(
                "Row {} has no columns",
                index
            )));
        }
        for column in row.keys() {
            validate_identifier(column)?;
        }
        check_known_columns(table, &known, row.keys())?;
    }

    let mut tx = pool.begin().await?;
    sqlx::query(&tables::delete_all(table))
        .execute(&mut *tx)
        .await?;
    for row in rows {
        let columns: Vec<String> = row.keys().cloned().collect();
        let values: Vec<SimpleExpr> = row.values().map(json_to_expr).collect();
        sqlx::query(&tables::insert_row(table, &columns, values))
            .execute(&mut *tx)
            .await?;
    }
    tx.commit().await?;

    info!("Saved {} rows into '{}'", rows.len(), table);
    Ok(rows.len())
}

pub async fn delete_table(pool: &SqlitePool, table: &str) -> ApiResult<()> {
    validate_table_name(table)?;
    sqlx::query(&tables::drop_table(table)).execute(pool).await?;
    info!("Table '{}' deleted", table);
    Ok(())
}
