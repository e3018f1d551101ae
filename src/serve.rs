use axum::{
    body::Bytes,
    extract::{rejection::JsonRejection, DefaultBodyLimit, Multipart, Path, Query, State},
    http::{header, HeaderName},
    response::{AppendHeaders, IntoResponse},
    routing::{delete, get, post, put},
    Json, Router,
};
use chrono::Utc;
use log::{info, warn};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use sqlx::SqlitePool;
use std::sync::Arc as StdArc;
use tower_http::cors::{Any, CorsLayer};

use crate::auth::{self, AccountKind, AuthSession, LoginRequest};
use crate::config::PortalConfig;
use crate::constants::{AUTH_COOKIE, CSV_UPLOAD_FIELDS, MAX_UPLOAD_BYTES, USER_ID_COOKIE};
use crate::error::{ApiError, ApiResult};
use crate::playback;
use crate::report;
use crate::stage::{Activity, Stage};
use crate::tables::{self, ImportMode};

// State shared by all portal handlers
pub struct AppState {
    pub pool: SqlitePool,
    pub config: PortalConfig,
}

/// Build the portal router; used by `serve` and by the integration tests
pub fn router(state: StdArc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let candidate_routes = Router::new()
        .route("/api/login", post(login_handler))
        .route("/api/logout", post(logout_handler))
        .route("/api/stages/{stage}/{user_id}", get(stage_handler))
        .route(
            "/api/stages/{stage}/{user_id}/position",
            put(stage_position_handler),
        )
        .route("/api/countaudio/{user_id}", get(countdown_handler))
        .route("/api/trialaudio/{user_id}", get(trial_handler))
        .route("/api/audio/{user_id}", get(passage1_handler))
        .route("/api/audio2/{user_id}", get(passage2_handler))
        .route(
            "/api/exuser/{user_id}",
            get(progress_handler).put(passage1_position_handler),
        )
        .route("/api/exuser/{user_id}/status", put(status_handler))
        .route("/api/testaudio/{user_id}", get(test_audio_handler))
        .route("/api/logs/{user_id}/{event}", post(page_event_handler));

    let admin_routes = Router::new()
        .route("/api/users", get(list_users_handler).post(create_user_handler))
        .route("/api/tables", get(list_tables_handler))
        .route("/api/table-data/{table}", get(table_data_handler))
        .route("/api/import-csv/{table}", post(import_csv_handler))
        .route("/api/export-csv/{table}", get(export_csv_handler))
        .route("/api/save-changes/{table}", post(save_changes_handler))
        .route("/api/delete-table/{table}", delete(delete_table_handler))
        .route("/api/report", get(report_handler));

    Router::new()
        .route("/health", get(health_handler))
        .merge(candidate_routes)
        .merge(admin_routes)
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(cors)
        .with_state(state)
}

/// Run the portal API until the process is stopped
pub fn serve_portal(config: PortalConfig) -> Result<(), Box<dyn std::error::Error>> {
    let port = config.api_port;

    println!("Starting portal for: {}", config.database_path.display());
    println!("Login policy: {:?}", config.login_policy);
    println!(
        "Link cipher: {}",
        if config.link_cipher_key.is_some() { "enabled" } else { "disabled" }
    );
    println!("Listening on: http://[::]:{} (IPv4 + IPv6)", port);
    println!("Endpoints:");
    println!("  GET  /health  - Health check");
    println!("  POST /api/login  - Admin or candidate login");
    println!("  POST /api/logout  - Candidate logout");
    println!("  GET  /api/stages/{{stage}}/{{user_id}}  - Audio link and resume position");
    println!("  PUT  /api/stages/{{stage}}/{{user_id}}/position  - Save resume position");
    println!("  GET  /api/countaudio|trialaudio|audio|audio2/{{user_id}}  - Per-stage aliases");
    println!("  GET  /api/exuser/{{user_id}}  - Candidate progress");
    println!("  PUT  /api/exuser/{{user_id}}/status  - Mark exam started");
    println!("  GET  /api/testaudio/{{user_id}}  - Sound-check link");
    println!("  POST /api/logs/{{user_id}}/{{event}}  - Record page visit");
    println!("  GET|POST /api/users  - Admin accounts");
    println!("  GET  /api/tables  - List tables");
    println!("  GET  /api/table-data/{{table}}  - Table rows");
    println!("  POST /api/import-csv/{{table}}?mode=append|replace  - CSV import");
    println!("  GET  /api/export-csv/{{table}}  - CSV export");
    println!("  POST /api/save-changes/{{table}}  - Replace table rows");
    println!("  DELETE /api/delete-table/{{table}}  - Drop table");
    println!("  GET  /api/report  - Candidate report");

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        let pool = crate::db::open_database_connection(&config.database_path)
            .await
            .map_err(|e| format!("Failed to open database: {}", e))?;
        crate::db::verify_schema_version(&pool)
            .await
            .map_err(|e| e.to_string())?;

        let app = router(StdArc::new(AppState { pool, config }));

        let listener = tokio::net::TcpListener::bind(format!("[::]:{}", port))
            .await
            .map_err(|e| format!("Failed to bind to port {}: {}", port, e))?;
        axum::serve(listener, app)
            .await
            .map_err(|e| format!("Server error: {}", e))?;

        Ok::<(), Box<dyn std::error::Error>>(())
    })
}

async fn health_handler(State(state): State<StdArc<AppState>>) -> ApiResult<Json<Value>> {
    sqlx::query("SELECT 1").execute(&state.pool).await?;
    Ok(Json(json!({ "status": "ok" })))
}

async fn login_handler(
    State(state): State<StdArc<AppState>>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(request) = payload?;
    let response = auth::login(&state.pool, &state.config, &request, Utc::now()).await?;

    let mut cookies: Vec<(HeaderName, String)> = vec![(
        header::SET_COOKIE,
        auth::session_cookie(&state.config, AUTH_COOKIE, &response.token, true),
    )];
    if response.kind == AccountKind::Candidate && auth::is_cookie_safe(&response.user_id) {
        cookies.push((
            header::SET_COOKIE,
            auth::session_cookie(&state.config, USER_ID_COOKIE, &response.user_id, false),
        ));
    }
    Ok((AppendHeaders(cookies), Json(response)))
}

#[derive(Debug, Default, Deserialize)]
struct LogoutRequest {
    user_id: Option<Value>,
}

async fn logout_handler(
    State(state): State<StdArc<AppState>>,
    session: AuthSession,
    body: Bytes,
) -> ApiResult<impl IntoResponse> {
    let request: LogoutRequest = if body.is_empty() {
        LogoutRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| ApiError::InvalidArgument(format!("Invalid JSON body: {}", e)))?
    };
    let user_id = match request.user_id {
        Some(Value::String(s)) => s,
        Some(Value::Number(n)) => n.to_string(),
        _ => session.user_id.clone(),
    };
    session.require_candidate_access(&user_id)?;

    auth::logout(&state.pool, &state.config, &user_id, Utc::now()).await?;

    let cookies = [
        (header::SET_COOKIE, auth::expired_cookie(AUTH_COOKIE)),
        (header::SET_COOKIE, auth::expired_cookie(USER_ID_COOKIE)),
    ];
    Ok((AppendHeaders(cookies), Json(json!({ "success": true }))))
}

fn parse_stage(name: &str) -> ApiResult<Stage> {
    name.parse::<Stage>().map_err(ApiError::NotFound)
}

async fn deliver(
    state: &AppState,
    session: &AuthSession,
    stage: Stage,
    user_id: &str,
) -> ApiResult<Json<playback::StageDelivery>> {
    session.require_candidate_access(user_id)?;
    let delivery =
        playback::deliver_stage(&state.pool, &state.config, stage, user_id, Utc::now()).await?;
    Ok(Json(delivery))
}

async fn save_position(
    state: &AppState,
    session: &AuthSession,
    stage: Stage,
    user_id: &str,
    body: &[u8],
) -> ApiResult<Json<Value>> {
    session.require_candidate_access(user_id)?;
    let position = playback::parse_position_body(body)?;
    playback::update_position(&state.pool, stage, user_id, position).await?;
    Ok(Json(json!({
        "message": "Last played position updated successfully",
        "stage": stage,
        "position": position,
    })))
}

async fn stage_handler(
    State(state): State<StdArc<AppState>>,
    session: AuthSession,
    Path((stage, user_id)): Path<(String, String)>,
) -> ApiResult<Json<playback::StageDelivery>> {
    deliver(&state, &session, parse_stage(&stage)?, &user_id).await
}

async fn stage_position_handler(
    State(state): State<StdArc<AppState>>,
    session: AuthSession,
    Path((stage, user_id)): Path<(String, String)>,
    body: Bytes,
) -> ApiResult<Json<Value>> {
    save_position(&state, &session, parse_stage(&stage)?, &user_id, &body).await
}

async fn countdown_handler(
    State(state): State<StdArc<AppState>>,
    session: AuthSession,
    Path(user_id): Path<String>,
) -> ApiResult<Json<playback::StageDelivery>> {
    deliver(&state, &session, Stage::Countdown, &user_id).await
}

async fn trial_handler(
    State(state): State<StdArc<AppState>>,
    session: AuthSession,
    Path(user_id): Path<String>,
) -> ApiResult<Json<playback::StageDelivery>> {
    deliver(&state, &session, Stage::Trial, &user_id).await
}

async fn passage1_handler(
    State(state): State<StdArc<AppState>>,
    session: AuthSession,
    Path(user_id): Path<String>,
) -> ApiResult<Json<playback::StageDelivery>> {
    deliver(&state, &session, Stage::Passage1, &user_id).await
}

async fn passage2_handler(
    State(state): State<StdArc<AppState>>,
    session: AuthSession,
    Path(user_id): Path<String>,
) -> ApiResult<Json<playback::StageDelivery>> {
    deliver(&state, &session, Stage::Passage2, &user_id).await
}

// PUT /api/exuser/{user_id} keeps saving the first passage position
async fn passage1_position_handler(
    State(state): State<StdArc<AppState>>,
    session: AuthSession,
    Path(user_id): Path<String>,
    body: Bytes,
) -> ApiResult<Json<Value>> {
    save_position(&state, &session, Stage::Passage1, &user_id, &body).await
}

async fn status_handler(
    State(state): State<StdArc<AppState>>,
    session: AuthSession,
    Path(user_id): Path<String>,
) -> ApiResult<Json<Value>> {
    session.require_candidate_access(&user_id)?;
    playback::mark_started(&state.pool, &user_id).await?;
    Ok(Json(json!({ "message": "Status updated successfully" })))
}

async fn progress_handler(
    State(state): State<StdArc<AppState>>,
    session: AuthSession,
    Path(user_id): Path<String>,
) -> ApiResult<Json<playback::CandidateProgress>> {
    session.require_candidate_access(&user_id)?;
    Ok(Json(
        playback::candidate_progress(&state.pool, &user_id).await?,
    ))
}

async fn test_audio_handler(
    State(state): State<StdArc<AppState>>,
    session: AuthSession,
    Path(user_id): Path<String>,
) -> ApiResult<Json<playback::TestAudioDelivery>> {
    session.require_candidate_access(&user_id)?;
    Ok(Json(
        playback::deliver_test_audio(&state.pool, &state.config, &user_id, Utc::now()).await?,
    ))
}

async fn page_event_handler(
    State(state): State<StdArc<AppState>>,
    session: AuthSession,
    Path((user_id, event)): Path<(String, String)>,
) -> ApiResult<Json<Value>> {
    session.require_candidate_access(&user_id)?;
    let activity: Activity = Activity::page_event(&event)
        .ok_or_else(|| ApiError::NotFound(format!("Unknown event '{}'", event)))?;
    let recorded = crate::activity::record_first_access(
        &state.pool,
        &state.config,
        &user_id,
        activity,
        Utc::now(),
    )
    .await?;
    Ok(Json(json!({ "event": activity.as_str(), "recorded": recorded })))
}

async fn list_users_handler(
    State(state): State<StdArc<AppState>>,
    session: AuthSession,
) -> ApiResult<Json<Vec<auth::AdminSummary>>> {
    session.require_admin()?;
    Ok(Json(auth::list_admins(&state.pool).await?))
}

#[derive(Debug, Deserialize)]
struct CreateUserRequest {
    role: Option<String>,
    password: Option<String>,
}

async fn create_user_handler(
    State(state): State<StdArc<AppState>>,
    session: AuthSession,
    payload: Result<Json<CreateUserRequest>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    session.require_admin()?;
    let Json(request) = payload?;
    let id = auth::create_admin(
        &state.pool,
        &state.config,
        request.role.as_deref().unwrap_or_default(),
        request.password.as_deref().unwrap_or_default(),
    )
    .await?;
    Ok(Json(json!({ "message": "User added successfully", "user_id": id })))
}

async fn list_tables_handler(
    State(state): State<StdArc<AppState>>,
    session: AuthSession,
) -> ApiResult<Json<Value>> {
    session.require_admin()?;
    let tables = tables::list_tables(&state.pool).await?;
    Ok(Json(json!({ "tables": tables })))
}

async fn table_data_handler(
    State(state): State<StdArc<AppState>>,
    session: AuthSession,
    Path(table): Path<String>,
) -> ApiResult<Json<tables::TableData>> {
    session.require_admin()?;
    Ok(Json(tables::table_data(&state.pool, &table).await?))
}

#[derive(Debug, Deserialize)]
struct ImportQuery {
    #[serde(default)]
    mode: ImportMode,
}

async fn import_csv_handler(
    State(state): State<StdArc<AppState>>,
    session: AuthSession,
    Path(table): Path<String>,
    Query(query): Query<ImportQuery>,
    mut multipart: Multipart,
) -> ApiResult<Json<Value>> {
    session.require_admin()?;

    let mut upload: Option<Bytes> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::InvalidArgument(format!("Invalid multipart body: {}", e)))?
    {
        let name = field.name().unwrap_or_default().to_string();
        if !CSV_UPLOAD_FIELDS.contains(&name.as_str()) {
            warn!("Ignoring multipart field '{}'", name);
            continue;
        }
        upload = Some(
            field
                .bytes()
                .await
                .map_err(|e| ApiError::InvalidArgument(format!("Failed to read upload: {}", e)))?,
        );
        break;
    }
    let data = upload.ok_or_else(|| ApiError::InvalidArgument("No file uploaded".to_string()))?;

    let summary = tables::import_csv(&state.pool, &table, &data, query.mode).await?;
    Ok(Json(json!({
        "message": "CSV data imported successfully",
        "table": summary.table,
        "columns": summary.columns,
        "rows": summary.rows,
    })))
}

async fn export_csv_handler(
    State(state): State<StdArc<AppState>>,
    session: AuthSession,
    Path(table): Path<String>,
) -> ApiResult<impl IntoResponse> {
    session.require_admin()?;
    tables::validate_table_name(&table)?;
    let csv = tables::export_csv(&state.pool, &table).await?;
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}.csv\"", table),
            ),
        ],
        csv,
    ))
}

#[derive(Debug, Deserialize)]
struct SaveChangesRequest {
    #[serde(rename = "tableData")]
    table_data: Vec<Map<String, Value>>,
}

async fn save_changes_handler(
    State(state): State<StdArc<AppState>>,
    session: AuthSession,
    Path(table): Path<String>,
    payload: Result<Json<SaveChangesRequest>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    session.require_admin()?;
    let Json(request) = payload?;
    let rows = tables::save_changes(&state.pool, &table, &request.table_data).await?;
    Ok(Json(json!({ "message": "Changes saved successfully", "rows": rows })))
}

async fn delete_table_handler(
    State(state): State<StdArc<AppState>>,
    session: AuthSession,
    Path(table): Path<String>,
) -> ApiResult<Json<Value>> {
    session.require_admin()?;
    tables::delete_table(&state.pool, &table).await?;
    info!("Admin {} deleted table '{}'", session.user_id, table);
    Ok(Json(json!({ "message": format!("Table '{}' deleted successfully", table) })))
}

async fn report_handler(
    State(state): State<StdArc<AppState>>,
    session: AuthSession,
) -> ApiResult<Json<Vec<report::CandidateReport>>> {
    session.require_admin()?;
    Ok(Json(report::candidate_report(&state.pool).await?))
}
