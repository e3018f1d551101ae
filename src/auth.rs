//! Dual-table login, session tokens and admin accounts.
//!
//! Admins live in `users`, candidates in `exuser`. Both may still carry
//! plaintext passwords from a CSV import; those are accepted once and
//! replaced by a bcrypt hash on the first successful login.

use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use sqlx::{Row, SqlitePool};
use std::sync::Arc as StdArc;

use crate::activity::record_first_access;
use crate::config::{LoginPolicy, PortalConfig};
use crate::constants::{AUTH_COOKIE, CANDIDATE_ROLE};
use crate::error::{ApiError, ApiResult};
use crate::queries::{admins, candidates};
use crate::serve::AppState;
use crate::stage::Activity;

const INVALID_CREDENTIALS: &str = "Invalid credentials";

/// Which table an account came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountKind {
    Admin,
    Candidate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub role: String,
    pub kind: AccountKind,
    pub exp: usize,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub user_id: Option<Value>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginResponse {
    pub user_id: String,
    pub token: String,
    pub role: String,
    pub kind: AccountKind,
}

#[derive(Debug, Clone, Serialize)]
pub struct AdminSummary {
    pub user_id: String,
    pub role: Option<String>,
}

/// Result of checking a password against the stored value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasswordCheck {
    Valid,
    /// Matched a plaintext value that should be replaced by a hash
    ValidLegacy,
    Invalid,
}

pub fn is_bcrypt_hash(stored: &str) -> bool {
    stored.len() == 60
        && (stored.starts_with("$2a$") || stored.starts_with("$2b$") || stored.starts_with("$2y$"))
}

fn digest_eq(a: &str, b: &str) -> bool {
    let a = Sha256::digest(a.as_bytes());
    let b = Sha256::digest(b.as_bytes());
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

pub fn verify_password(candidate: &str, stored: Option<&str>) -> ApiResult<PasswordCheck> {
    let Some(stored) = stored.filter(|s| !s.is_empty()) else {
        return Ok(PasswordCheck::Invalid);
    };
    if is_bcrypt_hash(stored) {
        return Ok(if bcrypt::verify(candidate, stored)? {
            PasswordCheck::Valid
        } else {
            PasswordCheck::Invalid
        });
    }
    Ok(if digest_eq(candidate, stored) {
        PasswordCheck::ValidLegacy
    } else {
        PasswordCheck::Invalid
    })
}

pub fn hash_password(config: &PortalConfig, password: &str) -> ApiResult<String> {
    Ok(bcrypt::hash(password, config.bcrypt_cost)?)
}

pub fn issue_token(
    config: &PortalConfig,
    user_id: &str,
    role: &str,
    kind: AccountKind,
    now: DateTime<Utc>,
) -> ApiResult<String> {
    let exp = (now + Duration::seconds(config.token_ttl_secs as i64)).timestamp() as usize;
    let claims = Claims {
        sub: user_id.to_string(),
        role: role.to_string(),
        kind,
        exp,
    };
    Ok(encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )?)
}

pub fn decode_token(config: &PortalConfig, token: &str) -> ApiResult<Claims> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.jwt_secret.as_bytes()),
        &Validation::new(Algorithm::HS256),
    )
    .map(|data| data.claims)
    .map_err(|_| ApiError::Unauthorized("Authentication required or session invalid".to_string()))
}

/// `Set-Cookie` value for the session token
pub fn session_cookie(config: &PortalConfig, name: &str, value: &str, http_only: bool) -> String {
    let mut cookie = format!(
        "{}={}; Path=/; SameSite=Lax; Max-Age={}",
        name, value, config.token_ttl_secs
    );
    if http_only {
        cookie.push_str("; HttpOnly");
    }
    if config.secure_cookies {
        cookie.push_str("; Secure");
    }
    cookie
}

/// `Set-Cookie` value that removes a cookie
pub fn expired_cookie(name: &str) -> String {
    format!("{}=; Path=/; Max-Age=0", name)
}

/// Cookie values are only set for ids that need no escaping
pub fn is_cookie_safe(value: &str) -> bool {
    !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

fn request_user_id(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

async fn upgrade_legacy_password(
    pool: &SqlitePool,
    config: &PortalConfig,
    sql_for_hash: impl FnOnce(&str) -> String,
    password: &str,
    user_id: &str,
) {
    let result = match hash_password(config, password) {
        Ok(hash) => sqlx::query(&sql_for_hash(&hash))
            .execute(pool)
            .await
            .map(|_| ())
            .map_err(ApiError::from),
        Err(e) => Err(e),
    };
    match result {
        Ok(()) => info!("Replaced plaintext password of {} with a bcrypt hash", user_id),
        Err(e) => warn!("Failed to upgrade plaintext password of {}: {}", user_id, e),
    }
}

/// Check admins first, then candidates, and issue a session token
pub async fn login(
    pool: &SqlitePool,
    config: &PortalConfig,
    request: &LoginRequest,
    now: DateTime<Utc>,
) -> ApiResult<LoginResponse> {
    let (Some(user_id), Some(password)) = (
        request_user_id(request.user_id.as_ref()),
        request.password.as_deref().filter(|p| !p.is_empty()),
    ) else {
        return Err(ApiError::InvalidArgument(
            "User ID and password are required".to_string(),
        ));
    };

    if let Some(admin) = sqlx::query(&admins::select_credentials(&user_id))
        .fetch_optional(pool)
        .await?
    {
        let stored: Option<String> = admin.try_get("password")?;
        let check = verify_password(password, stored.as_deref())?;
        if check != PasswordCheck::Invalid {
            let admin_id: String = admin.try_get("user_id")?;
            let role: Option<String> = admin.try_get("role")?;
            let role = role.unwrap_or_else(|| "admin".to_string());
            if check == PasswordCheck::ValidLegacy {
                upgrade_legacy_password(
                    pool,
                    config,
                    |hash| admins::update_password(&admin_id, hash),
                    password,
                    &admin_id,
                )
                .await;
            }
            let token = issue_token(config, &admin_id, &role, AccountKind::Admin, now)?;
            info!("Admin {} logged in", admin_id);
            return Ok(LoginResponse {
                user_id: admin_id,
                token,
                role,
                kind: AccountKind::Admin,
            });
        }
    }

    let Some(candidate) = sqlx::query(&candidates::select_credentials(&user_id))
        .fetch_optional(pool)
        .await?
    else {
        warn!("Rejected login for unknown user {}", user_id);
        return Err(ApiError::Unauthorized(INVALID_CREDENTIALS.to_string()));
    };

    let stored: Option<String> = candidate.try_get("password")?;
    let check = verify_password(password, stored.as_deref())?;
    if check == PasswordCheck::Invalid {
        warn!("Rejected login for {}: wrong password", user_id);
        return Err(ApiError::Unauthorized(INVALID_CREDENTIALS.to_string()));
    }

    let candidate_id: String = candidate.try_get("user_id")?;
    let login_flag: Option<String> = candidate.try_get("login")?;
    if config.login_policy == LoginPolicy::SingleSession
        && crate::playback::parse_flag(login_flag.as_deref())
    {
        warn!("Rejected login for {}: already logged in", candidate_id);
        return Err(ApiError::Unauthorized(
            "User is already logged in elsewhere".to_string(),
        ));
    }

    if check == PasswordCheck::ValidLegacy {
        upgrade_legacy_password(
            pool,
            config,
            |hash| candidates::update_password(&candidate_id, hash),
            password,
            &candidate_id,
        )
        .await;
    }

    sqlx::query(&candidates::update_login(&candidate_id, true))
        .execute(pool)
        .await?;
    record_first_access(pool, config, &candidate_id, Activity::Login, now).await?;

    let token = issue_token(
        config,
        &candidate_id,
        CANDIDATE_ROLE,
        AccountKind::Candidate,
        now,
    )?;
    info!("Candidate {} logged in", candidate_id);
    Ok(LoginResponse {
        user_id: candidate_id,
        token,
        role: CANDIDATE_ROLE.to_string(),
        kind: AccountKind::Candidate,
    })
}

/// Clear the candidate's login flag and stamp the logout
pub async fn logout(
    pool: &SqlitePool,
    config: &PortalConfig,
    user_id: &str,
    now: DateTime<Utc>,
) -> ApiResult<()> {
    let result = sqlx::query(&candidates::update_login(user_id, false))
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound("User not found".to_string()));
    }
    record_first_access(pool, config, user_id, Activity::Logout, now).await?;
    info!("Candidate {} logged out", user_id);
    Ok(())
}

pub async fn list_admins(pool: &SqlitePool) -> ApiResult<Vec<AdminSummary>> {
    let rows = sqlx::query(&admins::select_all()).fetch_all(pool).await?;
    rows.iter()
        .map(|row| {
            Ok(AdminSummary {
                user_id: row.try_get("user_id")?,
                role: row.try_get("role")?,
            })
        })
        .collect()
}

/// Store a new admin with a hashed password and return its id
pub async fn create_admin(
    pool: &SqlitePool,
    config: &PortalConfig,
    role: &str,
    password: &str,
) -> ApiResult<i64> {
    if role.trim().is_empty() || password.is_empty() {
        return Err(ApiError::InvalidArgument(
            "Role and password are required".to_string(),
        ));
    }
    let hash = hash_password(config, password)?;
    let result = sqlx::query(&admins::insert(role.trim(), &hash))
        .execute(pool)
        .await?;
    let id = result.last_insert_rowid();
    info!("User added with ID {}", id);
    Ok(id)
}

/// Hash every plaintext password in users and exuser; returns how many changed
pub async fn upgrade_plaintext_passwords(
    pool: &SqlitePool,
    config: &PortalConfig,
) -> ApiResult<usize> {
    let mut upgraded = 0;

    let rows = sqlx::query(&admins::select_all_credentials())
        .fetch_all(pool)
        .await?;
    for row in rows {
        let user_id: String = row.try_get("user_id")?;
        let password: Option<String> = row.try_get("password")?;
        if let Some(password) = password.filter(|p| !p.is_empty() && !is_bcrypt_hash(p)) {
            let hash = hash_password(config, &password)?;
            sqlx::query(&admins::update_password(&user_id, &hash))
                .execute(pool)
                .await?;
            upgraded += 1;
        }
    }

    let rows = sqlx::query(&candidates::select_all_credentials())
        .fetch_all(pool)
        .await?;
    for row in rows {
        let user_id: String = row.try_get("user_id")?;
        let password: Option<String> = row.try_get("password")?;
        if let Some(password) = password.filter(|p| !p.is_empty() && !is_bcrypt_hash(p)) {
            let hash = hash_password(config, &password)?;
            sqlx::query(&candidates::update_password(&user_id, &hash))
                .execute(pool)
                .await?;
            upgraded += 1;
        }
    }

    Ok(upgraded)
}

/// Authenticated caller, taken from a bearer token or the session cookie
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub user_id: String,
    pub role: String,
    pub kind: AccountKind,
}

impl AuthSession {
    pub fn require_admin(&self) -> ApiResult<()> {
        match self.kind {
            AccountKind::Admin => Ok(()),
            AccountKind::Candidate => Err(ApiError::Forbidden("Insufficient permissions".to_string())),
        }
    }

    /// Admins may act for any candidate; candidates only for themselves
    pub fn require_candidate_access(&self, user_id: &str) -> ApiResult<()> {
        match self.kind {
            AccountKind::Admin => Ok(()),
            AccountKind::Candidate if self.user_id == user_id => Ok(()),
            AccountKind::Candidate => Err(ApiError::Forbidden("Insufficient permissions".to_string())),
        }
    }
}

fn token_from_parts(parts: &Parts) -> Option<String> {
    if let Some(bearer) = parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
    {
        return Some(bearer.trim().to_string());
    }

    parts
        .headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|h| h.to_str().ok())
        .flat_map(|h| h.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == AUTH_COOKIE)
        .map(|(_, value)| value.to_string())
}

impl FromRequestParts<StdArc<AppState>> for AuthSession {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &StdArc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = token_from_parts(parts).ok_or_else(|| {
            ApiError::Unauthorized("Authentication required or session invalid".to_string())
        })?;
        let claims = decode_token(&state.config, &token)?;
        Ok(AuthSession {
            user_id: claims.sub,
            role: claims.role,
            kind: claims.kind,
        })
    }
}
