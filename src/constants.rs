/// Expected database schema version
/// All databases must use this version for compatibility
pub const EXPECTED_DB_VERSION: &str = "1";

/// Tables that are managed by the portal itself and never exposed to the
/// generic table endpoints
pub const INTERNAL_TABLES: &[&str] = &["metadata"];

/// Multipart field names accepted for CSV uploads
pub const CSV_UPLOAD_FIELDS: &[&str] = &["csvFilePath", "file"];

/// Cookie carrying the signed session token
pub const AUTH_COOKIE: &str = "authToken";

/// Cookie carrying the candidate id after a candidate login
pub const USER_ID_COOKIE: &str = "user_id";

/// Role stamped into candidate tokens
pub const CANDIDATE_ROLE: &str = "candidate";

/// Upper bound for uploaded CSV files
pub const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;
