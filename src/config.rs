use chrono::{DateTime, FixedOffset, Offset, Utc};
use clap::ValueEnum;
use serde::{Deserialize, Deserializer};
use std::path::{Path, PathBuf};

use crate::cipher::LinkCipher;

/// What happens when a candidate whose login flag is already set logs in again
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LoginPolicy {
    /// Reject the second login until the candidate logs out
    #[default]
    SingleSession,
    /// Ignore the login flag and always issue a new token
    AllowConcurrent,
}

fn default_database_path() -> PathBuf {
    PathBuf::from("exam_portal.sqlite")
}

fn default_api_port() -> u16 {
    5000
}

fn default_token_ttl_secs() -> u64 {
    24 * 60 * 60
}

fn default_fallback_link() -> String {
    "about:blank".to_string()
}

fn default_utc_offset() -> FixedOffset {
    // +05:30 is always in range
    offset_from_minutes(330).unwrap_or_else(|_| Utc.fix())
}

fn offset_from_minutes(minutes: i32) -> Result<FixedOffset, String> {
    minutes
        .checked_mul(60)
        .and_then(FixedOffset::east_opt)
        .ok_or_else(|| format!("utc_offset_minutes {} is out of range", minutes))
}

fn deserialize_utc_offset<'de, D>(deserializer: D) -> Result<FixedOffset, D::Error>
where
    D: Deserializer<'de>,
{
    let minutes = i32::deserialize(deserializer)?;
    offset_from_minutes(minutes).map_err(serde::de::Error::custom)
}

fn default_timestamp_format() -> String {
    "%d/%m/%Y, %I:%M:%S %p".to_string()
}

fn default_bcrypt_cost() -> u32 {
    bcrypt::DEFAULT_COST
}

/// Portal configuration file structure
#[derive(Debug, Clone, Deserialize)]
pub struct PortalConfig {
    /// SQLite database file (default: exam_portal.sqlite)
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
    /// API server port (default: 5000)
    #[serde(default = "default_api_port")]
    pub api_port: u16,
    /// HS256 signing secret for session tokens (required)
    pub jwt_secret: String,
    /// Token lifetime in seconds (default: 1 day)
    #[serde(default = "default_token_ttl_secs")]
    pub token_ttl_secs: u64,
    /// Add the Secure attribute to session cookies (default: false)
    #[serde(default)]
    pub secure_cookies: bool,
    /// Behaviour for candidates that are already logged in
    #[serde(default)]
    pub login_policy: LoginPolicy,
    /// Link returned for a stage the candidate has already played to the end
    #[serde(default = "default_fallback_link")]
    pub fallback_link: String,
    /// Shared key used to seal audio links before delivery (optional)
    pub link_cipher_key: Option<String>,
    /// Offset applied to activity timestamps, in minutes east of UTC (default: +05:30)
    #[serde(
        rename = "utc_offset_minutes",
        default = "default_utc_offset",
        deserialize_with = "deserialize_utc_offset"
    )]
    pub utc_offset: FixedOffset,
    /// chrono format string for activity timestamps
    #[serde(default = "default_timestamp_format")]
    pub timestamp_format: String,
    /// bcrypt work factor for newly stored passwords
    #[serde(default = "default_bcrypt_cost")]
    pub bcrypt_cost: u32,
}

impl PortalConfig {
    /// Read and validate a TOML configuration file
    pub fn load(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file '{}': {}", path.display(), e))?;
        let config: PortalConfig = toml::from_str(&content)
            .map_err(|e| format!("Failed to parse config file '{}': {}", path.display(), e))?;
        config.validate()?;
        Ok(config)
    }

    /// Configuration with defaults everywhere except the secret
    pub fn with_secret(jwt_secret: impl Into<String>) -> Self {
        Self {
            database_path: default_database_path(),
            api_port: default_api_port(),
            jwt_secret: jwt_secret.into(),
            token_ttl_secs: default_token_ttl_secs(),
            secure_cookies: false,
            login_policy: LoginPolicy::default(),
            fallback_link: default_fallback_link(),
            link_cipher_key: None,
            utc_offset: default_utc_offset(),
            timestamp_format: default_timestamp_format(),
            bcrypt_cost: default_bcrypt_cost(),
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.jwt_secret.trim().len() < 16 {
            return Err("jwt_secret must be at least 16 characters".to_string());
        }
        if self.token_ttl_secs == 0 {
            return Err("token_ttl_secs must be greater than zero".to_string());
        }
        if !(4..=31).contains(&self.bcrypt_cost) {
            return Err(format!(
                "bcrypt_cost must be between 4 and 31, got {}",
                self.bcrypt_cost
            ));
        }
        if let Some(key) = &self.link_cipher_key {
            if key.is_empty() {
                return Err("link_cipher_key must not be empty when set".to_string());
            }
        }
        Ok(())
    }

    pub fn link_cipher(&self) -> Option<LinkCipher> {
        self.link_cipher_key.as_deref().map(LinkCipher::new)
    }

    /// Render an instant the way activity log columns store it
    pub fn local_timestamp(&self, now: DateTime<Utc>) -> String {
        now.with_timezone(&self.utc_offset)
            .format(&self.timestamp_format)
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config: PortalConfig =
            toml::from_str(r#"jwt_secret = "0123456789abcdef0123""#).unwrap();
        assert_eq!(config.api_port, 5000);
        assert_eq!(config.token_ttl_secs, 86400);
        assert_eq!(config.login_policy, LoginPolicy::SingleSession);
        assert!(config.link_cipher_key.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_login_policy_from_toml() {
        let config: PortalConfig = toml::from_str(
            r#"
            jwt_secret = "0123456789abcdef0123"
            login_policy = "allow_concurrent"
            "#,
        )
        .unwrap();
        assert_eq!(config.login_policy, LoginPolicy::AllowConcurrent);
    }

    #[test]
    fn test_short_secret_rejected() {
        let config = PortalConfig::with_secret("short");
        assert!(config.validate().unwrap_err().contains("jwt_secret"));
    }

    #[test]
    fn test_out_of_range_offset_rejected_when_parsed() {
        let result: Result<PortalConfig, _> = toml::from_str(
            r#"
            jwt_secret = "0123456789abcdef0123"
            utc_offset_minutes = 1440
            "#,
        );
        assert!(result.unwrap_err().to_string().contains("out of range"));

        let config: PortalConfig = toml::from_str(
            r#"
            jwt_secret = "0123456789abcdef0123"
            utc_offset_minutes = -300
            "#,
        )
        .unwrap();
        assert_eq!(config.utc_offset.local_minus_utc(), -300 * 60);
        assert_eq!(
            PortalConfig::with_secret("0123456789abcdef0123")
                .utc_offset
                .local_minus_utc(),
            330 * 60
        );
    }

    #[test]
    fn test_bad_cost_rejected() {
        let mut config = PortalConfig::with_secret("0123456789abcdef0123");
        config.bcrypt_cost = 2;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_local_timestamp_applies_offset() {
        let mut config = PortalConfig::with_secret("0123456789abcdef0123");
        config.timestamp_format = "%Y-%m-%d %H:%M:%S".to_string();
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 20, 0, 0).unwrap();
        assert_eq!(config.local_timestamp(now), "2026-03-02 01:30:00");
    }
}
