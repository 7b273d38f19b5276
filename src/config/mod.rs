//! Configuration loading for the NFC cards API.
//!
//! Loads layered `.env` files and environment variables prefixed with
//! `NFC_`, producing a typed [`AppConfig`].

use std::{collections::BTreeMap, env, net::SocketAddr, path::PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

const ENV_PREFIX: &str = "NFC_";
const REDACTED: &str = "[REDACTED]";
const MIN_PRODUCTION_JWT_SECRET_LEN: usize = 32;

/// Application configuration derived from `NFC_*` environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct AppConfig {
    #[serde(default = "default_profile")]
    pub profile: String,
    #[serde(default = "default_api_bind_addr")]
    pub api_bind_addr: String,
    /// Path prefix every resource route is mounted under
    #[serde(default = "default_api_prefix")]
    pub api_prefix: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_log_format")]
    pub log_format: String,
    #[serde(default = "default_database_url")]
    pub database_url: String,
    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,
    #[serde(default = "default_db_acquire_timeout_ms")]
    pub db_acquire_timeout_ms: u64,
    /// CA bundle used to verify the Postgres server certificate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db_ssl_root_cert: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jwt_secret: Option<String>,
    #[serde(default = "default_jwt_expiration_seconds")]
    pub jwt_expiration_seconds: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cloudinary_cloud_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cloudinary_api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cloudinary_api_secret: Option<String>,
    #[serde(default = "default_cloudinary_api_base")]
    pub cloudinary_api_base: String,
    /// Top-level folder for uploaded card media
    #[serde(default = "default_media_root_folder")]
    pub media_root_folder: String,
    /// Per-file upload limit in bytes
    #[serde(default = "default_media_max_file_bytes")]
    pub media_max_file_bytes: usize,
    /// Allowed CORS origins; empty allows any origin
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cors_allowed_origins: Vec<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            profile: default_profile(),
            api_bind_addr: default_api_bind_addr(),
            api_prefix: default_api_prefix(),
            log_level: default_log_level(),
            log_format: default_log_format(),
            database_url: default_database_url(),
            db_max_connections: default_db_max_connections(),
            db_acquire_timeout_ms: default_db_acquire_timeout_ms(),
            db_ssl_root_cert: None,
            jwt_secret: None,
            jwt_expiration_seconds: default_jwt_expiration_seconds(),
            cloudinary_cloud_name: None,
            cloudinary_api_key: None,
            cloudinary_api_secret: None,
            cloudinary_api_base: default_cloudinary_api_base(),
            media_root_folder: default_media_root_folder(),
            media_max_file_bytes: default_media_max_file_bytes(),
            cors_allowed_origins: Vec::new(),
        }
    }
}

impl AppConfig {
    /// Returns the configured bind address as a socket address.
    pub fn bind_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        self.api_bind_addr.parse()
    }

    fn is_local_profile(&self) -> bool {
        matches!(self.profile.as_str(), "local" | "test")
    }

    /// True when all three Cloudinary credentials are present.
    pub fn cloudinary_configured(&self) -> bool {
        self.cloudinary_cloud_name.is_some()
            && self.cloudinary_api_key.is_some()
            && self.cloudinary_api_secret.is_some()
    }

    /// Returns a redacted JSON representation (secrets are redacted).
    pub fn redacted_json(&self) -> serde_json::Result<String> {
        let mut config = self.clone();
        if config.jwt_secret.is_some() {
            config.jwt_secret = Some(REDACTED.to_string());
        }
        if config.cloudinary_api_key.is_some() {
            config.cloudinary_api_key = Some(REDACTED.to_string());
        }
        if config.cloudinary_api_secret.is_some() {
            config.cloudinary_api_secret = Some(REDACTED.to_string());
        }
        config.database_url = redact_url_password(&config.database_url);
        serde_json::to_string_pretty(&config)
    }

    /// Validates the configuration, returning an error if required settings are missing.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.jwt_secret.as_deref() {
            None | Some("") => return Err(ConfigError::MissingJwtSecret),
            Some(secret)
                if !self.is_local_profile() && secret.len() < MIN_PRODUCTION_JWT_SECRET_LEN =>
            {
                return Err(ConfigError::WeakJwtSecret {
                    length: secret.len(),
                    minimum: MIN_PRODUCTION_JWT_SECRET_LEN,
                });
            }
            Some(_) => {}
        }

        if self.jwt_expiration_seconds == 0 {
            return Err(ConfigError::InvalidJwtExpiration);
        }

        if !self.is_local_profile() && !self.cloudinary_configured() {
            return Err(ConfigError::MissingCloudinaryCredentials);
        }

        if self.media_max_file_bytes == 0 {
            return Err(ConfigError::InvalidUploadLimit);
        }

        if !self.api_prefix.starts_with('/') || self.api_prefix.ends_with('/') {
            return Err(ConfigError::InvalidApiPrefix {
                value: self.api_prefix.clone(),
            });
        }

        Ok(())
    }
}

fn redact_url_password(raw: &str) -> String {
    match url::Url::parse(raw) {
        Ok(mut parsed) if parsed.password().is_some() => {
            if parsed.set_password(Some(REDACTED)).is_ok() {
                parsed.to_string()
            } else {
                raw.to_string()
            }
        }
        _ => raw.to_string(),
    }
}

fn default_profile() -> String {
    "local".to_string()
}

fn default_api_bind_addr() -> String {
    "0.0.0.0:8888".to_string()
}

fn default_api_prefix() -> String {
    "/api/v1".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

fn default_database_url() -> String {
    "postgres://postgres@localhost:5432/nfc_cards".to_string()
}

fn default_db_max_connections() -> u32 {
    10
}

fn default_db_acquire_timeout_ms() -> u64 {
    5000
}

fn default_jwt_expiration_seconds() -> u64 {
    86_400 // 24 hours
}

fn default_cloudinary_api_base() -> String {
    "https://api.cloudinary.com/v1_1".to_string()
}

fn default_media_root_folder() -> String {
    "nfc_cards".to_string()
}

fn default_media_max_file_bytes() -> usize {
    10 * 1024 * 1024
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load environment file {path}: {source}")]
    EnvFile {
        path: PathBuf,
        source: dotenvy::Error,
    },
    #[error("invalid api bind address '{value}': {source}")]
    InvalidBindAddr {
        value: String,
        source: std::net::AddrParseError,
    },
    #[error("JWT secret is missing; set NFC_JWT_SECRET")]
    MissingJwtSecret,
    #[error("JWT secret must be at least {minimum} bytes outside local/test, got {length}")]
    WeakJwtSecret { length: usize, minimum: usize },
    #[error("JWT expiration must be positive")]
    InvalidJwtExpiration,
    #[error(
        "Cloudinary credentials are missing; set NFC_CLOUDINARY_CLOUD_NAME, NFC_CLOUDINARY_API_KEY and NFC_CLOUDINARY_API_SECRET"
    )]
    MissingCloudinaryCredentials,
    #[error("media upload limit must be positive")]
    InvalidUploadLimit,
    #[error("api prefix must start with '/' and not end with '/', got '{value}'")]
    InvalidApiPrefix { value: String },
    #[error("invalid value '{value}' for {key}")]
    InvalidValue { key: &'static str, value: String },
}

pub struct ConfigLoader {
    base_dir: PathBuf,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self {
            base_dir: env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
        }
    }

    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    pub fn load(&self) -> Result<AppConfig, ConfigError> {
        let (mut layered, profile_hint) = self.collect_layered_env()?;

        for (key, value) in env::vars() {
            if let Some(stripped) = key.strip_prefix(ENV_PREFIX) {
                layered.insert(stripped.to_string(), value);
            }
        }

        let profile = layered
            .remove("PROFILE")
            .filter(|v| !v.is_empty())
            .unwrap_or(profile_hint);
        let api_bind_addr = layered
            .remove("API_BIND_ADDR")
            .filter(|v| !v.is_empty())
            .unwrap_or_else(default_api_bind_addr);
        let api_prefix = layered
            .remove("API_PREFIX")
            .filter(|v| !v.is_empty())
            .unwrap_or_else(default_api_prefix);
        let log_level = layered
            .remove("LOG_LEVEL")
            .filter(|v| !v.is_empty())
            .unwrap_or_else(default_log_level);
        let log_format = layered
            .remove("LOG_FORMAT")
            .filter(|v| !v.is_empty())
            .unwrap_or_else(default_log_format);
        let database_url = layered
            .remove("DATABASE_URL")
            .filter(|v| !v.is_empty())
            .unwrap_or_else(default_database_url);
        let db_max_connections = parse_or(
            &mut layered,
            "DB_MAX_CONNECTIONS",
            default_db_max_connections,
        )?;
        let db_acquire_timeout_ms = parse_or(
            &mut layered,
            "DB_ACQUIRE_TIMEOUT_MS",
            default_db_acquire_timeout_ms,
        )?;
        let db_ssl_root_cert = non_empty(layered.remove("DB_SSL_ROOT_CERT"));
        let jwt_secret = non_empty(layered.remove("JWT_SECRET"));
        let jwt_expiration_seconds = parse_or(
            &mut layered,
            "JWT_EXPIRATION_SECONDS",
            default_jwt_expiration_seconds,
        )?;
        let cloudinary_cloud_name = non_empty(layered.remove("CLOUDINARY_CLOUD_NAME"));
        let cloudinary_api_key = non_empty(layered.remove("CLOUDINARY_API_KEY"));
        let cloudinary_api_secret = non_empty(layered.remove("CLOUDINARY_API_SECRET"));
        let cloudinary_api_base = layered
            .remove("CLOUDINARY_API_BASE")
            .filter(|v| !v.is_empty())
            .map(|v| v.trim_end_matches('/').to_string())
            .unwrap_or_else(default_cloudinary_api_base);
        let media_root_folder = layered
            .remove("MEDIA_ROOT_FOLDER")
            .filter(|v| !v.is_empty())
            .unwrap_or_else(default_media_root_folder);
        let media_max_file_bytes = parse_or(
            &mut layered,
            "MEDIA_MAX_FILE_BYTES",
            default_media_max_file_bytes,
        )?;
        let cors_allowed_origins = layered
            .remove("CORS_ALLOWED_ORIGINS")
            .map(|origins| {
                origins
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty() && s != "*")
                    .collect()
            })
            .unwrap_or_default();

        let config = AppConfig {
            profile,
            api_bind_addr,
            api_prefix,
            log_level,
            log_format,
            database_url,
            db_max_connections,
            db_acquire_timeout_ms,
            db_ssl_root_cert,
            jwt_secret,
            jwt_expiration_seconds,
            cloudinary_cloud_name,
            cloudinary_api_key,
            cloudinary_api_secret,
            cloudinary_api_base,
            media_root_folder,
            media_max_file_bytes,
            cors_allowed_origins,
        };

        config.validate()?;

        match config.bind_addr() {
            Ok(_) => Ok(config),
            Err(source) => Err(ConfigError::InvalidBindAddr {
                value: config.api_bind_addr.clone(),
                source,
            }),
        }
    }

    fn collect_layered_env(&self) -> Result<(BTreeMap<String, String>, String), ConfigError> {
        let mut values = BTreeMap::new();

        self.merge_dotenv(self.base_dir.join(".env"), &mut values)?;
        self.merge_dotenv(self.base_dir.join(".env.local"), &mut values)?;

        let profile = env::var(format!("{ENV_PREFIX}PROFILE"))
            .ok()
            .or_else(|| values.get("PROFILE").cloned())
            .unwrap_or_else(default_profile);

        self.merge_dotenv(
            self.base_dir.join(format!(".env.{}", &profile)),
            &mut values,
        )?;
        self.merge_dotenv(
            self.base_dir.join(format!(".env.{}.local", &profile)),
            &mut values,
        )?;

        Ok((values, profile))
    }

    fn merge_dotenv(
        &self,
        path: PathBuf,
        values: &mut BTreeMap<String, String>,
    ) -> Result<(), ConfigError> {
        match dotenvy::from_path_iter(&path) {
            Ok(iter) => {
                for item in iter {
                    let (key, value) = item.map_err(|source| ConfigError::EnvFile {
                        path: path.clone(),
                        source,
                    })?;
                    if let Some(stripped) = key.strip_prefix(ENV_PREFIX) {
                        values.insert(stripped.to_string(), value);
                    }
                }
                Ok(())
            }
            Err(dotenvy::Error::Io(ref io_err))
                if io_err.kind() == std::io::ErrorKind::NotFound =>
            {
                Ok(())
            }
            Err(err) => Err(ConfigError::EnvFile { path, source: err }),
        }
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_or<T: std::str::FromStr>(
    layered: &mut BTreeMap<String, String>,
    key: &'static str,
    default: fn() -> T,
) -> Result<T, ConfigError> {
    match layered.remove(key).filter(|v| !v.trim().is_empty()) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue { key, value: raw }),
        None => Ok(default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> AppConfig {
        AppConfig {
            jwt_secret: Some("local-secret".to_string()),
            ..AppConfig::default()
        }
    }

    #[test]
    fn test_defaults_validate_with_secret() {
        let config = valid_config();
        assert!(config.validate().is_ok());
        assert_eq!(config.api_prefix, "/api/v1");
        assert_eq!(config.media_max_file_bytes, 10 * 1024 * 1024);
        assert!(config.bind_addr().is_ok());
    }

    #[test]
    fn test_missing_jwt_secret_is_rejected() {
        let config = AppConfig::default();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingJwtSecret)
        ));
    }

    #[test]
    fn test_production_requires_strong_secret_and_cloudinary() {
        let mut config = AppConfig {
            profile: "production".to_string(),
            jwt_secret: Some("short".to_string()),
            ..AppConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::WeakJwtSecret { length: 5, .. })
        ));

        config.jwt_secret = Some("x".repeat(48));
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingCloudinaryCredentials)
        ));

        config.cloudinary_cloud_name = Some("demo".to_string());
        config.cloudinary_api_key = Some("key".to_string());
        config.cloudinary_api_secret = Some("secret".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_api_prefix_shape() {
        let config = AppConfig {
            api_prefix: "api/v1/".to_string(),
            ..valid_config()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidApiPrefix { .. })
        ));
    }

    #[test]
    fn test_redacted_json_hides_secrets() {
        let config = AppConfig {
            database_url: "postgres://app:hunter2@db:5432/cards".to_string(),
            cloudinary_api_secret: Some("cloud-secret".to_string()),
            ..valid_config()
        };

        let json = config.redacted_json().unwrap();
        assert!(!json.contains("local-secret"));
        assert!(!json.contains("cloud-secret"));
        assert!(!json.contains("hunter2"));
        assert!(json.contains(REDACTED));
    }
}
