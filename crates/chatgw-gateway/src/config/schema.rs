//! Config schema (§6.4). Strict in the same spirit as the teacher's
//! `deny_unknown_fields` YAML config: every recognized variable is named
//! here, and validation runs once, eagerly, at startup.

use std::collections::HashMap;
use std::path::PathBuf;

use chatgw_core::error::{GatewayError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnv {
    Development,
    Production,
    Test,
}

impl AppEnv {
    fn parse(s: &str) -> Result<Self> {
        match s {
            "development" => Ok(AppEnv::Development),
            "production" => Ok(AppEnv::Production),
            "test" => Ok(AppEnv::Test),
            other => Err(GatewayError::Validation(format!(
                "APP_ENV must be one of development|production|test, got {other}"
            ))),
        }
    }

    pub fn is_production(self) -> bool {
        matches!(self, AppEnv::Production)
    }
}

#[derive(Debug, Clone)]
pub enum AllowedOrigins {
    Any,
    List(Vec<String>),
}

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub app_env: AppEnv,
    pub host: String,
    pub port: u16,
    pub base_url: String,

    pub jwt_secret: String,
    pub api_key: String,
    pub require_auth: bool,
    pub allowed_origins: AllowedOrigins,

    pub log_level: String,

    pub session_dir: PathBuf,
    pub upstream_timeout_ms: u64,
    pub qr_timeout_ms: u64,
    pub max_reconnect_attempts: u32,

    pub default_webhook_url: Option<String>,
    pub default_webhook_secret: Option<String>,

    pub rate_limit_window_ms: u64,
    pub rate_limit_max: u32,

    pub max_file_size: u64,
    pub upload_dir: PathBuf,

    pub cache_ttl_secs: u64,
}

impl GatewayConfig {
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn validate(&self) -> Result<()> {
        let min_jwt = if self.app_env.is_production() { 64 } else { 32 };
        if self.jwt_secret.len() < min_jwt {
            return Err(GatewayError::Validation(format!(
                "JWT_SECRET must be at least {min_jwt} chars in {:?}",
                self.app_env
            )));
        }
        if self.api_key.len() < 16 {
            return Err(GatewayError::Validation(
                "API_KEY must be at least 16 chars".into(),
            ));
        }
        if self.max_reconnect_attempts == 0 {
            return Err(GatewayError::Validation(
                "MAX_RECONNECT_ATTEMPTS must be > 0".into(),
            ));
        }
        if self.port == 0 {
            return Err(GatewayError::Validation("PORT must be > 0".into()));
        }
        Ok(())
    }
}

fn env_str(vars: &HashMap<String, String>, key: &str, default: &str) -> String {
    vars.get(key).cloned().unwrap_or_else(|| default.to_string())
}

fn env_u64(vars: &HashMap<String, String>, key: &str, default: u64) -> Result<u64> {
    match vars.get(key) {
        None => Ok(default),
        Some(v) => v
            .parse()
            .map_err(|_| GatewayError::Validation(format!("{key} must be an integer, got {v}"))),
    }
}

fn env_u32(vars: &HashMap<String, String>, key: &str, default: u32) -> Result<u32> {
    match vars.get(key) {
        None => Ok(default),
        Some(v) => v
            .parse()
            .map_err(|_| GatewayError::Validation(format!("{key} must be an integer, got {v}"))),
    }
}

fn env_bool(vars: &HashMap<String, String>, key: &str, default: bool) -> Result<bool> {
    match vars.get(key).map(|s| s.as_str()) {
        None => Ok(default),
        Some("true") | Some("1") => Ok(true),
        Some("false") | Some("0") => Ok(false),
        Some(other) => Err(GatewayError::Validation(format!(
            "{key} must be a boolean, got {other}"
        ))),
    }
}

/// Parse a `GatewayConfig` out of a plain string map — the testable core of
/// `from_env` (mirrors the teacher's `load_from_str`/`load_from_file` split).
pub fn from_map(vars: &HashMap<String, String>) -> Result<GatewayConfig> {
    let app_env = AppEnv::parse(&env_str(vars, "APP_ENV", "development"))?;

    let allowed_origins = match vars.get("ALLOWED_ORIGINS").map(|s| s.as_str()) {
        None | Some("*") => AllowedOrigins::Any,
        Some(csv) => AllowedOrigins::List(csv.split(',').map(|s| s.trim().to_string()).collect()),
    };

    let cfg = GatewayConfig {
        app_env,
        host: env_str(vars, "HOST", "0.0.0.0"),
        port: env_u64(vars, "PORT", 8080)? as u16,
        base_url: env_str(vars, "BASE_URL", "http://localhost:8080"),

        jwt_secret: env_str(vars, "JWT_SECRET", ""),
        api_key: env_str(vars, "API_KEY", ""),
        require_auth: env_bool(vars, "REQUIRE_AUTH", true)?,
        allowed_origins,

        log_level: env_str(vars, "LOG_LEVEL", "info"),

        session_dir: PathBuf::from(env_str(vars, "SESSION_DIR", "./sessions")),
        upstream_timeout_ms: env_u64(vars, "UPSTREAM_TIMEOUT_MS", 60_000)?,
        qr_timeout_ms: env_u64(vars, "QR_TIMEOUT_MS", 120_000)?,
        max_reconnect_attempts: env_u32(vars, "MAX_RECONNECT_ATTEMPTS", 5)?,

        default_webhook_url: vars.get("DEFAULT_WEBHOOK_URL").cloned(),
        default_webhook_secret: vars.get("DEFAULT_WEBHOOK_SECRET").cloned(),

        rate_limit_window_ms: env_u64(vars, "RATE_LIMIT_WINDOW_MS", 60_000)?,
        rate_limit_max: env_u32(vars, "RATE_LIMIT_MAX", 100)?,

        max_file_size: env_u64(vars, "MAX_FILE_SIZE", 10 * 1024 * 1024)?,
        upload_dir: PathBuf::from(env_str(vars, "UPLOAD_DIR", "./uploads")),

        cache_ttl_secs: env_u64(vars, "CACHE_TTL_SECS", 300)?,
    };

    cfg.validate()?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
    use super::*;

    fn base_vars() -> HashMap<String, String> {
        let mut m = HashMap::new();
        m.insert("JWT_SECRET".into(), "x".repeat(32));
        m.insert("API_KEY".into(), "y".repeat(16));
        m
    }

    #[test]
    fn defaults_fill_in_missing_keys() {
        let cfg = from_map(&base_vars()).expect("valid config");
        assert_eq!(cfg.port, 8080);
        assert_eq!(cfg.max_reconnect_attempts, 5);
        assert!(matches!(cfg.allowed_origins, AllowedOrigins::Any));
    }

    #[test]
    fn production_requires_longer_jwt_secret() {
        let mut vars = base_vars();
        vars.insert("APP_ENV".into(), "production".into());
        let err = from_map(&vars).expect_err("too short in production");
        assert!(matches!(err, GatewayError::Validation(_)));

        vars.insert("JWT_SECRET".into(), "z".repeat(64));
        assert!(from_map(&vars).is_ok());
    }

    #[test]
    fn invalid_app_env_is_rejected() {
        let mut vars = base_vars();
        vars.insert("APP_ENV".into(), "staging".into());
        assert!(from_map(&vars).is_err());
    }

    #[test]
    fn allowed_origins_csv_is_split_and_trimmed() {
        let mut vars = base_vars();
        vars.insert(
            "ALLOWED_ORIGINS".into(),
            "https://a.example, https://b.example".into(),
        );
        let cfg = from_map(&vars).expect("valid config");
        match cfg.allowed_origins {
            AllowedOrigins::List(list) => {
                assert_eq!(list, vec!["https://a.example", "https://b.example"]);
            }
            AllowedOrigins::Any => panic!("expected explicit list"),
        }
    }
}
