use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};

use crate::crypto::LabDataCipher;

/// SMTP settings; mail is only sent when `SMTP_HOST` is present.
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub secure: bool,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from: Option<String>,
}

#[derive(Clone)]
pub struct Config {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub pool_size: u32,
    pub jwt_secret: String,
    pub jwt_ttl_hours: i64,
    pub app_env: String,
    pub uploads_dir: PathBuf,
    pub frontend_url: String,
    pub bcrypt_cost: u32,
    /// Requests per minute each client IP may send to `/api`.
    pub rate_limit_per_minute: u32,
    pub lab_cipher: Option<LabDataCipher>,
    pub smtp: Option<SmtpConfig>,
}

impl Config {
    /// Reads the process environment (after `.env` has been loaded).
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let database_url = var("DATABASE_URL").ok_or_else(|| anyhow!("DATABASE_URL must be set"))?;
        let jwt_secret = var("JWT_SECRET").ok_or_else(|| anyhow!("JWT_SECRET must be set"))?;

        let lab_cipher = match var("LAB_DATA_KEY") {
            Some(key) => Some(LabDataCipher::from_base64(&key).context("LAB_DATA_KEY is invalid")?),
            None => None,
        };

        let smtp = match var("SMTP_HOST") {
            Some(host) => Some(SmtpConfig {
                host,
                port: parse_or("SMTP_PORT", var("SMTP_PORT"), 587)?,
                secure: var("SMTP_SECURE").is_some_and(|v| v == "true"),
                username: var("SMTP_USER"),
                password: var("SMTP_PASS"),
                from: var("SMTP_FROM"),
            }),
            None => None,
        };

        Ok(Config {
            database_url,
            host: var("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse_or("PORT", var("PORT"), 5000)?,
            pool_size: parse_or("DB_POOL_SIZE", var("DB_POOL_SIZE"), 10)?,
            jwt_secret,
            jwt_ttl_hours: parse_or("JWT_TTL_HOURS", var("JWT_TTL_HOURS"), 24)?,
            app_env: var("APP_ENV").unwrap_or_else(|| "production".to_string()),
            uploads_dir: PathBuf::from(var("UPLOADS_DIR").unwrap_or_else(|| "uploads".to_string())),
            frontend_url: var("FRONTEND_URL").unwrap_or_else(|| "http://localhost:5173".to_string()),
            bcrypt_cost: parse_or("BCRYPT_COST", var("BCRYPT_COST"), 10)?,
            rate_limit_per_minute: parse_or("RATE_LIMIT_PER_MINUTE", var("RATE_LIMIT_PER_MINUTE"), 200)?,
            lab_cipher,
            smtp,
        })
    }

    pub fn is_development(&self) -> bool {
        self.app_env == "development"
    }
}

fn parse_or<T>(key: &str, raw: Option<String>, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|e| anyhow!("{key} has an invalid value {value:?}: {e}")),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_only_required_vars_are_set() {
        let config = Config::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/clinic"),
            ("JWT_SECRET", "secret"),
        ]))
        .unwrap();

        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 5000);
        assert_eq!(config.jwt_ttl_hours, 24);
        assert_eq!(config.bcrypt_cost, 10);
        assert_eq!(config.rate_limit_per_minute, 200);
        assert_eq!(config.uploads_dir, PathBuf::from("uploads"));
        assert!(config.smtp.is_none());
        assert!(config.lab_cipher.is_none());
        assert!(!config.is_development());
    }

    #[test]
    fn missing_secret_is_rejected() {
        let err = Config::from_lookup(lookup(&[("DATABASE_URL", "postgres://localhost/clinic")]))
            .err()
            .unwrap();
        assert!(err.to_string().contains("JWT_SECRET"));
    }

    #[test]
    fn smtp_is_enabled_by_host() {
        let config = Config::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/clinic"),
            ("JWT_SECRET", "secret"),
            ("SMTP_HOST", "smtp.example.com"),
            ("SMTP_SECURE", "true"),
            ("SMTP_PORT", "465"),
        ]))
        .unwrap();

        let smtp = config.smtp.unwrap();
        assert_eq!(smtp.host, "smtp.example.com");
        assert_eq!(smtp.port, 465);
        assert!(smtp.secure);
        assert!(smtp.username.is_none());
    }

    #[test]
    fn bad_port_is_reported() {
        let err = Config::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/clinic"),
            ("JWT_SECRET", "secret"),
            ("PORT", "eighty"),
        ]))
        .err()
        .unwrap();
        assert!(err.to_string().contains("PORT"));
    }
}
