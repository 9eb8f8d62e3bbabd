//! Configuration module
//!
//! Loads configuration from environment variables.

use std::env;
use std::str::FromStr;

use chrono::Duration;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Database connection URL
    pub database_url: String,

    /// Maximum database connections in pool
    pub database_max_connections: u32,

    /// Server host
    pub host: String,

    /// Server port
    pub port: u16,

    /// Environment (development, production)
    pub environment: String,

    /// Lifetime of a login OTP
    pub otp_ttl_minutes: i64,

    /// Lifetime of a bearer session
    pub session_ttl_hours: i64,

    /// Lifetime of a password reset token
    pub reset_token_ttl_minutes: i64,

    /// Code accepted by verify-otp for any user (testing only)
    pub otp_bypass_code: Option<String>,

    /// Statement currency when no transaction names one
    pub default_currency: String,

    /// Base URL for links sent by email
    pub frontend_url: String,

    /// Sender address of outgoing email
    pub mail_from: String,
}

fn parse_or<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(raw) => raw.parse().map_err(|_| ConfigError::InvalidValue(key)),
        Err(_) => Ok(default),
    }
}

fn positive(key: &'static str, value: i64) -> Result<i64, ConfigError> {
    if value > 0 {
        Ok(value)
    } else {
        Err(ConfigError::InvalidValue(key))
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url = env::var("DATABASE_URL")
            .map_err(|_| ConfigError::MissingEnv("DATABASE_URL"))?;

        let database_max_connections = parse_or("DATABASE_MAX_CONNECTIONS", 10)?;
        let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = parse_or("PORT", 3000)?;
        let environment = env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());

        let otp_ttl_minutes = positive("OTP_TTL_MINUTES", parse_or("OTP_TTL_MINUTES", 10)?)?;
        let session_ttl_hours = positive("SESSION_TTL_HOURS", parse_or("SESSION_TTL_HOURS", 24)?)?;
        let reset_token_ttl_minutes =
            positive("RESET_TOKEN_TTL_MINUTES", parse_or("RESET_TOKEN_TTL_MINUTES", 60)?)?;

        let otp_bypass_code = env::var("OTP_BYPASS_CODE").ok().filter(|c| !c.is_empty());

        let default_currency = env::var("DEFAULT_CURRENCY").unwrap_or_else(|_| "USD".to_string());
        let frontend_url = env::var("FRONTEND_URL")
            .unwrap_or_else(|_| "http://localhost:3000".to_string())
            .trim_end_matches('/')
            .to_string();
        let mail_from = env::var("MAIL_FROM").unwrap_or_else(|_| "no-reply@localhost".to_string());

        let config = Self {
            database_url,
            database_max_connections,
            host,
            port,
            environment,
            otp_ttl_minutes,
            session_ttl_hours,
            reset_token_ttl_minutes,
            otp_bypass_code,
            default_currency,
            frontend_url,
            mail_from,
        };

        if config.is_production() && config.otp_bypass_code.is_some() {
            tracing::warn!("OTP_BYPASS_CODE is set in production");
        }

        Ok(config)
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    pub fn otp_ttl(&self) -> Duration {
        Duration::minutes(self.otp_ttl_minutes)
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::hours(self.session_ttl_hours)
    }

    pub fn reset_token_ttl(&self) -> Duration {
        Duration::minutes(self.reset_token_ttl_minutes)
    }

    pub fn reset_link(&self, token: &str) -> String {
        format!("{}/reset-password?token={}", self.frontend_url, token)
    }

    /// Defaults for everything except the database URL
    pub fn for_database(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            database_max_connections: 10,
            host: "127.0.0.1".to_string(),
            port: 3000,
            environment: "development".to_string(),
            otp_ttl_minutes: 10,
            session_ttl_hours: 24,
            reset_token_ttl_minutes: 60,
            otp_bypass_code: None,
            default_currency: "USD".to_string(),
            frontend_url: "http://localhost:3000".to_string(),
            mail_from: "no-reply@localhost".to_string(),
        }
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnv(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::for_database("postgres://localhost/bank");
        assert_eq!(config.otp_ttl(), Duration::minutes(10));
        assert_eq!(config.session_ttl(), Duration::hours(24));
        assert_eq!(config.reset_token_ttl(), Duration::hours(1));
        assert!(!config.is_production());
    }

    #[test]
    fn test_reset_link() {
        let config = Config::for_database("postgres://localhost/bank");
        assert_eq!(
            config.reset_link("abc123"),
            "http://localhost:3000/reset-password?token=abc123"
        );
    }

    #[test]
    fn test_positive_rejects_zero() {
        assert!(matches!(positive("OTP_TTL_MINUTES", 0), Err(ConfigError::InvalidValue("OTP_TTL_MINUTES"))));
        assert_eq!(positive("OTP_TTL_MINUTES", 5).unwrap(), 5);
    }
}
