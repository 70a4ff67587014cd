// src/config.rs

use std::{env, fmt, net::SocketAddr};

use dotenvy::dotenv;

/// Role carried in the token of staff allowed to manage assessments.
pub const FACULTY_ROLE: &str = "faculty";

/// Inclusive range of valid question numbers on a paper.
pub const MIN_QUESTION_NUMBER: i64 = 1;
pub const MAX_QUESTION_NUMBER: i64 = 20;

/// Sub-questions run from 'a' to this letter.
pub const LAST_SUB_QUESTION: char = 'h';

/// Number of course outcomes a question can be tagged with (CO1..CO6).
pub const CO_COUNT: usize = 6;

/// Smallest allowed maximum mark for a single question.
pub const MIN_QUESTION_MARKS: f64 = 0.5;

/// Upper bound on entries accepted by one bulk marks upload.
pub const MAX_BULK_ENTRIES: usize = 5000;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    /// Shared with the identity service, which mints the tokens.
    pub jwt_secret: String,
    pub rust_log: String,
    pub bind_addr: SocketAddr,
    pub max_connections: u32,
    pub log_dir: String,
}

/// Raised when a required environment variable is absent or malformed.
#[derive(Debug)]
pub enum ConfigError {
    Missing(&'static str),
    Invalid(&'static str, String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Missing(var) => write!(f, "{} must be set", var),
            ConfigError::Invalid(var, value) => write!(f, "{} has an invalid value: {}", var, value),
        }
    }
}

impl std::error::Error for ConfigError {}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv().ok();

        let database_url = required("DATABASE_URL")?;
        let jwt_secret = required("JWT_SECRET")?;
        let rust_log = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
        let bind_addr = parsed("BIND_ADDR", SocketAddr::from(([0, 0, 0, 0], 3000)))?;
        let max_connections = parsed("DATABASE_MAX_CONNECTIONS", 5)?;
        let log_dir = env::var("LOG_DIR").unwrap_or_else(|_| "logs".to_string());

        Ok(Self {
            database_url,
            jwt_secret,
            rust_log,
            bind_addr,
            max_connections,
            log_dir,
        })
    }
}

fn required(var: &'static str) -> Result<String, ConfigError> {
    env::var(var).map_err(|_| ConfigError::Missing(var))
}

fn parsed<T: std::str::FromStr>(var: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(var) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid(var, raw)),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_names_the_variable() {
        let err = ConfigError::Missing("JWT_SECRET");
        assert_eq!(err.to_string(), "JWT_SECRET must be set");

        let err = ConfigError::Invalid("BIND_ADDR", "nowhere".to_string());
        assert!(err.to_string().contains("BIND_ADDR"));
        assert!(err.to_string().contains("nowhere"));
    }

    #[test]
    fn unset_variables_fall_back_to_defaults() {
        let max: u32 = parsed("CO_ASSESSMENT_UNSET_MAX_CONNECTIONS", 5).unwrap();
        assert_eq!(max, 5);
        assert!(matches!(
            required("CO_ASSESSMENT_UNSET_SECRET"),
            Err(ConfigError::Missing("CO_ASSESSMENT_UNSET_SECRET"))
        ));
    }
}
