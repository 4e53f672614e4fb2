//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::net::SocketAddr;

use inkkeeper_core::home::HomeRules;
use inkkeeper_core::rewards::RewardModel;
use inkkeeper_core::submission::{SubmissionRules, DEFAULT_MIN_SESSION_SECONDS};
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub database_url: String,
    pub db_max_connections: u32,
    pub log_level: Level,
    pub cors_origin: String,
    pub book_search_url: String,
    pub min_session_seconds: u32,
    pub reward_model: RewardModel,
    pub streak_window_hours: f64,
    pub faint_after_hours: f64,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key lookup (the environment, or a map in tests).
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        // --- Server and Database Settings ---
        let bind_address_str = get("BIND_ADDRESS").unwrap_or_else(|| "0.0.0.0:3000".to_string());
        let bind_address = bind_address_str.parse::<SocketAddr>().map_err(|e| {
            ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string())
        })?;

        let database_url =
            get("DATABASE_URL").ok_or_else(|| ConfigError::MissingVar("DATABASE_URL".to_string()))?;
        let db_max_connections = parse_or("DB_MAX_CONNECTIONS", get("DB_MAX_CONNECTIONS"), 5u32)?;

        let log_level_str = get("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let cors_origin = get("CORS_ORIGIN").unwrap_or_else(|| "http://localhost:8081".to_string());
        let book_search_url = get("BOOK_SEARCH_URL")
            .unwrap_or_else(|| "https://www.googleapis.com/books/v1".to_string());
        if !book_search_url.starts_with("http://") && !book_search_url.starts_with("https://") {
            return Err(ConfigError::InvalidValue(
                "BOOK_SEARCH_URL".to_string(),
                format!("'{}' is not an http(s) URL", book_search_url),
            ));
        }

        // --- Reading Rules ---
        let min_session_seconds = parse_or(
            "MIN_SESSION_SECONDS",
            get("MIN_SESSION_SECONDS"),
            DEFAULT_MIN_SESSION_SECONDS,
        )?;

        let reward_model = match get("REWARD_MODEL") {
            None => RewardModel::default(),
            Some(label) => RewardModel::from_label(&label).ok_or_else(|| {
                ConfigError::InvalidValue(
                    "REWARD_MODEL".to_string(),
                    format!("'{}' is not one of 'time' or 'units'", label),
                )
            })?,
        };

        let defaults = HomeRules::default();
        let streak_window_hours = parse_hours(
            "STREAK_WINDOW_HOURS",
            get("STREAK_WINDOW_HOURS"),
            defaults.streak_window_hours,
        )?;
        let faint_after_hours =
            parse_hours("FAINT_AFTER_HOURS", get("FAINT_AFTER_HOURS"), defaults.faint_after_hours)?;

        Ok(Self {
            bind_address,
            database_url,
            db_max_connections,
            log_level,
            cors_origin,
            book_search_url,
            min_session_seconds,
            reward_model,
            streak_window_hours,
            faint_after_hours,
        })
    }

    pub fn submission_rules(&self) -> SubmissionRules {
        SubmissionRules {
            min_session_seconds: self.min_session_seconds,
            reward_model: self.reward_model,
        }
    }

    pub fn home_rules(&self) -> HomeRules {
        HomeRules {
            streak_window_hours: self.streak_window_hours,
            faint_after_hours: self.faint_after_hours,
        }
    }
}

fn parse_or<T: std::str::FromStr>(key: &str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match raw {
        None => Ok(default),
        Some(v) => v
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidValue(key.to_string(), e.to_string())),
    }
}

fn parse_hours(key: &str, raw: Option<String>, default: f64) -> Result<f64, ConfigError> {
    let hours: f64 = parse_or(key, raw, default)?;
    if !hours.is_finite() || hours <= 0.0 {
        return Err(ConfigError::InvalidValue(
            key.to_string(),
            format!("'{}' must be a positive number of hours", hours),
        ));
    }
    Ok(hours)
}
