//! Configuration management for please-hold
//!
//! Supports loading configuration from:
//! - YAML/TOML files under `config/`
//! - Environment variables (PLEASE_HOLD_ prefix)

pub mod settings;

pub use settings::{
    load_settings, EngineSettings, ObservabilityConfig, ServerConfig, Settings, StatsSettings,
};

use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("Environment error: {0}")]
    Environment(String),
}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}
