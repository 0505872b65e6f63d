//! Main settings module

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Largest real-world UTC offset is 14 hours
const MAX_TZ_OFFSET_MINUTES: i32 = 14 * 60;

/// Main application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[derive(Default)]
pub struct Settings {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Conversation engine configuration
    #[serde(default)]
    pub engine: EngineSettings,

    /// Stats aggregation configuration
    #[serde(default)]
    pub stats: StatsSettings,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Settings {
    /// Create default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate settings
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.engine.max_turns == 0 {
            return Err(ConfigError::InvalidValue {
                field: "engine.max_turns".to_string(),
                message: "Turn ceiling must be at least 1".to_string(),
            });
        }

        if self.engine.silence_cycle_limit == 0 {
            return Err(ConfigError::InvalidValue {
                field: "engine.silence_cycle_limit".to_string(),
                message: "Silence cycle limit must be at least 1".to_string(),
            });
        }

        if self.stats.recent_calls_limit == 0 {
            return Err(ConfigError::InvalidValue {
                field: "stats.recent_calls_limit".to_string(),
                message: "Recent calls window must be at least 1".to_string(),
            });
        }

        if self.stats.reporting_utc_offset_minutes.abs() > MAX_TZ_OFFSET_MINUTES {
            return Err(ConfigError::InvalidValue {
                field: "stats.reporting_utc_offset_minutes".to_string(),
                message: format!(
                    "Reporting offset must be within ±{} minutes",
                    MAX_TZ_OFFSET_MINUTES
                ),
            });
        }

        if self.server.gather_timeout_seconds == 0 {
            return Err(ConfigError::InvalidValue {
                field: "server.gather_timeout_seconds".to_string(),
                message: "Gather timeout must be at least 1 second".to_string(),
            });
        }

        Ok(())
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP server host
    #[serde(default = "default_host")]
    pub host: String,

    /// HTTP server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Externally reachable base URL, used as the gather action target
    #[serde(default = "default_public_base_url")]
    pub public_base_url: String,

    /// Seconds of silence before a gather cycle times out
    #[serde(default = "default_gather_timeout")]
    pub gather_timeout_seconds: u32,

    /// Maximum seconds of speech captured per gather cycle
    #[serde(default = "default_max_speech")]
    pub max_speech_seconds: u32,

    /// Text-to-speech voice name passed to the platform
    #[serde(default = "default_voice")]
    pub voice: String,

    /// Enable CORS (the dashboard polls cross-origin)
    #[serde(default = "default_true")]
    pub cors_enabled: bool,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_public_base_url() -> String {
    "http://localhost:8080".to_string()
}
fn default_gather_timeout() -> u32 {
    3
}
fn default_max_speech() -> u32 {
    10
}
fn default_voice() -> String {
    "Polly.Matthew".to_string()
}
fn default_true() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            public_base_url: default_public_base_url(),
            gather_timeout_seconds: default_gather_timeout(),
            max_speech_seconds: default_max_speech(),
            voice: default_voice(),
            cors_enabled: default_true(),
        }
    }
}

/// Conversation engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineSettings {
    /// Ceiling on recognized-speech turns before the call is wrapped up
    #[serde(default = "default_max_turns")]
    pub max_turns: u32,

    /// Consecutive silent gather cycles before a polite exit
    #[serde(default = "default_silence_cycle_limit")]
    pub silence_cycle_limit: u32,
}

fn default_max_turns() -> u32 {
    30
}
fn default_silence_cycle_limit() -> u32 {
    2
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            max_turns: default_max_turns(),
            silence_cycle_limit: default_silence_cycle_limit(),
        }
    }
}

/// Stats aggregation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsSettings {
    /// Number of sessions in the recent-calls list
    #[serde(default = "default_recent_calls_limit")]
    pub recent_calls_limit: usize,

    /// Fixed reporting timezone for daily buckets, as minutes east of UTC
    #[serde(default)]
    pub reporting_utc_offset_minutes: i32,
}

fn default_recent_calls_limit() -> usize {
    20
}

impl Default for StatsSettings {
    fn default() -> Self {
        Self {
            recent_calls_limit: default_recent_calls_limit(),
            reporting_utc_offset_minutes: 0,
        }
    }
}

/// Observability configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default)]
    pub log_json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_json: false,
        }
    }
}

/// Load settings from files and environment
///
/// Priority (highest to lowest):
/// 1. Environment variables (PLEASE_HOLD_ prefix)
/// 2. config/{env}.yaml (if env specified)
/// 3. config/default.yaml
pub fn load_settings(env: Option<&str>) -> Result<Settings, ConfigError> {
    let mut builder = Config::builder();

    builder = builder.add_source(File::with_name("config/default").required(false));

    if let Some(env_name) = env {
        builder = builder.add_source(
            File::with_name(&format!("config/{}", env_name)).required(false),
        );
    }

    builder = builder.add_source(
        Environment::with_prefix("PLEASE_HOLD")
            .separator("__")
            .try_parsing(true),
    );

    let config = builder.build()?;
    let settings: Settings = config.try_deserialize()?;

    settings.validate()?;

    Ok(settings)
}
