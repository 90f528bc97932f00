//! Server configuration
//!
//! Loaded from a TOML file; every field has a default so a missing file or
//! an empty one yields a working local setup.

use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use crate::orchestrator::OrchestrationMode;

/// Default TCP port for tandem servers.
pub const DEFAULT_PORT: u16 = 7341;

/// Default session length in seconds.
pub const DEFAULT_SESSION_SECS: u64 = 600;

/// Default hard ceiling on narration length, in characters.
pub const DEFAULT_NARRATION_CEILING: usize = 180;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub listen_port: u16,
    pub session_secs: u64,
    pub orchestration: OrchestrationMode,
    pub narration_ceiling: usize,
    pub narrator: NarratorConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_port: DEFAULT_PORT,
            session_secs: DEFAULT_SESSION_SECS,
            orchestration: OrchestrationMode::default(),
            narration_ceiling: DEFAULT_NARRATION_CEILING,
            narrator: NarratorConfig::default(),
        }
    }
}

/// Narration backend settings. The API key itself never lives in the file,
/// only the name of the environment variable holding it.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NarratorConfig {
    pub base_url: String,
    pub model: String,
    pub api_key_env: String,
    pub timeout_secs: u64,
}

impl Default for NarratorConfig {
    fn default() -> Self {
        Self {
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            model: "gemini-2.5-flash".to_string(),
            api_key_env: "GEMINI_API_KEY".to_string(),
            timeout_secs: 20,
        }
    }
}

impl ServerConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&raw)?)
    }
}
