//! Configuration loading and validation for Ragline.
//!
//! Loads configuration from a TOML file with environment variable
//! overrides (`RAGLINE_HOST`, `RAGLINE_PORT`). Validates all settings at
//! startup so a misconfigured process fails fast instead of mid-request.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// The root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Gateway (HTTP/WebSocket) settings.
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Invocation abstraction settings.
    #[serde(default)]
    pub invocation: InvocationConfig,

    /// Agent loop settings.
    #[serde(default)]
    pub agent: AgentConfig,

    /// Streaming channel settings.
    #[serde(default)]
    pub stream: StreamConfig,

    /// Request defaults applied when the caller omits them.
    #[serde(default)]
    pub defaults: DefaultsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_port() -> u16 {
    8642
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvocationConfig {
    /// Bound on every remote call; a timeout yields a transient failure
    /// result rather than a hang.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Unit name → base URL of the remote worker serving that unit.
    #[serde(default)]
    pub remote_endpoints: HashMap<String, String>,
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for InvocationConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            remote_endpoints: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Maximum decide/act iterations per turn.
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
}

fn default_max_iterations() -> u32 {
    6
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConfig {
    /// Sentence-terminating characters that flush a chunk. Covers both
    /// Latin and CJK terminators by default.
    #[serde(default = "default_terminators")]
    pub terminators: Vec<char>,

    /// Seconds before an unconsumed stop signal is reclaimed.
    #[serde(default = "default_stop_ttl_secs")]
    pub stop_ttl_secs: u64,
}

fn default_terminators() -> Vec<char> {
    vec!['.', '!', '?', '。', '！', '？']
}
fn default_stop_ttl_secs() -> u64 {
    60
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            terminators: default_terminators(),
            stop_ttl_secs: default_stop_ttl_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Model used when the request config omits one.
    #[serde(default = "default_model")]
    pub model_id: String,

    /// Whether the pipeline runs the query-rewrite chain before the loop.
    #[serde(default = "default_true")]
    pub rewrite_query: bool,
}

fn default_model() -> String {
    "gpt-4o".into()
}
fn default_true() -> bool {
    true
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            model_id: default_model(),
            rewrite_query: default_true(),
        }
    }
}

impl AppConfig {
    /// Load from a TOML file, then apply environment overrides.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let mut config: Self = toml::from_str(&raw)?;
        config.apply_env_overrides();
        config.validate()?;
        debug!(path = %path.display(), "Configuration loaded");
        Ok(config)
    }

    /// Defaults with environment overrides applied — used when no config
    /// file exists.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(host) = std::env::var("RAGLINE_HOST") {
            self.gateway.host = host;
        }
        if let Ok(port) = std::env::var("RAGLINE_PORT")
            && let Ok(port) = port.parse()
        {
            self.gateway.port = port;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.gateway.port == 0 {
            return Err(ConfigError::Invalid("gateway.port must be nonzero".into()));
        }
        if self.invocation.timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "invocation.timeout_secs must be nonzero".into(),
            ));
        }
        if self.agent.max_iterations == 0 {
            return Err(ConfigError::Invalid(
                "agent.max_iterations must be nonzero".into(),
            ));
        }
        if self.stream.terminators.is_empty() {
            return Err(ConfigError::Invalid(
                "stream.terminators must not be empty".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.agent.max_iterations, 6);
        assert!(config.stream.terminators.contains(&'。'));
    }

    #[test]
    fn load_from_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
[gateway]
host = "0.0.0.0"
port = 9000

[invocation]
timeout_secs = 10

[invocation.remote_endpoints]
"gpt-4o" = "http://llm-worker:8000/invoke"
"retriever.vector" = "http://retriever:8000/invoke"

[agent]
max_iterations = 4

[defaults]
model_id = "gpt-4o"
rewrite_query = false
"#
        )
        .unwrap();

        let config = AppConfig::load(file.path()).unwrap();
        assert_eq!(config.gateway.port, 9000);
        assert_eq!(config.invocation.timeout_secs, 10);
        assert_eq!(
            config.invocation.remote_endpoints.get("gpt-4o").unwrap(),
            "http://llm-worker:8000/invoke"
        );
        assert_eq!(config.agent.max_iterations, 4);
        assert!(!config.defaults.rewrite_query);
    }

    #[test]
    fn zero_iterations_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "[agent]\nmax_iterations = 0\n").unwrap();
        assert!(matches!(
            AppConfig::load(file.path()),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn missing_file_is_io_error() {
        let result = AppConfig::load(Path::new("/nonexistent/ragline.toml"));
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }
}
