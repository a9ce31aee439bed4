//! Configuration loading, validation, and management for OpenManus.
//!
//! Loads configuration from `~/.openmanus/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.openmanus/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key for the LLM provider
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Base URL of the OpenAI-compatible endpoint
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Default model
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Default temperature
    #[serde(default = "default_temperature")]
    pub default_temperature: f32,

    /// Default max tokens per LLM response
    #[serde(default = "default_max_tokens")]
    pub default_max_tokens: u32,

    /// Agent loop configuration
    #[serde(default)]
    pub agent: AgentConfig,

    /// Stuck-state detector tunables
    #[serde(default)]
    pub stuck: StuckConfig,

    /// Gateway configuration
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Tool configuration
    #[serde(default)]
    pub tools: ToolsConfig,
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_model() -> String {
    "gpt-4o".into()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    4096
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("base_url", &self.base_url)
            .field("default_model", &self.default_model)
            .field("default_temperature", &self.default_temperature)
            .field("default_max_tokens", &self.default_max_tokens)
            .field("agent", &self.agent)
            .field("stuck", &self.stuck)
            .field("gateway", &self.gateway)
            .field("tools", &self.tools)
            .finish()
    }
}

/// Agent step-loop configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Maximum steps per task before forced termination
    #[serde(default = "default_max_steps")]
    pub max_steps: u32,

    /// How many times an LLM request is retried before the task fails
    #[serde(default = "default_llm_retries")]
    pub llm_retries: u32,

    /// Base backoff between LLM retries, in milliseconds
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

fn default_max_steps() -> u32 {
    30
}
fn default_llm_retries() -> u32 {
    3
}
fn default_retry_backoff_ms() -> u64 {
    500
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_steps: default_max_steps(),
            llm_retries: default_llm_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
        }
    }
}

/// Stuck-state detector tunables.
///
/// These are heuristics, not contracts — the defaults work but are
/// deliberately configurable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StuckConfig {
    /// How many previous assistant messages to compare against
    #[serde(default = "default_window")]
    pub window: usize,

    /// Similarity cutoff in [0,1]; at or above counts as a duplicate
    #[serde(default = "default_similarity_cutoff")]
    pub similarity_cutoff: f64,

    /// How many near-duplicates in the window trip the detector. The
    /// default of 1 fires on the second consecutive similar message.
    #[serde(default = "default_duplicate_threshold")]
    pub duplicate_threshold: usize,
}

fn default_window() -> usize {
    3
}
fn default_similarity_cutoff() -> f64 {
    0.9
}
fn default_duplicate_threshold() -> usize {
    1
}

impl Default for StuckConfig {
    fn default() -> Self {
        Self {
            window: default_window(),
            similarity_cutoff: default_similarity_cutoff(),
            duplicate_threshold: default_duplicate_threshold(),
        }
    }
}

/// HTTP gateway configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Bind host
    #[serde(default = "default_host")]
    pub host: String,

    /// Bind port
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_port() -> u16 {
    8170
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Built-in tool configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Shell commands the agent may run. Empty = allow all (not recommended).
    #[serde(default = "default_shell_allowlist")]
    pub shell_allowlist: Vec<String>,

    /// Per-execution timeout for subprocess tools, in seconds
    #[serde(default = "default_tool_timeout_secs")]
    pub timeout_secs: u64,

    /// Directory file_save writes into
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace_dir: Option<String>,
}

fn default_shell_allowlist() -> Vec<String> {
    [
        "ls", "cat", "head", "tail", "echo", "pwd", "date", "wc", "grep", "find", "which", "git",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}
fn default_tool_timeout_secs() -> u64 {
    60
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            shell_allowlist: default_shell_allowlist(),
            timeout_secs: default_tool_timeout_secs(),
            workspace_dir: None,
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.openmanus/config.toml).
    ///
    /// Environment variables (highest priority):
    /// - `OPENMANUS_API_KEY`, falling back to `OPENAI_API_KEY`
    /// - `OPENMANUS_BASE_URL`
    /// - `OPENMANUS_MODEL`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;

        if config.api_key.is_none() {
            config.api_key = std::env::var("OPENMANUS_API_KEY")
                .ok()
                .or_else(|| std::env::var("OPENAI_API_KEY").ok());
        }

        if let Ok(base_url) = std::env::var("OPENMANUS_BASE_URL") {
            config.base_url = base_url;
        }

        if let Ok(model) = std::env::var("OPENMANUS_MODEL") {
            config.default_model = model;
        }

        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".openmanus")
    }

    /// Get the workspace directory (where file_save writes by default).
    pub fn workspace_dir(&self) -> PathBuf {
        self.tools
            .workspace_dir
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(|| Self::config_dir().join("workspace"))
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_temperature < 0.0 || self.default_temperature > 2.0 {
            return Err(ConfigError::ValidationError(
                "default_temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.agent.max_steps == 0 {
            return Err(ConfigError::ValidationError(
                "agent.max_steps must be at least 1".into(),
            ));
        }

        if !(0.0..=1.0).contains(&self.stuck.similarity_cutoff) {
            return Err(ConfigError::ValidationError(
                "stuck.similarity_cutoff must be between 0.0 and 1.0".into(),
            ));
        }

        if self.stuck.duplicate_threshold == 0 {
            return Err(ConfigError::ValidationError(
                "stuck.duplicate_threshold must be at least 1".into(),
            ));
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        toml::to_string_pretty(&Self::default()).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_base_url(),
            default_model: default_model(),
            default_temperature: default_temperature(),
            default_max_tokens: default_max_tokens(),
            agent: AgentConfig::default(),
            stuck: StuckConfig::default(),
            gateway: GatewayConfig::default(),
            tools: ToolsConfig::default(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
