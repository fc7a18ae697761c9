//! Configuration management for DbBot
//!
//! Loads the JSON config file and layers process environment overrides on top.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

pub mod paths;

pub use paths::{config_path, data_dir, env_file_path};

/// Errors raised while loading or validating configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("config I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed config: {0}")]
    Json(#[from] serde_json::Error),

    #[error("missing setting: {0}")]
    Missing(&'static str),

    #[error("invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Language-model endpoint settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_base: None,
            model: default_model(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
        }
    }
}

fn default_model() -> String {
    "gpt-4o".to_string()
}

fn default_max_tokens() -> u32 {
    2048
}

fn default_temperature() -> f32 {
    0.0
}

/// Reasoning loop parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default)]
    pub parse_retry_backoff_ms: u64,
    #[serde(default = "default_max_history_messages")]
    pub max_history_messages: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            top_k: default_top_k(),
            parse_retry_backoff_ms: 0,
            max_history_messages: default_max_history_messages(),
        }
    }
}

fn default_max_iterations() -> u32 {
    15
}

fn default_top_k() -> usize {
    10
}

fn default_max_history_messages() -> usize {
    20
}

/// Target database selection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// One of `postgresql`, `mysql`, `sqlite` (case-insensitive)
    #[serde(default)]
    pub dialect: String,
    /// Connection string, with or without the driver scheme
    #[serde(default)]
    pub uri: String,
    #[serde(default = "default_true")]
    pub read_only: bool,
    #[serde(default = "default_sample_rows")]
    pub sample_rows: usize,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            dialect: String::new(),
            uri: String::new(),
            read_only: true,
            sample_rows: default_sample_rows(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_sample_rows() -> usize {
    3
}

/// File and code-execution sandbox
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SandboxConfig {
    /// Root directory for file tools; empty means the current directory
    #[serde(default)]
    pub root: String,
    #[serde(default = "default_python")]
    pub python: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            root: String::new(),
            python: default_python(),
            timeout_secs: None,
        }
    }
}

fn default_python() -> String {
    "python3".to_string()
}

/// Root configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub sandbox: SandboxConfig,
}

impl Config {
    /// Load from the default location, then apply `.env` and process environment
    pub async fn load() -> Result<Self> {
        load_dotenv();
        let mut config = Self::load_from(&config_path()).await?;
        config.apply_env();
        Ok(config)
    }

    /// Load from specific location
    pub async fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!("no config at {:?}, using defaults", path);
            return Ok(Config::default());
        }

        debug!("loading config from {:?}", path);
        let content = tokio::fs::read_to_string(path).await?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save to the default location
    pub async fn save(&self) -> Result<()> {
        self.save_to(&config_path()).await
    }

    /// Save to specific location
    pub async fn save_to(&self, path: &Path) -> Result<()> {
        debug!("writing config to {:?}", path);

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let content = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, content).await?;
        Ok(())
    }

    /// Apply overrides from the process environment
    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary variable lookup
    pub fn apply_env_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = get("DBBOT_API_KEY")
            .or_else(|| get("OPENAI_API_KEY"))
            .or_else(|| get("OPENROUTER_API_KEY"))
        {
            self.provider.api_key = key;
        }
        if let Some(base) = get("DBBOT_API_BASE") {
            self.provider.api_base = Some(base);
        } else if self.provider.api_base.is_none() && get("OPENROUTER_API_KEY").is_some() {
            self.provider.api_base = Some("https://openrouter.ai/api/v1".to_string());
        }
        if let Some(model) = get("DBBOT_MODEL") {
            self.provider.model = model;
        }
        if let Some(dialect) = get("DBBOT_DIALECT") {
            self.database.dialect = dialect;
        }
        if let Some(uri) = get("DBBOT_DATABASE_URI") {
            self.database.uri = uri;
        }
        if let Some(top_k) = get("DBBOT_TOP_K") {
            match top_k.parse() {
                Ok(n) => self.agent.top_k = n,
                Err(_) => warn!("ignoring DBBOT_TOP_K={}", top_k),
            }
        }
    }

    /// Language-model API key, if any
    pub fn api_key(&self) -> Option<String> {
        let key = self.provider.api_key.trim();
        if key.is_empty() {
            None
        } else {
            Some(key.to_string())
        }
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key().is_some()
    }

    /// Both dialect and uri are present
    pub fn has_database(&self) -> bool {
        !self.database.dialect.trim().is_empty() && !self.database.uri.trim().is_empty()
    }

    /// Sandbox root for file and code tools
    pub fn sandbox_root(&self) -> PathBuf {
        let root = self.sandbox.root.trim();
        if root.is_empty() {
            return std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        }
        expand_home(root)
    }

    /// Reject values that would make the agent unusable
    pub fn validate(&self) -> Result<()> {
        if self.agent.max_iterations == 0 {
            return Err(ConfigError::Invalid {
                key: "agent.max_iterations",
                value: "0".to_string(),
            });
        }
        if self.sandbox.python.trim().is_empty() {
            return Err(ConfigError::Missing("sandbox.python"));
        }
        if self.agent.top_k == 0 {
            return Err(ConfigError::Invalid {
                key: "agent.top_k",
                value: "0".to_string(),
            });
        }
        Ok(())
    }
}

fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    } else if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    }
    PathBuf::from(path)
}

/// Load `.env` from the working directory and the data dir; missing files are fine
pub fn load_dotenv() {
    match dotenvy::dotenv() {
        Ok(path) => debug!("loaded environment from {:?}", path),
        Err(e) if e.not_found() => {}
        Err(e) => warn!("failed to read .env: {}", e),
    }
    let fallback = env_file_path();
    if fallback.exists() {
        if let Err(e) = dotenvy::from_path(&fallback) {
            warn!("failed to read {:?}: {}", fallback, e);
        }
    }
}

/// Write the default config unless one already exists
pub async fn init() -> Result<Config> {
    let path = config_path();

    if path.exists() {
        warn!("config already exists at {:?}", path);
    } else {
        Config::default().save_to(&path).await?;
        info!("config written to {:?}", path);
    }

    Config::load().await
}
