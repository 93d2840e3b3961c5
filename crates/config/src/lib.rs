//! Configuration management for Sandpit
//!
//! Loads agent parameters from `~/.sandpit/config.json`, layers environment
//! overrides on top and reads the API credential from the environment.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

pub mod paths;

pub use paths::{config_path, data_dir, expand_path};

/// Environment variable holding the Gemini API key
pub const API_KEY_ENV: &str = "GEMINI_API_KEY";
/// Overrides `agent.working_directory`
pub const WORKDIR_ENV: &str = "SANDPIT_WORKDIR";
/// Overrides `agent.model`
pub const MODEL_ENV: &str = "SANDPIT_MODEL";

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("config I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config file: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0} environment variable not set")]
    MissingEnv(&'static str),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Agent parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default = "default_working_directory")]
    pub working_directory: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
    #[serde(default = "default_script_timeout_secs")]
    pub script_timeout_secs: u64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            working_directory: default_working_directory(),
            model: default_model(),
            max_iterations: default_max_iterations(),
            script_timeout_secs: default_script_timeout_secs(),
        }
    }
}

fn default_working_directory() -> String {
    "./calculator".to_string()
}

fn default_model() -> String {
    "gemini-2.5-flash".to_string()
}

fn default_max_iterations() -> u32 {
    20
}

fn default_script_timeout_secs() -> u64 {
    30
}

/// LLM endpoint configuration. The key itself only ever comes from the environment.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProviderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,
}

/// Root configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub provider: ProviderConfig,
}

impl Config {
    /// Load from the default location and apply environment overrides
    pub async fn load() -> Result<Self> {
        let mut config = Self::load_from(&config_path()).await?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from a specific location. A missing file yields defaults.
    pub async fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!("no config found at {:?}, using defaults", path);
            return Ok(Config::default());
        }

        debug!("loading config from {:?}", path);
        let content = tokio::fs::read_to_string(path).await?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Apply `SANDPIT_WORKDIR` / `SANDPIT_MODEL` if set and non-empty
    pub fn apply_env_overrides(&mut self) {
        if let Some(dir) = non_empty_env(WORKDIR_ENV) {
            debug!("working directory overridden by {}", WORKDIR_ENV);
            self.agent.working_directory = dir;
        }
        if let Some(model) = non_empty_env(MODEL_ENV) {
            debug!("model overridden by {}", MODEL_ENV);
            self.agent.model = model;
        }
    }

    /// Absolute sandbox root, relative paths anchored at the process cwd
    pub fn working_directory(&self) -> Result<PathBuf> {
        let cwd = std::env::current_dir()?;
        Ok(expand_path(&self.agent.working_directory, &cwd))
    }

    /// Read the API key from the environment
    pub fn api_key(&self) -> Result<String> {
        non_empty_env(API_KEY_ENV).ok_or(ConfigError::MissingEnv(API_KEY_ENV))
    }

    pub fn model(&self) -> &str {
        &self.agent.model
    }

    pub fn max_iterations(&self) -> u32 {
        self.agent.max_iterations
    }

    pub fn script_timeout_secs(&self) -> u64 {
        self.agent.script_timeout_secs
    }

    pub fn api_base(&self) -> Option<String> {
        self.provider
            .api_base
            .as_ref()
            .filter(|base| !base.is_empty())
            .cloned()
    }
}

/// Load `.env` from the current directory, if present. Existing variables win.
pub fn load_dotenv() {
    match dotenvy::dotenv() {
        Ok(path) => debug!("loaded environment from {:?}", path),
        Err(e) if e.not_found() => {}
        Err(e) => warn!("failed to load .env: {}", e),
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.is_empty())
}
