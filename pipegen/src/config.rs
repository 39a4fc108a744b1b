//! pipegen configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::orchestrator::FallbackPolicy;

/// Main pipegen configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Text-generation backend configuration
    pub llm: LlmConfig,

    /// Generate/validate/repair loop settings
    pub generation: GenerationConfig,

    /// HTTP server settings
    pub server: ServerConfig,

    /// Domain metadata sources
    pub metadata: MetadataConfig,

    /// Usage quota settings
    pub usage: UsageConfig,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[serde(rename = "log-level")]
    pub log_level: Option<String>,
}

impl Config {
    /// Validate configuration before use
    ///
    /// Checks that the generation backend's API key is available.
    /// Call this before starting anything that talks to the backend.
    pub fn validate(&self) -> Result<()> {
        if std::env::var(&self.llm.api_key_env).is_err() {
            return Err(eyre::eyre!(
                "LLM API key not found. Set the {} environment variable.",
                self.llm.api_key_env
            ));
        }
        if self.llm.models.is_empty() {
            return Err(eyre::eyre!("llm.models must name at least one model"));
        }
        Ok(())
    }

    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try project-local config: .pipegen.yml
        let local_config = PathBuf::from(".pipegen.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // Try user config: ~/.config/pipegen/pipegen.yml
        if let Some(user_config) = Self::user_config_path()
            && user_config.exists()
        {
            match Self::load_from_file(&user_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                }
            }
        }

        // No config file found, use defaults
        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Read only the log level, before logging is initialised
    ///
    /// Errors are swallowed; the full load reports them later.
    pub fn load_log_level(config_path: Option<&PathBuf>) -> Option<String> {
        let candidates: Vec<PathBuf> = match config_path {
            Some(path) => vec![path.clone()],
            None => [Some(PathBuf::from(".pipegen.yml")), Self::user_config_path()]
                .into_iter()
                .flatten()
                .collect(),
        };

        candidates
            .into_iter()
            .find(|p| p.exists())
            .and_then(|p| Self::load_from_file(p).ok())
            .and_then(|c| c.log_level)
    }

    fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("pipegen").join("pipegen.yml"))
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

/// Text-generation backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Provider name (currently only "gemini" supported)
    pub provider: String,

    /// Model candidates, most preferred first
    pub models: Vec<String>,

    /// Environment variable containing the API key
    #[serde(rename = "api-key-env")]
    pub api_key_env: String,

    /// API base URL
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Request timeout in milliseconds
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,

    /// Retries per model after the initial call
    #[serde(rename = "max-retries")]
    pub max_retries: u32,

    /// Backoff schedule in milliseconds; retries past the end reuse the last value
    #[serde(rename = "backoff-ms")]
    pub backoff_ms: Vec<u64>,

    /// Server-suggested delays above this switch to the next model
    #[serde(rename = "max-suggested-delay-ms")]
    pub max_suggested_delay_ms: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "gemini".to_string(),
            models: vec!["gemini-2.5-flash".to_string(), "gemini-2.5-flash-lite".to_string()],
            api_key_env: "GEMINI_API_KEY".to_string(),
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            timeout_ms: 120_000,
            max_retries: 3,
            backoff_ms: vec![1000, 2000, 4000],
            max_suggested_delay_ms: 10_000,
        }
    }
}

impl LlmConfig {
    /// Read the API key from the configured environment variable
    pub fn get_api_key(&self) -> Result<String> {
        std::env::var(&self.api_key_env).context(format!("Environment variable {} not set", self.api_key_env))
    }
}

/// Generate/validate/repair loop settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Maximum validate attempts before the run is reported as exhausted
    #[serde(rename = "max-iterations")]
    pub max_iterations: u32,

    /// What to do when every model candidate fails
    #[serde(rename = "on-generation-failure")]
    pub on_generation_failure: FallbackPolicy,

    /// Most recent conversation turns included in the prompt
    #[serde(rename = "history-limit")]
    pub history_limit: usize,

    /// Assistant turns longer than this are truncated in the prompt
    #[serde(rename = "history-truncate-chars")]
    pub history_truncate_chars: usize,

    /// Optional directory with `.pmt` prompt overrides
    #[serde(rename = "prompts-dir")]
    pub prompts_dir: Option<PathBuf>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_iterations: 5,
            on_generation_failure: FallbackPolicy::ReturnPlaceholder,
            history_limit: 10,
            history_truncate_chars: 500,
            prompts_dir: None,
        }
    }
}

/// HTTP server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind
    pub bind: String,

    /// Progress events buffered per run before the producer waits
    #[serde(rename = "event-buffer")]
    pub event_buffer: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:5000".to_string(),
            event_buffer: 64,
        }
    }
}

/// Domain metadata sources
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataConfig {
    /// JSON file with hand-entered metadata
    #[serde(rename = "manual-path")]
    pub manual_path: Option<PathBuf>,

    /// Data platform REST API base URL
    #[serde(rename = "api-base-url")]
    pub api_base_url: String,

    /// Request timeout in milliseconds
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            manual_path: None,
            api_base_url: "https://api.fabric.microsoft.com".to_string(),
            timeout_ms: 30_000,
        }
    }
}

/// Usage quota settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UsageConfig {
    /// Tokens per user per day
    #[serde(rename = "daily-limit")]
    pub daily_limit: u64,

    /// Tokens charged per character of prompt and result
    #[serde(rename = "tokens-per-char")]
    pub tokens_per_char: u64,
}

impl Default for UsageConfig {
    fn default() -> Self {
        Self {
            daily_limit: 100_000,
            tokens_per_char: 100,
        }
    }
}
