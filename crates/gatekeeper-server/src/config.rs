use gatekeeper_dialogue::{DEFAULT_MAX_TURNS, TASK};
use gatekeeper_egress::openai::{DEFAULT_MODEL, GEMINI_OPENAI_BASE_URL};
use gatekeeper_session::SessionConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Environment variable holding the provider key
pub const API_KEY_ENV: &str = "GEMINI_API_KEY";

/// Environment variable holding the secret code
pub const SECRET_CODE_ENV: &str = "SECRET_CODE";

/// Older misspelled name still honoured when `SECRET_CODE` is unset
pub const LEGACY_SECRET_CODE_ENV: &str = "SECRETE_CODE";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("Missing required setting: {0}")]
    Missing(&'static str),

    #[error("Invalid setting: {0}")]
    Invalid(String),
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Path the session API is mounted under. Empty mounts it at the root.
    #[serde(default = "default_api_prefix")]
    pub api_prefix: String,

    #[serde(default)]
    pub provider: ProviderConfig,

    #[serde(default, skip_serializing)]
    pub secret_code: Option<String>,

    #[serde(default)]
    pub dialogue: DialogueConfig,

    #[serde(default)]
    pub session: SessionConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,

    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DialogueConfig {
    #[serde(default = "default_max_turns")]
    pub max_turns: usize,

    /// Task message that opens every dialogue
    #[serde(default = "default_task")]
    pub task: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            api_prefix: default_api_prefix(),
            provider: ProviderConfig::default(),
            secret_code: None,
            dialogue: DialogueConfig::default(),
            session: SessionConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_base_url(),
            model: default_model(),
            timeout_secs: default_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            max_retries: default_max_retries(),
        }
    }
}

impl Default for DialogueConfig {
    fn default() -> Self {
        Self {
            max_turns: default_max_turns(),
            task: default_task(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("api_prefix", &self.api_prefix)
            .field("provider", &self.provider)
            .field("secret_code", &self.secret_code.as_ref().map(|_| "***"))
            .field("dialogue", &self.dialogue)
            .field("session", &self.session)
            .field("logging", &self.logging)
            .finish()
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("timeout_secs", &self.timeout_secs)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .field("max_retries", &self.max_retries)
            .finish()
    }
}

impl ServerConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let parsed = if path.extension().and_then(|s| s.to_str()) == Some("toml") {
            toml::from_str(&contents).map_err(|e| e.to_string())
        } else {
            // Default to YAML
            serde_yaml::from_str(&contents).map_err(|e| e.to_string())
        };

        parsed.map_err(|message| ConfigError::Parse {
            path: path.to_path_buf(),
            message,
        })
    }

    /// Merge environment variables into config (env vars take precedence)
    pub fn merge_env(&mut self) {
        // Required secrets (no GATEKEEPER_ prefix for these)
        if let Some(key) = non_empty_env(API_KEY_ENV) {
            self.provider.api_key = Some(key);
        }

        if let Some(code) =
            non_empty_env(SECRET_CODE_ENV).or_else(|| non_empty_env(LEGACY_SECRET_CODE_ENV))
        {
            self.secret_code = Some(code);
        }

        // Provider settings
        if let Some(val) = non_empty_env("GATEKEEPER_BASE_URL") {
            self.provider.base_url = val;
        }

        if let Some(val) = non_empty_env("GATEKEEPER_MODEL") {
            self.provider.model = val;
        }

        // Dialogue and session limits
        if let Some(turns) = parsed_env::<usize>("GATEKEEPER_MAX_TURNS") {
            self.dialogue.max_turns = turns;
        }

        if let Some(max) = parsed_env::<usize>("GATEKEEPER_MAX_SESSIONS") {
            self.session.max_sessions = max;
        }

        if let Some(ttl) = parsed_env::<u64>("GATEKEEPER_SESSION_IDLE_TTL_SECS") {
            self.session.idle_ttl_secs = ttl;
        }

        // Logging settings
        if let Some(val) = non_empty_env("GATEKEEPER_LOG_LEVEL") {
            self.logging.level = val;
        }

        if let Some(json) = parsed_env::<bool>("GATEKEEPER_LOG_JSON") {
            self.logging.json = json;
        }

        // Server settings
        if let Some(port) = parsed_env::<u16>("GATEKEEPER_PORT") {
            self.port = port;
        }

        if let Some(val) = non_empty_env("GATEKEEPER_HOST") {
            self.host = val;
        }

        if let Ok(val) = std::env::var("GATEKEEPER_API_PREFIX") {
            self.api_prefix = val;
        }
    }

    pub fn api_key(&self) -> Result<&str, ConfigError> {
        self.provider
            .api_key
            .as_deref()
            .filter(|key| !key.trim().is_empty())
            .ok_or(ConfigError::Missing(API_KEY_ENV))
    }

    pub fn secret_code(&self) -> Result<&str, ConfigError> {
        self.secret_code
            .as_deref()
            .filter(|code| !code.trim().is_empty())
            .ok_or(ConfigError::Missing(SECRET_CODE_ENV))
    }

    /// Check everything needed to run sessions. Fails fast on the first
    /// problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.api_key()?;
        self.secret_code()?;

        if self.dialogue.max_turns == 0 {
            return Err(ConfigError::Invalid(
                "dialogue.max_turns must be at least 1".to_string(),
            ));
        }
        if self.session.max_sessions == 0 {
            return Err(ConfigError::Invalid(
                "session.max_sessions must be at least 1".to_string(),
            ));
        }
        if !self.api_prefix.is_empty() && !self.api_prefix.starts_with('/') {
            return Err(ConfigError::Invalid(format!(
                "api_prefix must start with '/': {}",
                self.api_prefix
            )));
        }
        Ok(())
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|val| !val.trim().is_empty())
}

fn parsed_env<T: std::str::FromStr>(name: &str) -> Option<T> {
    let raw = std::env::var(name).ok()?;
    match raw.parse() {
        Ok(val) => Some(val),
        Err(_) => {
            eprintln!("Warning: Invalid {} '{}', ignoring", name, raw);
            None
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_api_prefix() -> String {
    "/api".to_string()
}

fn default_base_url() -> String {
    GEMINI_OPENAI_BASE_URL.to_string()
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_max_retries() -> u32 {
    3
}

fn default_max_turns() -> usize {
    DEFAULT_MAX_TURNS
}

fn default_task() -> String {
    TASK.to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}
