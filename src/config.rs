use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RecollectConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub embedding: EmbeddingConfig,
    pub retrieval: RetrievalConfig,
    pub reminders: ReminderConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    /// `"stdio"` or `"http"`.
    pub transport: String,
    pub host: String,
    pub port: u16,
    pub log_level: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    pub db_path: String,
    /// Owner used by the CLI and MCP tools when none is given.
    pub default_owner: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// `"remote"`, `"onnx"`, or `"hashing"`.
    pub provider: String,
    pub model: String,
    pub dimensions: usize,
    /// Base URL of an OpenAI-compatible embeddings API (remote provider only).
    pub endpoint: String,
    pub api_key: Option<String>,
    pub timeout_ms: u64,
    pub cache_dir: String,
    pub query_prefix: String,
    pub document_prefix: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RetrievalConfig {
    pub top_k: usize,
    pub similarity_threshold: f32,
    pub recency_max_bonus: f32,
    pub recency_half_life_days: f32,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ReminderConfig {
    /// IANA timezone used to resolve wall-clock phrases like "at 5pm".
    pub timezone: String,
    pub default_recurring_minutes: u32,
    pub default_snooze_minutes: u32,
}

impl Default for RecollectConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            storage: StorageConfig::default(),
            embedding: EmbeddingConfig::default(),
            retrieval: RetrievalConfig::default(),
            reminders: ReminderConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            transport: "stdio".into(),
            host: "127.0.0.1".into(),
            port: 7411,
            log_level: "info".into(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        let db_path = default_recollect_dir()
            .join("recollect.db")
            .to_string_lossy()
            .into_owned();
        Self {
            db_path,
            default_owner: "me".into(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        let cache_dir = default_recollect_dir()
            .join("models")
            .to_string_lossy()
            .into_owned();
        Self {
            provider: "hashing".into(),
            model: "nomic-embed-text-v1.5".into(),
            dimensions: 768,
            endpoint: "http://127.0.0.1:11434/v1".into(),
            api_key: None,
            timeout_ms: 3000,
            cache_dir,
            query_prefix: "search_query: ".into(),
            document_prefix: "search_document: ".into(),
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 5,
            similarity_threshold: 0.2,
            recency_max_bonus: 0.05,
            recency_half_life_days: 30.0,
        }
    }
}

impl Default for ReminderConfig {
    fn default() -> Self {
        Self {
            timezone: "UTC".into(),
            default_recurring_minutes: 30,
            default_snooze_minutes: 10,
        }
    }
}

/// Returns `~/.recollect/`
pub fn default_recollect_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".recollect")
}

/// Returns the default config file path: `~/.recollect/config.toml`
pub fn default_config_path() -> PathBuf {
    default_recollect_dir().join("config.toml")
}

impl RecollectConfig {
    /// Load config from TOML file (if it exists) then apply env var overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(default_config_path())
    }

    /// Load from a specific path, then apply env var overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let contents =
                std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str(&contents).context("failed to parse config TOML")?
        } else {
            info!("no config file at {}, using defaults", path.display());
            RecollectConfig::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("RECOLLECT_DB") {
            self.storage.db_path = val;
        }
        if let Ok(val) = std::env::var("RECOLLECT_OWNER") {
            self.storage.default_owner = val;
        }
        if let Ok(val) = std::env::var("RECOLLECT_LOG_LEVEL") {
            self.server.log_level = val;
        }
        if let Ok(val) = std::env::var("RECOLLECT_EMBEDDING_API_KEY") {
            self.embedding.api_key = Some(val);
        }
        if let Ok(val) = std::env::var("RECOLLECT_TIMEZONE") {
            self.reminders.timezone = val;
        }
    }

    /// Resolve the database path, expanding `~` if needed.
    pub fn resolved_db_path(&self) -> PathBuf {
        expand_tilde(&self.storage.db_path)
    }
}

impl ReminderConfig {
    /// Parse the configured timezone. Unknown names fall back to UTC with a warning.
    pub fn tz(&self) -> chrono_tz::Tz {
        match self.timezone.parse::<chrono_tz::Tz>() {
            Ok(tz) => tz,
            Err(e) => {
                tracing::warn!(timezone = %self.timezone, error = %e, "unknown timezone, using UTC");
                chrono_tz::UTC
            }
        }
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}
