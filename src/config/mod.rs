use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::debug;

/// Default address of the assistant backend
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8000";

/// Default key under which the session list is persisted
pub const DEFAULT_STORAGE_KEY: &str = "chatHistory";

/// Application configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Data directory holding the persisted session list
    pub data_dir: PathBuf,

    /// Base URL of the assistant backend
    pub api_base_url: String,

    /// Fixed key the session list is stored under
    pub storage_key: String,

    /// Transport timeout for backend requests
    pub request_timeout_secs: u64,

    /// Column width used when printing answers
    pub wrap_width: usize,

    /// Whether an empty session list is written through to storage
    pub persist_empty_history: bool,
}

/// Configuration as read from a file; every field is optional
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub data_dir: Option<PathBuf>,
    pub api_base_url: Option<String>,
    pub storage_key: Option<String>,
    pub request_timeout_secs: Option<u64>,
    pub wrap_width: Option<usize>,
    pub persist_empty_history: Option<bool>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            request_timeout_secs: 120,
            wrap_width: 100,
            persist_empty_history: true,
        }
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join("taxbot"))
        .unwrap_or_else(|| PathBuf::from("./.taxbot"))
}

impl Config {
    /// Initialize configuration from various sources
    pub async fn init() -> Result<Self> {
        debug!("Initializing configuration");

        let mut config = Self::default();

        // Files first so the environment wins
        if let Some(file_config) = Self::load_from_file().await? {
            config.merge_with(file_config);
        }

        config.load_from_env();

        Ok(config)
    }

    /// Load configuration from environment variables
    pub fn load_from_env(&mut self) {
        if let Ok(url) = std::env::var("TAXBOT_API_URL") {
            self.api_base_url = url;
        }

        if let Ok(data_dir) = std::env::var("TAXBOT_DATA_DIR") {
            self.data_dir = PathBuf::from(data_dir);
        }

        if let Ok(key) = std::env::var("TAXBOT_STORAGE_KEY") {
            self.storage_key = key;
        }

        if let Ok(timeout_str) = std::env::var("TAXBOT_TIMEOUT_SECS") {
            match timeout_str.parse() {
                Ok(timeout) => self.request_timeout_secs = timeout,
                Err(e) => debug!("Ignoring TAXBOT_TIMEOUT_SECS={}: {}", timeout_str, e),
            }
        }

        if let Ok(width_str) = std::env::var("TAXBOT_WRAP_WIDTH") {
            match width_str.parse() {
                Ok(width) => self.wrap_width = width,
                Err(e) => debug!("Ignoring TAXBOT_WRAP_WIDTH={}: {}", width_str, e),
            }
        }

        if let Ok(persist_str) = std::env::var("TAXBOT_PERSIST_EMPTY") {
            match parse_flag(&persist_str) {
                Some(persist) => self.persist_empty_history = persist,
                None => debug!("Ignoring TAXBOT_PERSIST_EMPTY={}: not a boolean", persist_str),
            }
        }
    }

    /// Load configuration from taxbot.json files
    pub async fn load_from_file() -> Result<Option<FileConfig>> {
        // 1. ./.taxbot.json
        // 2. ./taxbot.json
        // 3. $CONFIG_DIR/taxbot/taxbot.json
        let mut config_paths = vec![
            PathBuf::from("./.taxbot.json"),
            PathBuf::from("./taxbot.json"),
        ];

        if let Some(config_dir) = dirs::config_dir() {
            config_paths.push(config_dir.join("taxbot").join("taxbot.json"));
        }

        for path in config_paths {
            if path.exists() {
                debug!("Loading configuration from: {}", path.display());
                let content = tokio::fs::read_to_string(&path).await?;
                let config: FileConfig = serde_json::from_str(&content).map_err(|e| {
                    anyhow::anyhow!("Invalid configuration file {}: {}", path.display(), e)
                })?;
                return Ok(Some(config));
            }
        }

        Ok(None)
    }

    /// Merge file configuration into this one
    pub fn merge_with(&mut self, other: FileConfig) {
        if let Some(data_dir) = other.data_dir {
            self.data_dir = data_dir;
        }
        if let Some(url) = other.api_base_url {
            self.api_base_url = url;
        }
        if let Some(key) = other.storage_key {
            self.storage_key = key;
        }
        if let Some(timeout) = other.request_timeout_secs {
            self.request_timeout_secs = timeout;
        }
        if let Some(width) = other.wrap_width {
            self.wrap_width = width;
        }
        if let Some(persist) = other.persist_empty_history {
            self.persist_empty_history = persist;
        }
    }

    /// Path of the persisted session list
    pub fn history_path(&self) -> PathBuf {
        self.data_dir.join(format!("{}.json", self.storage_key))
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        let url = self.api_base_url.trim();
        if url.is_empty() {
            return Err(anyhow::anyhow!(
                "No backend URL configured. Set TAXBOT_API_URL or api_base_url in taxbot.json."
            ));
        }

        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(anyhow::anyhow!(
                "Backend URL must start with http:// or https://, got {}",
                url
            ));
        }

        if self.storage_key.trim().is_empty() {
            return Err(anyhow::anyhow!("storage_key must not be empty"));
        }

        if self.storage_key.contains(|c: char| c == '/' || c == '\\') || self.storage_key.starts_with('.') {
            return Err(anyhow::anyhow!(
                "storage_key must be a plain name, got {}",
                self.storage_key
            ));
        }

        if self.request_timeout_secs == 0 {
            return Err(anyhow::anyhow!("request_timeout_secs must be greater than 0"));
        }

        if self.wrap_width < 20 {
            return Err(anyhow::anyhow!("wrap_width must be at least 20"));
        }

        Ok(())
    }
}

/// Boolean environment values: true/false, 1/0, yes/no, on/off
fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}
