use anyhow::{Context, Result};
use config::{Config, ConfigError, Environment, File as ConfigFile};
use serde::Deserialize;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

pub type Number = f32;

/// Magnitudes at or below this are treated as zero.
pub const EPSILON: f32 = 1e-6;

pub const DEFAULT_DB_DIR: &str = "databases";
pub const DEFAULT_API_URL: &str = "https://api.openai.com/v1/embeddings";
pub const DEFAULT_MODEL: &str = "text-embedding-3-small";
pub const DEFAULT_TOP_K: usize = 5;
pub const DEFAULT_MIN_CHUNK_LEN: usize = 10;

#[derive(Deserialize, Default)]
pub struct DocvekConfig {
    pub db_dir: Option<String>,
    pub api_url: Option<String>,
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub top_k: Option<usize>,
    pub min_chunk_len: Option<usize>,
    pub max_retries: Option<u32>,
    pub retry_backoff_ms: Option<u64>,
    pub timeout_secs: Option<u64>,
    pub verbose: Option<bool>,
}

impl DocvekConfig {
    pub fn try_from(config: &Config) -> Result<Self, ConfigError> {
        Ok(DocvekConfig {
            db_dir: config.get("db_dir").ok(),
            api_url: config.get("api_url").ok(),
            api_key: config.get("api_key").ok(),
            model: config.get("model").ok(),
            top_k: config.get("top_k").ok(),
            min_chunk_len: config.get("min_chunk_len").ok(),
            max_retries: config.get("max_retries").ok(),
            retry_backoff_ms: config.get("retry_backoff_ms").ok(),
            timeout_secs: config.get("timeout_secs").ok(),
            verbose: config.get("verbose").ok(),
        })
    }
}

/// Resolved runtime settings.
#[derive(Debug, Clone)]
pub struct Settings {
    pub db_dir: PathBuf,
    pub api_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub top_k: usize,
    pub min_chunk_len: usize,
    pub max_retries: u32,
    pub retry_backoff: Duration,
    pub timeout: Duration,
    pub verbose: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            db_dir: PathBuf::from(DEFAULT_DB_DIR),
            api_url: DEFAULT_API_URL.to_string(),
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            top_k: DEFAULT_TOP_K,
            min_chunk_len: DEFAULT_MIN_CHUNK_LEN,
            max_retries: 2,
            retry_backoff: Duration::from_millis(500),
            timeout: Duration::from_secs(30),
            verbose: false,
        }
    }
}

impl Settings {
    /// Loads `docvek_config.*` from the working directory, then `DOCVEK_*`
    /// environment variables on top.
    pub fn load() -> Result<Self> {
        let config = Config::builder()
            .add_source(ConfigFile::with_name("docvek_config").required(false))
            .add_source(Environment::with_prefix("DOCVEK"))
            .build()
            .context("Failed to read docvek configuration")?;

        Self::from_config(&config)
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let raw = DocvekConfig::try_from(config)?;
        let defaults = Settings::default();

        let api_key = raw
            .api_key
            .or_else(|| env::var("OPENAI_API_KEY").ok())
            .filter(|key| !key.trim().is_empty());

        let settings = Settings {
            db_dir: raw.db_dir.map(PathBuf::from).unwrap_or(defaults.db_dir),
            api_url: raw.api_url.unwrap_or(defaults.api_url),
            api_key,
            model: raw.model.unwrap_or(defaults.model),
            top_k: raw.top_k.unwrap_or(defaults.top_k),
            min_chunk_len: raw.min_chunk_len.unwrap_or(defaults.min_chunk_len),
            max_retries: raw.max_retries.unwrap_or(defaults.max_retries),
            retry_backoff: raw
                .retry_backoff_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.retry_backoff),
            timeout: raw
                .timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
            verbose: raw.verbose.unwrap_or(defaults.verbose),
        };

        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<()> {
        if self.top_k == 0 {
            anyhow::bail!("DOCVEK_TOP_K must be at least 1.");
        }
        if self.timeout.is_zero() {
            anyhow::bail!("DOCVEK_TIMEOUT_SECS must be at least 1.");
        }
        Ok(())
    }

    pub fn require_api_key(&self) -> Result<&str> {
        self.api_key
            .as_deref()
            .context("DOCVEK_API_KEY (or OPENAI_API_KEY) not set in config or environment")
    }

    pub fn print_config(&self) {
        println!("db_dir={}", self.db_dir.display());
        println!("api_url={}", self.api_url);
        println!(
            "api_key={}",
            if self.api_key.is_some() { "<set>" } else { "<unset>" }
        );
        println!("model={}", self.model);
        println!("top_k={}", self.top_k);
        println!("min_chunk_len={}", self.min_chunk_len);
        println!("max_retries={}", self.max_retries);
        println!("retry_backoff_ms={}", self.retry_backoff.as_millis());
        println!("timeout_secs={}", self.timeout.as_secs());
        println!("verbose={}", self.verbose);
    }
}
