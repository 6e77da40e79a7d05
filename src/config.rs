//! Configuration loading.
//!
//! Settings come from three layers, later layers winning:
//!
//! 1. Built-in defaults (every key has one).
//! 2. An optional TOML file (`--config`, or `./rival.toml` when present).
//! 3. Environment variables, after `.env` has been loaded by `main`.
//!
//! ```toml
//! [data]
//! csv_path = "data/competitor_data.csv"
//!
//! [provider]
//! base_url = "https://api.cohere.com"
//! embed_model = "embed-english-v3.0"
//! chat_model = "command-r-plus-08-2024"
//! timeout_secs = 30
//!
//! [generation]
//! temperature = 0.1
//! max_tokens = 512
//! p = 0.75
//!
//! [retrieval]
//! top_k = 5
//!
//! [history]
//! max_entries = 20
//! export_dir = "."
//!
//! [server]
//! bind = "127.0.0.1:8501"
//! ```
//!
//! The API credential is read from `COHERE_API_KEY` (or `provider.api_key`)
//! and only required by commands that call the provider; see
//! [`Config::require_api_key`].

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use rival_radar_core::prompt::SamplingParams;

/// Config file picked up when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "rival.toml";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub data: DataConfig,
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub history: HistoryConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DataConfig {
    #[serde(default = "default_csv_path")]
    pub csv_path: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            csv_path: default_csv_path(),
        }
    }
}

fn default_csv_path() -> PathBuf {
    PathBuf::from("data/competitor_data.csv")
}

#[derive(Debug, Deserialize, Clone)]
pub struct ProviderConfig {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_embed_model")]
    pub embed_model: String,
    #[serde(default = "default_chat_model")]
    pub chat_model: String,
    /// Applied to every HTTP request, connect through body.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Texts per embedding request while indexing.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_base_url(),
            embed_model: default_embed_model(),
            chat_model: default_chat_model(),
            timeout_secs: default_timeout_secs(),
            batch_size: default_batch_size(),
        }
    }
}

fn default_base_url() -> String {
    "https://api.cohere.com".to_string()
}
fn default_embed_model() -> String {
    "embed-english-v3.0".to_string()
}
fn default_chat_model() -> String {
    "command-r-plus-08-2024".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_batch_size() -> usize {
    96
}

#[derive(Debug, Deserialize, Clone)]
pub struct GenerationConfig {
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_p")]
    pub p: f32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            p: default_p(),
        }
    }
}

fn default_temperature() -> f32 {
    0.1
}
fn default_max_tokens() -> u32 {
    512
}
fn default_p() -> f32 {
    0.75
}

impl GenerationConfig {
    pub fn sampling(&self) -> SamplingParams {
        SamplingParams {
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            p: self.p,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
        }
    }
}

fn default_top_k() -> usize {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct HistoryConfig {
    /// Unset keeps every entry until `clear`.
    #[serde(default)]
    pub max_entries: Option<usize>,
    #[serde(default = "default_export_dir")]
    pub export_dir: PathBuf,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_entries: None,
            export_dir: default_export_dir(),
        }
    }
}

fn default_export_dir() -> PathBuf {
    PathBuf::from(".")
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8501".to_string()
}

impl Config {
    /// The provider credential, or a startup error explaining how to set it.
    pub fn require_api_key(&self) -> Result<&str> {
        match self.provider.api_key.as_deref().map(str::trim) {
            Some(key) if !key.is_empty() => Ok(key),
            _ => bail!(
                "COHERE_API_KEY is not set. Add it to your environment or a .env file \
                 in the working directory."
            ),
        }
    }

    /// Overlay environment variables read through `lookup`.
    ///
    /// Taking a lookup function instead of reading `std::env` directly keeps
    /// tests independent of the process environment.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("COHERE_API_KEY") {
            self.provider.api_key = Some(v);
        }
        if let Some(v) = lookup("RIVAL_CSV_PATH") {
            self.data.csv_path = PathBuf::from(v);
        }
        if let Some(v) = lookup("RIVAL_COHERE_URL") {
            self.provider.base_url = v;
        }
        if let Some(v) = lookup("RIVAL_EMBED_MODEL") {
            self.provider.embed_model = v;
        }
        if let Some(v) = lookup("RIVAL_CHAT_MODEL") {
            self.provider.chat_model = v;
        }
        if let Some(v) = lookup("RIVAL_BIND") {
            self.server.bind = v;
        }
        if let Some(v) = lookup("RIVAL_EXPORT_DIR") {
            self.history.export_dir = PathBuf::from(v);
        }
        if let Some(v) = parse_env(&lookup, "RIVAL_TIMEOUT_SECS")? {
            self.provider.timeout_secs = v;
        }
        if let Some(v) = parse_env(&lookup, "RIVAL_TEMPERATURE")? {
            self.generation.temperature = v;
        }
        if let Some(v) = parse_env(&lookup, "RIVAL_MAX_TOKENS")? {
            self.generation.max_tokens = v;
        }
        if let Some(v) = parse_env(&lookup, "RIVAL_P")? {
            self.generation.p = v;
        }
        if let Some(v) = parse_env(&lookup, "RIVAL_TOP_K")? {
            self.retrieval.top_k = v;
        }
        if let Some(v) = parse_env(&lookup, "RIVAL_MAX_HISTORY")? {
            self.history.max_entries = Some(v);
        }
        Ok(())
    }

    /// Reject values that would make every later call fail.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.generation.temperature) {
            bail!("generation.temperature must be in [0.0, 1.0]");
        }
        if !(0.0..=0.99).contains(&self.generation.p) {
            bail!("generation.p must be in [0.0, 0.99]");
        }
        if self.generation.max_tokens == 0 {
            bail!("generation.max_tokens must be > 0");
        }
        if self.retrieval.top_k == 0 {
            bail!("retrieval.top_k must be >= 1");
        }
        if self.provider.timeout_secs == 0 {
            bail!("provider.timeout_secs must be > 0");
        }
        if self.provider.batch_size == 0 {
            bail!("provider.batch_size must be > 0");
        }
        if self.provider.base_url.trim().is_empty() {
            bail!("provider.base_url must not be empty");
        }
        Ok(())
    }
}

fn parse_env<T, F>(lookup: &F, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| anyhow::anyhow!("{} has invalid value '{}': {}", key, raw, e)),
    }
}

/// Parse a TOML config file.
pub fn load_file(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Build the effective configuration from file, process environment, and defaults.
///
/// An explicit `path` must exist; without one, [`DEFAULT_CONFIG_FILE`] is
/// used only if present.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let mut config = match path {
        Some(p) => load_file(p)?,
        None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
            load_file(Path::new(DEFAULT_CONFIG_FILE))?
        }
        None => Config::default(),
    };
    config.apply_env(|key| std::env::var(key).ok())?;
    config.validate()?;
    Ok(config)
}
