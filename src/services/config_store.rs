// Configuration Storage Service
// Handles config file read/write, version backup and environment overrides

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::services::analysis::{PipelineOptions, DEFAULT_MAX_SEGMENT_CHARS};
use crate::services::providers::{
    ProviderSettings, DEFAULT_MAX_TOKENS, DEFAULT_REFERER, DEFAULT_TEMPERATURE,
    DEFAULT_TIMEOUT_SECS, DEFAULT_TITLE, OPENROUTER_DEFAULT_MODEL, OPENROUTER_DEFAULT_URL,
};

pub const APP_DIR_NAME: &str = "legally";
pub const PROVIDER_NAME: &str = "openrouter";
const API_KEY_ENV_VARS: &[&str] = &["OPENROUTER_API_KEY", "LEGALLY_OPENROUTER_API_KEY"];
const API_URL_ENV_VAR: &str = "LEGALLY_API_URL";
const MODEL_ENV_VAR: &str = "LEGALLY_MODEL";
const HISTORY_FILE_NAME: &str = "history.jsonl";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    pub proxy: Option<ProxyConfig>,
    #[serde(default)]
    pub api_keys: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ProxyConfig {
    pub enabled: bool,
    pub url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfig {
    pub base_url: Option<String>,
    pub model: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: i32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_referer")]
    pub referer: Option<String>,
    #[serde(default = "default_title")]
    pub title: Option<String>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            model: None,
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            referer: default_referer(),
            title: default_title(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisConfig {
    #[serde(default = "default_max_segment_chars")]
    pub max_segment_chars: usize,
    #[serde(default = "default_one")]
    pub concurrency: usize,
    #[serde(default = "default_one")]
    pub max_attempts: usize,
    #[serde(default = "default_backoff_ms")]
    pub retry_backoff_ms: u64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            max_segment_chars: DEFAULT_MAX_SEGMENT_CHARS,
            concurrency: 1,
            max_attempts: 1,
            retry_backoff_ms: 400,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageConfig {
    pub history_path: Option<PathBuf>,
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            history_path: None,
            history_limit: 50,
        }
    }
}

fn default_temperature() -> f64 { DEFAULT_TEMPERATURE }
fn default_max_tokens() -> i32 { DEFAULT_MAX_TOKENS }
fn default_timeout_secs() -> u64 { DEFAULT_TIMEOUT_SECS }
fn default_referer() -> Option<String> { Some(DEFAULT_REFERER.to_string()) }
fn default_title() -> Option<String> { Some(DEFAULT_TITLE.to_string()) }
fn default_max_segment_chars() -> usize { DEFAULT_MAX_SEGMENT_CHARS }
fn default_one() -> usize { 1 }
fn default_backoff_ms() -> u64 { 400 }
fn default_history_limit() -> usize { 50 }

impl AppConfig {
    /// Provider settings with environment overrides applied.
    pub fn provider_settings(&self) -> ProviderSettings {
        self.provider_settings_with(|name| env::var(name).ok())
    }

    /// Same as [`AppConfig::provider_settings`] with an injectable variable lookup.
    pub fn provider_settings_with<F>(&self, lookup: F) -> ProviderSettings
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_blank = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let api_key = API_KEY_ENV_VARS
            .iter()
            .find_map(|name| non_blank(*name))
            .or_else(|| {
                self.api_keys
                    .get(PROVIDER_NAME)
                    .map(|k| k.trim().to_string())
                    .filter(|k| !k.is_empty())
            });

        let endpoint = non_blank(API_URL_ENV_VAR)
            .or_else(|| self.provider.base_url.clone())
            .unwrap_or_else(|| OPENROUTER_DEFAULT_URL.to_string());
        let model = non_blank(MODEL_ENV_VAR)
            .or_else(|| self.provider.model.clone())
            .unwrap_or_else(|| OPENROUTER_DEFAULT_MODEL.to_string());

        let proxy = self
            .proxy
            .as_ref()
            .filter(|p| p.enabled)
            .and_then(|p| p.url.clone());

        ProviderSettings {
            endpoint,
            model,
            api_key,
            temperature: self.provider.temperature,
            max_tokens: self.provider.max_tokens,
            timeout_secs: self.provider.timeout_secs,
            referer: self.provider.referer.clone(),
            title: self.provider.title.clone(),
            proxy,
        }
    }

    pub fn pipeline_options(&self) -> PipelineOptions {
        PipelineOptions {
            max_segment_chars: self.analysis.max_segment_chars,
            concurrency: self.analysis.concurrency.max(1),
        }
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.analysis.retry_backoff_ms)
    }

    /// Configured history file, or `<data dir>/legally/history.jsonl`.
    pub fn history_path(&self) -> PathBuf {
        if let Some(path) = &self.storage.history_path {
            return path.clone();
        }
        dirs::data_local_dir()
            .map(|p| p.join(APP_DIR_NAME))
            .unwrap_or_else(|| PathBuf::from("data"))
            .join(HISTORY_FILE_NAME)
    }
}

pub struct ConfigStore {
    config_dir: PathBuf,
    config_file: PathBuf,
}

impl ConfigStore {
    pub fn new(config_dir: PathBuf) -> Self {
        let config_file = config_dir.join("config.json");
        Self { config_dir, config_file }
    }

    /// Get default config directory
    pub fn default_config_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join(APP_DIR_NAME))
    }

    pub fn config_file(&self) -> &Path {
        &self.config_file
    }

    /// Ensure config directory exists
    pub fn ensure_dir(&self) -> Result<(), String> {
        fs::create_dir_all(&self.config_dir)
            .map_err(|e| format!("Failed to create config dir: {}", e))
    }

    /// Load configuration from file; a missing file yields defaults.
    pub fn load(&self) -> Result<AppConfig, String> {
        if !self.config_file.exists() {
            return Ok(AppConfig::default());
        }

        let content = fs::read_to_string(&self.config_file)
            .map_err(|e| format!("Failed to read config: {}", e))?;

        serde_json::from_str(&content)
            .map_err(|e| format!("Failed to parse config: {}", e))
    }

    /// Save configuration to file
    pub fn save(&self, config: &AppConfig) -> Result<(), String> {
        self.ensure_dir()?;

        if self.config_file.exists() {
            self.create_backup()?;
        }

        let content = serde_json::to_string_pretty(config)
            .map_err(|e| format!("Failed to serialize config: {}", e))?;

        fs::write(&self.config_file, content)
            .map_err(|e| format!("Failed to write config: {}", e))
    }

    fn create_backup(&self) -> Result<(), String> {
        let backup_dir = self.config_dir.join("backups");
        fs::create_dir_all(&backup_dir)
            .map_err(|e| format!("Failed to create backup dir: {}", e))?;

        let timestamp = chrono::Utc::now().format("%Y%m%d_%H%M%S%3f");
        let backup_file = backup_dir.join(format!("config_{}.json", timestamp));

        fs::copy(&self.config_file, &backup_file)
            .map_err(|e| format!("Failed to create backup: {}", e))?;

        // Keep only last 10 backups
        self.cleanup_old_backups(&backup_dir, 10)
    }

    fn cleanup_old_backups(&self, backup_dir: &Path, keep: usize) -> Result<(), String> {
        let mut entries: Vec<_> = fs::read_dir(backup_dir)
            .map_err(|e| format!("Failed to read backup dir: {}", e))?
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().map_or(false, |ext| ext == "json"))
            .collect();

        if entries.len() <= keep {
            return Ok(());
        }

        // Oldest first
        entries.sort_by_key(|e| {
            e.metadata()
                .and_then(|m| m.modified())
                .unwrap_or(std::time::SystemTime::UNIX_EPOCH)
        });

        let remove_count = entries.len() - keep;
        for entry in entries.iter().take(remove_count) {
            let _ = fs::remove_file(entry.path());
        }

        Ok(())
    }

    /// Store provider API key in config file
    pub fn set_api_key(&self, provider: &str, key: &str) -> Result<(), String> {
        let mut config = self.load()?;
        config.api_keys.insert(provider.to_string(), key.to_string());
        self.save(&config)
    }

    /// Remove the stored key. Returns whether one was present; nothing is
    /// written when it was not.
    pub fn delete_api_key(&self, provider: &str) -> Result<bool, String> {
        let mut config = self.load()?;
        if config.api_keys.remove(provider).is_none() {
            return Ok(false);
        }
        self.save(&config)?;
        Ok(true)
    }
}

/// Load the config from the default location, falling back to defaults.
pub fn load_app_config() -> AppConfig {
    ConfigStore::default_config_dir()
        .map(ConfigStore::new)
        .and_then(|store| match store.load() {
            Ok(config) => Some(config),
            Err(e) => {
                tracing::warn!("[CONFIG] {}; using defaults", e);
                None
            }
        })
        .unwrap_or_default()
}
