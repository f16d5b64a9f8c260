//! Configuration management for TicketBuddy.
//!
//! Non-secret settings are loaded from a TOML file stored in a
//! platform-specific location:
//!
//! - **macOS/Linux**: `~/.config/ticketbuddy/config.toml`
//! - **Windows**: `%APPDATA%\ticketbuddy\config.toml`
//!
//! Secrets (API tokens, the webhook secret) never live in the file; they are
//! read from the environment by [`Secrets::from_env`].
//!
//! # Example
//!
//! ```ignore
//! use ticketbuddy_core::config::Config;
//!
//! let mut config = Config::load()?;
//! config.set("server.bind", "0.0.0.0:8787")?;
//! config.save()?;
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{Error, Result};

/// Config file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Config directory name.
const CONFIG_DIR_NAME: &str = "ticketbuddy";

/// Default GitHub API URL.
pub const DEFAULT_GITHUB_API_URL: &str = "https://api.github.com";

/// Default address of the HTTP API (also what the MCP adapter talks to).
pub const DEFAULT_API_BASE: &str = "http://localhost:8787";

// =============================================================================
// Configuration structures
// =============================================================================

/// Main configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub github: GitHubConfig,

    /// Hosted language model; classification falls back to keyword rules
    /// when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub llm: Option<LlmConfig>,

    #[serde(default)]
    pub sync: SyncConfig,

    #[serde(default)]
    pub diagnostics: DiagnosticsConfig,

    #[serde(default)]
    pub classifier: ClassifierConfig,
}

/// HTTP server configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Socket address to listen on
    #[serde(default = "default_bind")]
    pub bind: String,
}

/// Relational store configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite database file; defaults to the platform data directory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

/// GitHub bridge configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GitHubConfig {
    /// GitHub API base URL (for GitHub Enterprise)
    #[serde(default = "default_github_api_url")]
    pub api_url: String,
}

/// Hosted language model configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Base URL of an OpenAI-compatible API (without `/chat/completions`)
    pub base_url: String,
    /// Model identifier
    pub model: String,
}

/// Poll-based resynchronisation of the linked repository.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Seconds between polls; 0 disables the background poller
    #[serde(default)]
    pub interval_secs: u64,
}

/// Diagnostic tool configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticsConfig {
    /// JSON file holding the log sample to summarise
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_sample: Option<PathBuf>,
}

/// Classifier configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// Owner overrides keyed by domain (`authentication`, `database`, `api`,
    /// `frontend`, `mobile`, `triage`)
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub owners: BTreeMap<String, String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            api_url: default_github_api_url(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8787".to_string()
}

fn default_github_api_url() -> String {
    DEFAULT_GITHUB_API_URL.to_string()
}

// =============================================================================
// Config implementation
// =============================================================================

impl Config {
    /// Get the configuration directory path.
    pub fn config_dir() -> Result<PathBuf> {
        dirs::config_dir()
            .map(|p| p.join(CONFIG_DIR_NAME))
            .ok_or_else(|| Error::Config("Could not determine config directory".to_string()))
    }

    /// Get the configuration file path.
    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join(CONFIG_FILE_NAME))
    }

    /// Load configuration from the default location.
    ///
    /// Returns a default config if the file doesn't exist.
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        Self::load_from(&path)
    }

    /// Load configuration from a specific path.
    ///
    /// Returns a default config if the file doesn't exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = ?path, "Config file does not exist, using defaults");
            return Ok(Self::default());
        }

        debug!(path = ?path, "Loading config");

        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read config file: {}", e)))?;

        let config: Config = toml::from_str(&contents)
            .map_err(|e| Error::Config(format!("Failed to parse config file: {}", e)))?;

        info!(path = ?path, "Config loaded successfully");
        Ok(config)
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        self.save_to(&path)
    }

    /// Save configuration to a specific path.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::Config(format!("Failed to create config directory: {}", e)))?;
        }

        debug!(path = ?path, "Saving config");

        let contents = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, contents)
            .map_err(|e| Error::Config(format!("Failed to write config file: {}", e)))?;

        info!(path = ?path, "Config saved successfully");
        Ok(())
    }

    /// Resolved database path, falling back to the platform data directory.
    pub fn database_path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.database.path {
            return Ok(path.clone());
        }
        dirs::data_dir()
            .map(|p| p.join(CONFIG_DIR_NAME).join("ticketbuddy.db"))
            .ok_or_else(|| Error::Config("Could not determine data directory".to_string()))
    }

    /// Set a configuration value by key path.
    ///
    /// Key format: `section.field` (e.g., `server.bind`, `llm.model`,
    /// `classifier.owners.database`)
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let (section, field) = split_key(key)?;

        match (section, field) {
            ("server", "bind") => self.server.bind = value.to_string(),
            ("database", "path") => self.database.path = Some(PathBuf::from(value)),
            ("github", "api_url" | "url") => self.github.api_url = value.to_string(),
            ("llm", "base_url" | "url") => {
                self.llm_mut().base_url = value.to_string();
            }
            ("llm", "model") => {
                self.llm_mut().model = value.to_string();
            }
            ("sync", "interval_secs" | "interval") => {
                self.sync.interval_secs = value.parse().map_err(|_| {
                    Error::Config(format!("sync.interval_secs must be a number: {}", value))
                })?;
            }
            ("diagnostics", "log_sample") => {
                self.diagnostics.log_sample = Some(PathBuf::from(value));
            }
            ("classifier", owner) if owner.starts_with("owners.") => {
                let domain = &owner["owners.".len()..];
                self.classifier
                    .owners
                    .insert(domain.to_string(), value.to_string());
            }
            _ => return Err(unknown_key(key)),
        }

        Ok(())
    }

    /// Get a configuration value by key path.
    pub fn get(&self, key: &str) -> Result<Option<String>> {
        let (section, field) = split_key(key)?;

        match (section, field) {
            ("server", "bind") => Ok(Some(self.server.bind.clone())),
            ("database", "path") => Ok(self
                .database
                .path
                .as_ref()
                .map(|p| p.display().to_string())),
            ("github", "api_url" | "url") => Ok(Some(self.github.api_url.clone())),
            ("llm", "base_url" | "url") => Ok(self.llm.as_ref().map(|l| l.base_url.clone())),
            ("llm", "model") => Ok(self.llm.as_ref().map(|l| l.model.clone())),
            ("sync", "interval_secs" | "interval") => {
                Ok(Some(self.sync.interval_secs.to_string()))
            }
            ("diagnostics", "log_sample") => Ok(self
                .diagnostics
                .log_sample
                .as_ref()
                .map(|p| p.display().to_string())),
            ("classifier", owner) if owner.starts_with("owners.") => {
                let domain = &owner["owners.".len()..];
                Ok(self.classifier.owners.get(domain).cloned())
            }
            _ => Err(unknown_key(key)),
        }
    }

    /// The language model settings, when both `base_url` and `model` are
    /// filled in. A half-configured `[llm]` section counts as no model.
    pub fn language_model(&self) -> Option<&LlmConfig> {
        self.llm
            .as_ref()
            .filter(|llm| !llm.base_url.trim().is_empty() && !llm.model.trim().is_empty())
    }

    fn llm_mut(&mut self) -> &mut LlmConfig {
        self.llm.get_or_insert_with(|| LlmConfig {
            base_url: String::new(),
            model: String::new(),
        })
    }
}

fn split_key(key: &str) -> Result<(&str, &str)> {
    key.split_once('.')
        .filter(|(section, field)| !section.is_empty() && !field.is_empty())
        .ok_or_else(|| {
            Error::Config(format!(
                "Invalid config key '{}'. Expected format: section.field",
                key
            ))
        })
}

fn unknown_key(key: &str) -> Error {
    Error::Config(format!("Unknown config key: {}", key))
}

// =============================================================================
// Secrets
// =============================================================================

/// Environment-provided secrets.
#[derive(Clone, Default)]
pub struct Secrets {
    /// `GITHUB_TOKEN`
    pub github_token: Option<String>,
    /// `GITHUB_WEBHOOK_SECRET`
    pub webhook_secret: Option<String>,
    /// `LLM_API_KEY`
    pub llm_api_key: Option<String>,
    /// `TICKETBUDDY_API`
    pub api_base: String,
}

impl Secrets {
    /// Read secrets from the process environment. Empty values count as unset.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read secrets through an arbitrary lookup function.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        Self {
            github_token: get("GITHUB_TOKEN"),
            webhook_secret: get("GITHUB_WEBHOOK_SECRET"),
            llm_api_key: get("LLM_API_KEY"),
            api_base: get("TICKETBUDDY_API").unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
        }
    }
}

impl fmt::Debug for Secrets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |v: &Option<String>| v.as_ref().map(|_| "<redacted>");
        f.debug_struct("Secrets")
            .field("github_token", &redact(&self.github_token))
            .field("webhook_secret", &redact(&self.webhook_secret))
            .field("llm_api_key", &redact(&self.llm_api_key))
            .field("api_base", &self.api_base)
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
