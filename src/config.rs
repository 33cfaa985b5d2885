// Configuration File Support
//
// Configuration for the event-quota CLI: logging, storage location and the
// default quota policy.
// Supports TOML format with environment variable overrides.
// Configuration files are loaded from the XDG config directory: ~/.config/event-quota/config.toml

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::quota::policy::{QuotaPolicy, DEFAULT_MAX_EVENTS, DEFAULT_WINDOW_MS};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Logging configuration
    pub logging: LoggingConfig,

    /// Event history storage
    pub storage: StorageConfig,

    /// Default quota policy
    pub policy: PolicyConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (json, pretty, compact)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "compact".to_string(),
        }
    }
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding one history file per quota bucket
    pub dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        let dir = directories::ProjectDirs::from("com", "event-quota", "EventQuota")
            .map(|dirs| dirs.data_dir().join("histories"))
            .unwrap_or_else(|| PathBuf::from("./histories"));
        Self { dir }
    }
}

/// Default quota policy configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PolicyConfig {
    /// Events allowed per window
    pub max_events: usize,

    /// Window length in milliseconds
    pub window_ms: i64,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            max_events: DEFAULT_MAX_EVENTS,
            window_ms: DEFAULT_WINDOW_MS,
        }
    }
}

impl PolicyConfig {
    /// Convert to a quota policy
    pub fn to_policy(&self) -> QuotaPolicy {
        QuotaPolicy::new(self.max_events, self.window_ms)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            logging: LoggingConfig::default(),
            storage: StorageConfig::default(),
            policy: PolicyConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from the default XDG config directory
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed.
    /// If the config file does not exist, returns default configuration.
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();
        Self::load_from_path(&config_path)
    }

    /// Load configuration from a specific path
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed, or
    /// if the resulting configuration is invalid.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let config = if path.exists() {
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file from {:?}", path))?;
            let config: Config = toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file from {:?}", path))?;
            tracing::info!("Loaded configuration from {:?}", path);
            config
        } else {
            tracing::debug!("Config file not found at {:?}, using defaults", path);
            Self::default()
        };

        let config = config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path
    ///
    /// Returns `~/.config/event-quota/config.toml` on Linux
    pub fn config_path() -> PathBuf {
        if let Some(proj_dirs) = directories::ProjectDirs::from("com", "event-quota", "EventQuota")
        {
            proj_dirs.config_dir().join("config.toml")
        } else {
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
            PathBuf::from(home)
                .join(".config")
                .join("event-quota")
                .join("config.toml")
        }
    }

    /// Apply environment variable overrides to the configuration
    ///
    /// Environment variables take precedence over config file values:
    /// - EVENT_QUOTA_LOG_LEVEL
    /// - EVENT_QUOTA_LOG_FORMAT
    /// - EVENT_QUOTA_STORAGE_DIR
    /// - EVENT_QUOTA_MAX_EVENTS
    /// - EVENT_QUOTA_WINDOW_MS
    fn apply_env_overrides(self) -> Self {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    fn apply_overrides(mut self, var: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(level) = var("EVENT_QUOTA_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = var("EVENT_QUOTA_LOG_FORMAT") {
            self.logging.format = format;
        }

        if let Some(dir) = var("EVENT_QUOTA_STORAGE_DIR") {
            if !dir.is_empty() {
                self.storage.dir = PathBuf::from(dir);
            }
        }

        // Unparsable numbers keep the current value
        if let Some(max) = var("EVENT_QUOTA_MAX_EVENTS").and_then(|v| v.parse::<usize>().ok()) {
            self.policy.max_events = max;
        }
        if let Some(window) = var("EVENT_QUOTA_WINDOW_MS").and_then(|v| v.parse::<i64>().ok()) {
            if window > 0 {
                self.policy.window_ms = window;
            }
        }

        self
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<()> {
        match self.logging.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!(
                "Invalid log level: {}. Must be one of: trace, debug, info, warn, error",
                self.logging.level
            ),
        }

        match self.logging.format.to_lowercase().as_str() {
            "json" | "pretty" | "compact" => {}
            _ => anyhow::bail!(
                "Invalid log format: {}. Must be one of: json, pretty, compact",
                self.logging.format
            ),
        }

        if self.storage.dir.as_os_str().is_empty() {
            anyhow::bail!("Storage directory must not be empty");
        }

        if self.policy.window_ms <= 0 {
            anyhow::bail!("Quota window must be > 0 ms");
        }

        Ok(())
    }

    /// Convert log level string to tracing::Level
    pub fn log_level(&self) -> Result<tracing::Level> {
        self.logging
            .level
            .to_lowercase()
            .parse()
            .map_err(|e| anyhow::anyhow!("Failed to parse log level: {}", e))
    }
}
