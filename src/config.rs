//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.textguard.toml` files.

use crate::client::ClientConfig;
use crate::session::SessionConfig;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Name of the configuration file looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = ".textguard.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Analysis service settings.
    #[serde(default)]
    pub service: ServiceConfig,

    /// Session state settings.
    #[serde(default)]
    pub session: SessionSettings,

    /// Display settings.
    #[serde(default)]
    pub display: DisplayConfig,
}

/// Analysis service connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Base URL of the analysis service.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_seconds: default_timeout(),
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_timeout() -> u64 {
    30
}

/// Session state settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSettings {
    /// Number of recent results kept for display.
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,

    /// Longest text accepted for analysis, in characters.
    #[serde(default = "default_max_text_chars")]
    pub max_text_chars: usize,

    /// Seed statistics and history from the service on startup.
    #[serde(default = "default_true")]
    pub seed_on_start: bool,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            history_capacity: default_history_capacity(),
            max_text_chars: default_max_text_chars(),
            seed_on_start: true,
        }
    }
}

fn default_history_capacity() -> usize {
    crate::session::history::DEFAULT_HISTORY_CAPACITY
}

fn default_max_text_chars() -> usize {
    crate::session::controller::MAX_TEXT_CHARS
}

fn default_true() -> bool {
    true
}

/// Display settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayConfig {
    /// Characters of submitted text shown per history row.
    #[serde(default = "default_truncate_len")]
    pub truncate_len: usize,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            truncate_len: default_truncate_len(),
        }
    }
}

fn default_truncate_len() -> usize {
    50
}

impl From<&ServiceConfig> for ClientConfig {
    fn from(config: &ServiceConfig) -> Self {
        Self {
            base_url: config.base_url.clone(),
            timeout_seconds: config.timeout_seconds,
        }
    }
}

impl From<&SessionSettings> for SessionConfig {
    fn from(config: &SessionSettings) -> Self {
        Self {
            history_capacity: config.history_capacity,
            max_text_chars: config.max_text_chars.min(crate::session::controller::MAX_TEXT_CHARS),
        }
    }
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        Self::load_from_dir(Path::new("."))
    }

    /// Try to load `.textguard.toml` from a directory.
    pub fn load_from_dir(dir: &Path) -> Result<Option<Self>> {
        let config_path = dir.join(CONFIG_FILE_NAME);

        if config_path.exists() {
            Ok(Some(Self::load(&config_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings, but only
    /// when they were given explicitly.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref url) = args.api_url {
            self.service.base_url = url.clone();
        }
        if let Some(timeout) = args.timeout {
            self.service.timeout_seconds = timeout;
        }

        if let Some(size) = args.history_size {
            self.session.history_capacity = size;
        }
        if args.no_seed {
            self.session.seed_on_start = false;
        }

        if let Some(len) = args.truncate {
            self.display.truncate_len = len;
        }
    }

    /// Check the merged settings before anything is built from them.
    ///
    /// Command-line flags are checked by `Args::validate`; this catches the
    /// same mistakes when they come from the config file.
    pub fn validate(&self) -> Result<()> {
        let url = &self.service.base_url;
        if !url.starts_with("http://") && !url.starts_with("https://") {
            bail!("service.base_url must start with 'http://' or 'https://' (got '{}')", url);
        }
        if self.service.timeout_seconds == 0 {
            bail!("service.timeout_seconds must be at least 1");
        }
        if self.session.history_capacity == 0 {
            bail!("session.history_capacity must be at least 1");
        }
        if self.session.max_text_chars == 0 {
            bail!("session.max_text_chars must be at least 1");
        }
        Ok(())
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Args;
    use clap::Parser;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.service.base_url, "http://localhost:8000");
        assert_eq!(config.session.history_capacity, 10);
        assert_eq!(config.session.max_text_chars, 10_000);
        assert!(config.session.seed_on_start);
    }

    #[test]
    fn test_parse_config() {
        let toml_content = r#"
[service]
base_url = "https://guard.example.com"

[session]
history_capacity = 5
seed_on_start = false
"#;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert_eq!(config.service.base_url, "https://guard.example.com");
        assert_eq!(config.service.timeout_seconds, 30);
        assert_eq!(config.session.history_capacity, 5);
        assert!(!config.session.seed_on_start);
        assert_eq!(config.display.truncate_len, 50);
    }

    #[test]
    fn test_load_from_dir() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Config::load_from_dir(dir.path()).unwrap().is_none());

        std::fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            "[display]\ntruncate_len = 12\n",
        )
        .unwrap();
        let config = Config::load_from_dir(dir.path()).unwrap().unwrap();
        assert_eq!(config.display.truncate_len, 12);

        std::fs::write(dir.path().join(CONFIG_FILE_NAME), "[display\n").unwrap();
        assert!(Config::load_from_dir(dir.path()).is_err());
    }

    #[test]
    fn test_merge_only_overrides_explicit_flags() {
        let mut config = Config::default();
        config.service.base_url = "https://from-file.example.com".to_string();
        config.session.history_capacity = 7;

        let args = Args::try_parse_from(["textguard", "--timeout", "5", "--no-seed"]).unwrap();
        let args = Args {
            api_url: None,
            ..args
        };
        config.merge_with_args(&args);

        assert_eq!(config.service.base_url, "https://from-file.example.com");
        assert_eq!(config.service.timeout_seconds, 5);
        assert_eq!(config.session.history_capacity, 7);
        assert!(!config.session.seed_on_start);
    }

    #[test]
    fn test_validate_rejects_zero_values_from_file() {
        assert!(Config::default().validate().is_ok());

        let config: Config = toml::from_str("[service]\ntimeout_seconds = 0\n").unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("timeout_seconds"));

        let config: Config = toml::from_str("[session]\nhistory_capacity = 0\n").unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("history_capacity"));

        let config: Config = toml::from_str("[service]\nbase_url = \"localhost:8000\"\n").unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_flags_can_repair_file_values() {
        let mut config: Config = toml::from_str("[service]\ntimeout_seconds = 0\n").unwrap();
        let args = Args {
            api_url: None,
            ..Args::try_parse_from(["textguard", "--timeout", "5"]).unwrap()
        };
        config.merge_with_args(&args);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_session_config_caps_text_limit() {
        let settings = SessionSettings {
            max_text_chars: 50_000,
            ..Default::default()
        };
        assert_eq!(SessionConfig::from(&settings).max_text_chars, 10_000);
    }

    #[test]
    fn test_default_toml_generation() {
        let toml_str = Config::default_toml();
        assert!(toml_str.contains("[service]"));
        assert!(toml_str.contains("[session]"));
        assert!(toml_str.contains("[display]"));
    }
}
