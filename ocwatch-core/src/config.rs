//! Configuration loading and management
//!
//! Configuration is loaded from `~/.config/ocwatch/config.toml`
//!
//! This module follows the XDG Base Directory Specification:
//! - Config: `$XDG_CONFIG_HOME/ocwatch/` (~/.config/ocwatch/)
//! - State/Logs: `$XDG_STATE_HOME/ocwatch/` (~/.local/state/ocwatch/)

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::PathBuf;

/// Best-effort home directory lookup, `$HOME` first.
fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// `$XDG_CONFIG_HOME`, falling back to `~/.config`.
fn xdg_config_home() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"))
}

/// `$XDG_STATE_HOME`, falling back to `~/.local/state`.
fn xdg_state_home() -> PathBuf {
    std::env::var("XDG_STATE_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/state"))
}

/// Top-level configuration, deserialized from `config.toml`.
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// Agent server connection
    #[serde(default)]
    pub server: ServerConfig,

    /// Event classification rule sets
    #[serde(default)]
    pub classify: ClassifyConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Agent server connection configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Base URL of the agent server (e.g. `http://127.0.0.1:4096`)
    #[serde(default = "default_server_url")]
    pub url: String,

    /// Workspace directory passed to the server as a query parameter.
    /// When unset the server's own working directory applies.
    pub directory: Option<String>,

    /// HTTP request timeout in seconds (history and session calls only;
    /// the event stream stays open indefinitely)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Max retry attempts for transient history/session call failures
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            url: default_server_url(),
            directory: None,
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
        }
    }
}

impl ServerConfig {
    /// Validate configuration, returning error message if invalid
    pub fn validate(&self) -> Result<()> {
        if self.url.trim().is_empty() {
            return Err(Error::Config("server.url must not be empty".to_string()));
        }
        if !self.url.starts_with("http://") && !self.url.starts_with("https://") {
            return Err(Error::Config(format!(
                "server.url must start with http:// or https://, got {}",
                self.url
            )));
        }
        if self.timeout_secs == 0 {
            return Err(Error::Config(
                "server.timeout_secs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

fn default_server_url() -> String {
    "http://127.0.0.1:4096".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_max_retries() -> usize {
    3
}

/// Event classification rule sets
///
/// The server's event vocabulary is open-ended; these lists are the known
/// subset, not an exhaustive contract. Types outside both lists degrade to
/// the unclassified bucket and show up in the stats breakdown.
#[derive(Debug, Deserialize, Clone)]
pub struct ClassifyConfig {
    /// Event types that belong to the message lifecycle
    #[serde(default = "default_message_types")]
    pub message_types: Vec<String>,

    /// Event types that are server housekeeping, not user-facing traffic
    #[serde(default = "default_internal_types")]
    pub internal_types: Vec<String>,
}

impl Default for ClassifyConfig {
    fn default() -> Self {
        Self {
            message_types: default_message_types(),
            internal_types: default_internal_types(),
        }
    }
}

fn default_message_types() -> Vec<String> {
    [
        "message.part",
        "message.part-added",
        "message.part.updated",
        "message.part.removed",
        "message.updated",
        "message.removed",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_internal_types() -> Vec<String> {
    [
        "server.connected",
        "session.idle",
        "session.error",
        "session.updated",
        "session.deleted",
        "storage.write",
        "file.edited",
        "file.watcher.updated",
        "lsp.client.diagnostics",
        "permission.updated",
        "installation.updated",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Directory for log files; defaults to the XDG state dir
    pub dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            dir: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from the default path
    pub fn load() -> Result<Self> {
        let path = Self::config_path();
        if !path.exists() {
            tracing::info!("no config file at {:?}, using defaults", path);
            return Ok(Config::default());
        }
        Self::load_from(&path)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &PathBuf) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config file {:?}: {}", path, e)))?;

        toml::from_str(&content).map_err(|e| Error::Config(format!("failed to parse config: {}", e)))
    }

    /// Returns the default config file path
    ///
    /// `$XDG_CONFIG_HOME/ocwatch/config.toml` (~/.config/ocwatch/config.toml)
    pub fn config_path() -> PathBuf {
        xdg_config_home().join("ocwatch").join("config.toml")
    }

    /// Returns the state directory path (for logs)
    ///
    /// `$XDG_STATE_HOME/ocwatch/` (~/.local/state/ocwatch/)
    pub fn state_dir() -> PathBuf {
        xdg_state_home().join("ocwatch")
    }

    /// Returns the log file path
    ///
    /// `$XDG_STATE_HOME/ocwatch/ocwatch.log` (~/.local/state/ocwatch/ocwatch.log)
    pub fn log_path() -> PathBuf {
        Self::state_dir().join("ocwatch.log")
    }

    /// Ensure the XDG base directory variables are present in the environment.
    ///
    /// Binaries call this early so later path lookups (config, state, logs)
    /// resolve the same way regardless of the invoking shell.
    pub fn ensure_xdg_env() {
        let home = home_dir();

        if std::env::var("XDG_CONFIG_HOME").is_err() {
            std::env::set_var("XDG_CONFIG_HOME", home.join(".config"));
        }

        if std::env::var("XDG_STATE_HOME").is_err() {
            std::env::set_var("XDG_STATE_HOME", home.join(".local/state"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.server.url, "http://127.0.0.1:4096");
        assert_eq!(config.server.timeout_secs, 10);
        assert_eq!(config.server.max_retries, 3);
        assert_eq!(config.logging.level, "info");
        assert!(config.server.validate().is_ok());
    }

    #[test]
    fn test_parse_config() {
        let toml = r#"
[server]
url = "http://localhost:8080"
directory = "/home/me/project"
timeout_secs = 5

[logging]
level = "debug"
"#;
        let config: Config = toml::from_str(toml).unwrap();

        assert_eq!(config.server.url, "http://localhost:8080");
        assert_eq!(config.server.directory.as_deref(), Some("/home/me/project"));
        assert_eq!(config.server.timeout_secs, 5);
        assert_eq!(config.logging.level, "debug");
        // Untouched sections keep their defaults
        assert!(!config.classify.message_types.is_empty());
    }

    #[test]
    fn test_server_config_validation() {
        let config = ServerConfig {
            url: String::new(),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = ServerConfig {
            url: "ftp://example.com".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = ServerConfig {
            url: "https://agent.example.com".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_classification_sets() {
        let config = ClassifyConfig::default();
        assert!(config
            .message_types
            .iter()
            .any(|t| t == "message.part.updated"));
        assert!(config.message_types.iter().any(|t| t == "message.updated"));
        assert!(config.internal_types.iter().any(|t| t == "session.idle"));
        assert!(config
            .internal_types
            .iter()
            .any(|t| t == "server.connected"));
        // The two sets never overlap
        for t in &config.message_types {
            assert!(!config.internal_types.contains(t), "{} in both sets", t);
        }
    }

    #[test]
    fn test_parse_classify_override() {
        let toml = r#"
[classify]
message_types = ["message.part"]
internal_types = ["session.idle", "custom.heartbeat"]
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.classify.message_types, vec!["message.part"]);
        assert_eq!(config.classify.internal_types.len(), 2);
        assert!(config
            .classify
            .internal_types
            .contains(&"custom.heartbeat".to_string()));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[server]\nurl = \"http://10.0.0.5:4096\"\n").unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.server.url, "http://10.0.0.5:4096");

        let missing = dir.path().join("nope.toml");
        assert!(Config::load_from(&missing).is_err());
    }
}
