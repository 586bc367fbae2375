//! Server configuration, loaded from `insights.yml`

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Default configuration file name
pub const DEFAULT_CONFIG_PATH: &str = "insights.yml";

/// Complete server configuration - can be loaded from YAML
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// HTTP listener and query limits
    pub server: ServerSettings,
    /// Where the insight collection lives
    pub database: DatabaseSettings,
    /// Logging configuration
    pub logging: LoggingSettings,
}

/// Server network settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Bind host
    pub host: String,
    /// Bind port
    pub port: u16,
    /// Request timeout in seconds
    pub request_timeout_secs: u64,
    /// Query execution timeout in seconds
    pub query_timeout_secs: u64,
    /// Maximum number of concurrent queries
    pub max_concurrent_queries: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            request_timeout_secs: 30,
            query_timeout_secs: 10,
            max_concurrent_queries: 64,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    /// Connection string, `file://<path>` or a bare path to a JSON/JSONL file
    pub uri: String,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            uri: "file://data/insights.json".to_string(),
        }
    }
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Log level: "trace", "debug", "info", "warn", "error".
    /// `RUST_LOG` wins when set.
    pub level: String,
    /// Include target in logs
    pub show_target: bool,
    /// Include thread IDs in logs
    pub show_thread_ids: bool,
    /// Include file and line numbers
    pub show_location: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            show_target: true,
            show_thread_ids: false,
            show_location: false,
        }
    }
}

impl ServerConfig {
    /// Load configuration from a YAML file
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: ServerConfig = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Write default config to a file
    pub fn write_default(path: impl AsRef<Path>) -> anyhow::Result<()> {
        let yaml = serde_yaml::to_string(&Self::default())?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    /// Normalized log level directive for the env filter
    pub fn log_level(&self) -> &'static str {
        match self.logging.level.to_lowercase().as_str() {
            "trace" => "trace",
            "debug" => "debug",
            "warn" => "warn",
            "error" => "error",
            _ => "info",
        }
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.server.query_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.database.uri, "file://data/insights.json");
        assert_eq!(config.log_level(), "info");
        assert_eq!(config.query_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            "server:\n  port: 9100\ndatabase:\n  uri: /srv/insights.jsonl\nlogging:\n  level: DEBUG"
        )
        .unwrap();

        let config = ServerConfig::from_file(file.path()).unwrap();
        assert_eq!(config.server.port, 9100);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.request_timeout_secs, 30);
        assert_eq!(config.database.uri, "/srv/insights.jsonl");
        assert_eq!(config.log_level(), "debug");
        assert!(config.logging.show_target);
    }

    #[test]
    fn test_write_default_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEFAULT_CONFIG_PATH);
        ServerConfig::write_default(&path).unwrap();

        let config = ServerConfig::from_file(&path).unwrap();
        assert_eq!(config.server.port, ServerConfig::default().server.port);
        assert_eq!(config.database.uri, ServerConfig::default().database.uri);
    }

    #[test]
    fn test_invalid_yaml_is_error() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "server: [not, a, map").unwrap();
        assert!(ServerConfig::from_file(file.path()).is_err());
    }

    #[test]
    fn test_unknown_level_falls_back_to_info() {
        let mut config = ServerConfig::default();
        config.logging.level = "verbose".to_string();
        assert_eq!(config.log_level(), "info");
    }
}
