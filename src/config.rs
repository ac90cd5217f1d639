//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and environment variable overrides.

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub streaming: StreamingConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP / WebSocket listener configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    // Subscribers are unauthenticated; stay on loopback unless told otherwise
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl ServerConfig {
    /// Create config with custom host and port
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Get the socket address string
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Streaming hub configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StreamingConfig {
    #[serde(default = "default_stats_interval")]
    pub stats_interval_secs: u64,

    #[serde(default = "default_send_timeout")]
    pub send_timeout_ms: u64,

    #[serde(default = "default_queue_capacity")]
    pub outbound_queue_capacity: usize,

    #[serde(default = "default_max_connections")]
    pub max_connections: usize,

    #[serde(default = "default_shutdown_grace")]
    pub shutdown_grace_ms: u64,
}

fn default_stats_interval() -> u64 {
    5
}

fn default_send_timeout() -> u64 {
    5000
}

fn default_queue_capacity() -> usize {
    256
}

fn default_max_connections() -> usize {
    1000
}

fn default_shutdown_grace() -> u64 {
    5000
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            stats_interval_secs: default_stats_interval(),
            send_timeout_ms: default_send_timeout(),
            outbound_queue_capacity: default_queue_capacity(),
            max_connections: default_max_connections(),
            shutdown_grace_ms: default_shutdown_grace(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,

    pub file: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            file: None,
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Self::parse(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            error: e,
        })
    }

    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> Result<Self, String> {
        toml::from_str(content).map_err(|e| e.to_string())
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from default locations or environment
    ///
    /// Logs where the configuration came from, so call this only after a
    /// tracing subscriber is installed. Use [`Config::discover`] otherwise.
    pub fn load_default() -> Self {
        let report = Self::discover();
        report.log();
        report.config
    }

    /// Search the default locations without logging anything
    pub fn discover() -> LoadReport {
        Self::load_first(&Self::default_paths(), |key| std::env::var(key).ok())
    }

    /// Candidate config files, in search order
    pub fn default_paths() -> Vec<PathBuf> {
        [
            dirs::config_dir().map(|p| p.join("errorcast").join("config.toml")),
            Some(PathBuf::from("/etc/errorcast/config.toml")),
            Some(PathBuf::from("./config.toml")),
        ]
        .into_iter()
        .flatten()
        .collect()
    }

    /// Load the first existing file in `paths` that parses
    ///
    /// Missing files are skipped silently; unreadable or invalid ones are
    /// recorded in the report. Falls back to defaults. `lookup` supplies
    /// overrides in both cases.
    pub fn load_first(
        paths: &[PathBuf],
        lookup: impl Fn(&str) -> Option<String>,
    ) -> LoadReport {
        let mut skipped = Vec::new();

        for path in paths.iter().filter(|p| p.exists()) {
            match Self::load(path) {
                Ok(mut config) => {
                    config.apply_overrides(&lookup);
                    return LoadReport {
                        config,
                        source: Some(path.clone()),
                        skipped,
                    };
                }
                Err(e) => skipped.push(e),
            }
        }

        let mut config = Config::default();
        config.apply_overrides(&lookup);
        LoadReport {
            config,
            source: None,
            skipped,
        }
    }

    /// Apply environment variable overrides to an existing config
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from any key lookup (environment in production)
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        // Server overrides
        if let Some(host) = lookup("ERRORCAST_HOST") {
            self.server.host = host;
        }
        if let Some(p) = lookup("ERRORCAST_PORT").and_then(|s| s.parse().ok()) {
            self.server.port = p;
        }

        // Streaming overrides
        if let Some(n) = lookup("ERRORCAST_STATS_INTERVAL_SECS").and_then(|s| s.parse().ok()) {
            self.streaming.stats_interval_secs = n;
        }
        if let Some(n) = lookup("ERRORCAST_SEND_TIMEOUT_MS").and_then(|s| s.parse().ok()) {
            self.streaming.send_timeout_ms = n;
        }
        if let Some(n) = lookup("ERRORCAST_QUEUE_CAPACITY").and_then(|s| s.parse().ok()) {
            self.streaming.outbound_queue_capacity = n;
        }
        if let Some(n) = lookup("ERRORCAST_MAX_CONNECTIONS").and_then(|s| s.parse().ok()) {
            self.streaming.max_connections = n;
        }
        if let Some(n) = lookup("ERRORCAST_SHUTDOWN_GRACE_MS").and_then(|s| s.parse().ok()) {
            self.streaming.shutdown_grace_ms = n;
        }

        // Logging overrides
        if let Some(level) = lookup("ERRORCAST_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = lookup("ERRORCAST_LOG_FORMAT") {
            self.logging.format = format;
        }
        if let Some(file) = lookup("ERRORCAST_LOG_FILE") {
            self.logging.file = Some(file);
        }
    }
}

/// Outcome of searching the default config locations
#[derive(Debug)]
pub struct LoadReport {
    /// Effective configuration, overrides applied
    pub config: Config,
    /// File the configuration was read from, `None` for defaults
    pub source: Option<PathBuf>,
    /// Files that existed but could not be loaded
    pub skipped: Vec<ConfigError>,
}

impl LoadReport {
    /// Emit what was loaded through the current tracing subscriber
    pub fn log(&self) {
        for error in &self.skipped {
            tracing::warn!("Skipping config: {}", error);
        }
        match &self.source {
            Some(path) => tracing::info!("Loaded config from {:?}", path),
            None => tracing::info!("Using default config with environment overrides"),
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# errorcast configuration
#
# Environment variables override these settings:
# - ERRORCAST_HOST
# - ERRORCAST_PORT
# - ERRORCAST_STATS_INTERVAL_SECS
# - ERRORCAST_SEND_TIMEOUT_MS
# - ERRORCAST_QUEUE_CAPACITY
# - ERRORCAST_MAX_CONNECTIONS
# - ERRORCAST_SHUTDOWN_GRACE_MS
# - ERRORCAST_LOG_LEVEL
# - ERRORCAST_LOG_FORMAT
# - ERRORCAST_LOG_FILE

[server]
# Listen address. Subscribers are not authenticated; keep this on loopback.
host = "127.0.0.1"

# HTTP + WebSocket port
port = 8080

[streaming]
# Seconds between streaming_stats broadcasts
stats_interval_secs = 5

# A WebSocket write slower than this closes the connection (ms)
send_timeout_ms = 5000

# Messages buffered per connection before it is considered too slow
outbound_queue_capacity = 256

# Maximum concurrent WebSocket connections
max_connections = 1000

# How long shutdown waits for connections to close (ms)
shutdown_grace_ms = 5000

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty (for development) or json (for production)
format = "pretty"

# Optional log file path
# file = "/var/log/errorcast/errorcast.log"
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.server.addr(), "127.0.0.1:8080");
        assert_eq!(config.streaming.stats_interval_secs, 5);
        assert_eq!(config.streaming.outbound_queue_capacity, 256);
        assert_eq!(config.logging.format, "pretty");
    }

    #[test]
    fn test_generated_config_parses_to_defaults() {
        let config = Config::parse(&generate_default_config()).unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.streaming.send_timeout_ms, 5000);
        assert_eq!(config.streaming.max_connections, 1000);
        assert!(config.logging.file.is_none());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[streaming]\nstats_interval_secs = 2").unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.streaming.stats_interval_secs, 2);
        assert_eq!(config.streaming.send_timeout_ms, 5000);
        assert_eq!(config.server.port, 8080);
    }

    #[test]
    fn test_load_missing_file() {
        let err = Config::load(Path::new("/nonexistent/errorcast.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_load_invalid_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[server\nport = ").unwrap();
        assert!(matches!(
            Config::load(file.path()),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = [
            ("ERRORCAST_PORT", "9100"),
            ("ERRORCAST_STATS_INTERVAL_SECS", "1"),
            ("ERRORCAST_QUEUE_CAPACITY", "not-a-number"),
            ("ERRORCAST_LOG_FORMAT", "json"),
            ("ERRORCAST_SHUTDOWN_GRACE_MS", "750"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_overrides(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.server.port, 9100);
        assert_eq!(config.streaming.stats_interval_secs, 1);
        assert_eq!(config.streaming.outbound_queue_capacity, 256);
        assert_eq!(config.logging.format, "json");
        assert_eq!(config.streaming.shutdown_grace_ms, 750);
    }

    #[test]
    fn test_generated_config_lists_every_override() {
        let content = generate_default_config();
        for key in [
            "ERRORCAST_SEND_TIMEOUT_MS",
            "ERRORCAST_MAX_CONNECTIONS",
            "ERRORCAST_SHUTDOWN_GRACE_MS",
        ] {
            assert!(content.contains(key), "{} missing from header", key);
        }
    }

    #[test]
    fn test_load_first_skips_missing_and_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.toml");
        let invalid = dir.path().join("invalid.toml");
        let valid = dir.path().join("valid.toml");
        std::fs::write(&invalid, "[server\nport = ").unwrap();
        std::fs::write(&valid, "[server]\nport = 9300").unwrap();

        let paths = vec![missing, invalid.clone(), valid.clone()];
        let report = Config::load_first(&paths, |key| {
            (key == "ERRORCAST_LOG_LEVEL").then(|| "debug".to_string())
        });

        assert_eq!(report.source.as_deref(), Some(valid.as_path()));
        assert_eq!(report.config.server.port, 9300);
        assert_eq!(report.config.logging.level, "debug");
        assert_eq!(report.skipped.len(), 1);
        assert!(matches!(
            &report.skipped[0],
            ConfigError::Parse { path, .. } if *path == invalid
        ));
    }

    #[test]
    fn test_load_first_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let paths = vec![dir.path().join("nothing-here.toml")];

        let report = Config::load_first(&paths, |key| {
            (key == "ERRORCAST_PORT").then(|| "9400".to_string())
        });

        assert!(report.source.is_none());
        assert!(report.skipped.is_empty());
        assert_eq!(report.config.server.port, 9400);
        assert_eq!(report.config.streaming.outbound_queue_capacity, 256);
    }
}
