//! Server configuration.
//!
//! Configuration is loaded in the following order (later overrides earlier):
//! 1. Default values
//! 2. YAML config file (if specified via ARROWGATE_CONFIG)
//! 3. Environment variables

use arrowgate_core::{Compression, SerializationOptions};
use arrowgate_protocol::DEFAULT_MAX_LINE_BYTES;
use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable naming the YAML config file.
pub const CONFIG_ENV: &str = "ARROWGATE_CONFIG";

/// Server configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Network configuration.
    pub network: NetworkConfig,
    /// Serialization options used for every frame.
    pub serialization: SerializationOptions,
    /// Served table configuration.
    pub table: TableConfig,
    /// Metrics configuration.
    pub metrics: MetricsConfig,
}

impl Config {
    /// Loads configuration from file, then applies environment variable overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(path) = std::env::var(CONFIG_ENV) {
            config = Self::from_file(&path)?;
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(path.to_path_buf(), e))?;
        let config: Config = serde_yaml::from_str(&content)
            .map_err(|e| ConfigError::ParseError(path.to_path_buf(), e.to_string()))?;
        Ok(config)
    }

    /// Loads configuration from environment variables only.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env_overrides();
        config
    }

    fn apply_env_overrides(&mut self) {
        self.network.apply_env_overrides();
        apply_serialization_overrides(&mut self.serialization);
        self.table.apply_env_overrides();
        self.metrics.apply_env_overrides();
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.serialization
            .validate()
            .map_err(|e| ConfigError::ValidationError(e.to_string()))?;

        if self.network.max_line_bytes == 0 {
            return Err(ConfigError::ValidationError(
                "network.max_line_bytes must be greater than zero".to_string(),
            ));
        }
        if self.network.max_connections == 0 {
            return Err(ConfigError::ValidationError(
                "network.max_connections must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }

    /// Saves configuration to a YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let content = serde_yaml::to_string(self)
            .map_err(|e| ConfigError::ParseError(path.to_path_buf(), e.to_string()))?;
        std::fs::write(path, content).map_err(|e| ConfigError::IoError(path.to_path_buf(), e))?;
        Ok(())
    }
}

fn apply_serialization_overrides(options: &mut SerializationOptions) {
    if let Ok(size) = std::env::var("ARROWGATE_BATCH_SIZE") {
        if let Ok(n) = size.parse() {
            options.batch_size = n;
        }
    }

    if let Ok(codec) = std::env::var("ARROWGATE_COMPRESSION") {
        match codec.parse::<Compression>() {
            Ok(c) => options.compression = c,
            Err(e) => tracing::warn!("Ignoring ARROWGATE_COMPRESSION: {}", e),
        }
    }
}

/// Network configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Address to bind to.
    #[serde(with = "socket_addr_serde")]
    pub bind_addr: SocketAddr,
    /// Idle connection timeout in seconds.
    pub idle_timeout_secs: u64,
    /// Maximum concurrent connections.
    pub max_connections: usize,
    /// Maximum length of one inbound line in bytes.
    pub max_line_bytes: usize,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from((Ipv4Addr::LOCALHOST, arrowgate_protocol::DEFAULT_PORT)),
            idle_timeout_secs: 300,
            max_connections: 1000,
            max_line_bytes: DEFAULT_MAX_LINE_BYTES,
        }
    }
}

impl NetworkConfig {
    fn apply_env_overrides(&mut self) {
        if let Ok(addr) = std::env::var("ARROWGATE_BIND") {
            if let Ok(parsed) = addr.parse() {
                self.bind_addr = parsed;
            }
        }

        if let Ok(timeout) = std::env::var("ARROWGATE_IDLE_TIMEOUT") {
            if let Ok(secs) = timeout.parse() {
                self.idle_timeout_secs = secs;
            }
        }

        if let Ok(max) = std::env::var("ARROWGATE_MAX_CONNECTIONS") {
            if let Ok(n) = max.parse() {
                self.max_connections = n;
            }
        }

        if let Ok(max) = std::env::var("ARROWGATE_MAX_LINE_BYTES") {
            if let Ok(n) = max.parse() {
                self.max_line_bytes = n;
            }
        }
    }

    /// Returns idle timeout as Duration.
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }
}

/// Served table configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TableConfig {
    /// Rows in the generated sample table.
    pub sample_rows: usize,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self { sample_rows: 1000 }
    }
}

impl TableConfig {
    fn apply_env_overrides(&mut self) {
        if let Ok(rows) = std::env::var("ARROWGATE_SAMPLE_ROWS") {
            if let Ok(n) = rows.parse() {
                self.sample_rows = n;
            }
        }
    }
}

/// Metrics configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Enable metrics HTTP server.
    pub enabled: bool,
    /// Address to bind the metrics server to.
    #[serde(with = "socket_addr_serde")]
    pub bind_addr: SocketAddr,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            bind_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, 9090)),
        }
    }
}

impl MetricsConfig {
    fn apply_env_overrides(&mut self) {
        if let Ok(enabled) = std::env::var("ARROWGATE_METRICS_ENABLED") {
            self.enabled = enabled == "1" || enabled.to_lowercase() == "true";
        }
        if let Ok(addr) = std::env::var("ARROWGATE_METRICS_BIND") {
            if let Ok(parsed) = addr.parse() {
                self.bind_addr = parsed;
            }
        }
    }
}

/// Configuration error.
#[derive(Debug)]
pub enum ConfigError {
    IoError(PathBuf, std::io::Error),
    ParseError(PathBuf, String),
    ValidationError(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(path, e) => {
                write!(f, "failed to read config file '{}': {}", path.display(), e)
            }
            ConfigError::ParseError(path, e) => {
                write!(f, "failed to parse config file '{}': {}", path.display(), e)
            }
            ConfigError::ValidationError(msg) => {
                write!(f, "configuration validation failed: {}", msg)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Custom serde module for SocketAddr (to handle as string in YAML).
mod socket_addr_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::net::SocketAddr;

    pub fn serialize<S>(addr: &SocketAddr, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&addr.to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<SocketAddr, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.network.bind_addr.to_string(), "127.0.0.1:5001");
        assert_eq!(config.network.idle_timeout(), Duration::from_secs(300));
        assert_eq!(config.network.max_line_bytes, 1024 * 1024);
        assert_eq!(config.serialization.batch_size, 65_536);
        assert_eq!(config.serialization.compression, Compression::Uncompressed);
        assert_eq!(config.table.sample_rows, 1000);
        assert!(!config.metrics.enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_yaml_roundtrip() {
        let config = Config::default();
        let yaml = serde_yaml::to_string(&config).unwrap();
        let parsed: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed.network.bind_addr, config.network.bind_addr);
        assert_eq!(parsed.serialization, config.serialization);
    }

    #[test]
    fn test_from_file_partial() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            "network:\n  bind_addr: \"0.0.0.0:6000\"\nserialization:\n  compression: ZSTD\n  batch_size: 512\ntable:\n  sample_rows: 42"
        )
        .unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.network.bind_addr.port(), 6000);
        assert_eq!(config.network.max_connections, 1000);
        assert_eq!(config.serialization.compression, Compression::Zstd);
        assert_eq!(config.serialization.batch_size, 512);
        assert_eq!(config.table.sample_rows, 42);
    }

    #[test]
    fn test_from_file_rejects_unknown_serialization_key() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "serialization:\n  codec: ZSTD").unwrap();

        let result = Config::from_file(file.path());
        assert!(matches!(result, Err(ConfigError::ParseError(_, _))));
    }

    #[test]
    fn test_from_file_missing() {
        let result = Config::from_file("/nonexistent/arrowgate.yaml");
        assert!(matches!(result, Err(ConfigError::IoError(_, _))));
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("arrowgate.yaml");

        let mut config = Config::default();
        config.metrics.enabled = true;
        config.serialization.compression = Compression::Lz4;
        config.save(&path).unwrap();

        let loaded = Config::from_file(&path).unwrap();
        assert!(loaded.metrics.enabled);
        assert_eq!(loaded.serialization.compression, Compression::Lz4);
    }

    #[test]
    fn test_validation() {
        let mut config = Config::default();
        config.serialization.batch_size = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError(_))
        ));

        let mut config = Config::default();
        config.network.max_line_bytes = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_reports_invalid_env_override() {
        // The only test touching the environment
        std::env::remove_var(CONFIG_ENV);
        std::env::set_var("ARROWGATE_MAX_CONNECTIONS", "0");
        let result = Config::load();
        std::env::remove_var("ARROWGATE_MAX_CONNECTIONS");

        assert!(matches!(
            result,
            Err(ConfigError::ValidationError(msg)) if msg.contains("max_connections")
        ));
        assert!(Config::load().is_ok());
    }
}
