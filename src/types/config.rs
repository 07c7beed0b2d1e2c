//! Configuration structures.
//!
//! Configuration is loaded from environment variables with serde-friendly
//! structs so a config file can be layered in later.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Global server configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,

    /// Catalog configuration.
    #[serde(default)]
    pub catalog: CatalogConfig,

    /// IPC transport configuration.
    #[serde(default)]
    pub ipc: IpcConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// IPC server bind address (TCP).
    pub listen_addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:7410".to_string(),
        }
    }
}

/// Which validation backend handles parameter checking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ValidationBackend {
    /// Declarative parameter-type validator (precise error locality).
    #[default]
    Declarative,
    /// Generic JSON Schema validator (broad interoperability).
    Schema,
}

/// Catalog engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Directory holding one JSON document per entry plus the usage snapshot.
    pub store_dir: PathBuf,

    /// Process-wide switch gating all catalog writes.
    pub mutation_enabled: bool,

    /// Validation backend selected for the whole process.
    pub validation_backend: ValidationBackend,

    /// Max usage increments per id per one-second bucket.
    pub usage_rate_limit: u32,

    /// Debounce interval for the usage snapshot flush.
    #[serde(with = "humantime_serde")]
    pub usage_flush_interval: Duration,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            store_dir: PathBuf::from("./catalog"),
            mutation_enabled: true,
            validation_backend: ValidationBackend::Declarative,
            usage_rate_limit: 10,
            usage_flush_interval: Duration::from_millis(500),
        }
    }
}

/// IPC transport configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IpcConfig {
    /// Maximum frame payload size in bytes.
    pub max_frame_bytes: u32,

    /// Maximum concurrent TCP connections. Connections beyond this limit
    /// are rejected (backpressure via semaphore).
    pub max_connections: usize,

    /// Read timeout in seconds per frame. Connections idle beyond this
    /// duration are dropped (prevents slowloris-style resource exhaustion).
    pub read_timeout_secs: u64,

    /// Write timeout in seconds per frame. Slow consumers that cannot
    /// accept a response within this window are dropped.
    pub write_timeout_secs: u64,
}

impl Default for IpcConfig {
    fn default() -> Self {
        Self {
            max_frame_bytes: 5 * 1024 * 1024,
            max_connections: 1000,
            read_timeout_secs: 30,
            write_timeout_secs: 10,
        }
    }
}

impl Config {
    /// Build a config from environment variables, falling back to defaults.
    ///
    /// Recognized variables:
    /// - `CURATOR_LISTEN_ADDR`
    /// - `CURATOR_STORE_DIR`
    /// - `CURATOR_MUTATION_ENABLED` (`true`/`false`/`1`/`0`)
    /// - `CURATOR_VALIDATION_BACKEND` (`declarative`/`schema`)
    pub fn from_env() -> Self {
        let mut config = Config::default();

        if let Ok(addr) = std::env::var("CURATOR_LISTEN_ADDR") {
            config.server.listen_addr = addr;
        }
        if let Ok(dir) = std::env::var("CURATOR_STORE_DIR") {
            config.catalog.store_dir = PathBuf::from(dir);
        }
        if let Ok(flag) = std::env::var("CURATOR_MUTATION_ENABLED") {
            config.catalog.mutation_enabled = parse_bool(&flag, config.catalog.mutation_enabled);
        }
        if let Ok(backend) = std::env::var("CURATOR_VALIDATION_BACKEND") {
            config.catalog.validation_backend = match backend.to_ascii_lowercase().as_str() {
                "schema" => ValidationBackend::Schema,
                "declarative" => ValidationBackend::Declarative,
                other => {
                    tracing::warn!("Unknown validation backend '{}', using declarative", other);
                    ValidationBackend::Declarative
                }
            };
        }

        config
    }
}

fn parse_bool(s: &str, default: bool) -> bool {
    match s.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => true,
        "0" | "false" | "no" | "off" => false,
        _ => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = Config::default();
        assert!(config.catalog.mutation_enabled);
        assert_eq!(config.catalog.usage_rate_limit, 10);
        assert_eq!(
            config.catalog.validation_backend,
            ValidationBackend::Declarative
        );
        assert_eq!(config.ipc.max_frame_bytes, 5 * 1024 * 1024);
    }

    #[test]
    fn parse_bool_accepts_common_spellings() {
        assert!(parse_bool("true", false));
        assert!(parse_bool("1", false));
        assert!(!parse_bool("off", true));
        assert!(parse_bool("garbage", true));
    }

    #[test]
    fn config_round_trips_through_serde() {
        let config = Config::default();
        let json = serde_json::to_string(&config).unwrap();
        let back: Config = serde_json::from_str(&json).unwrap();
        assert_eq!(back.server.listen_addr, config.server.listen_addr);
        assert_eq!(back.catalog.usage_flush_interval, config.catalog.usage_flush_interval);
    }
}
