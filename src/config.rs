//! # Configuration Management
//!
//! Centralized configuration for the handshake server.
//!
//! ## Configuration Sources
//! - TOML files via `from_file()`
//! - Direct instantiation with defaults
//! - Environment-specific overrides via `from_env()`
//!
//! ## Protocol Limits
//! The configurable MTU range must stay inside the hard protocol bounds
//! [`MINIMUM_MTU_SIZE`, `MAXIMUM_MTU_SIZE`]; narrower ranges are allowed.

use crate::error::{ProtocolError, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::net::SocketAddr;
use std::path::Path;
use tracing::Level;

/// RakNet protocol version spoken by current Bedrock peers
pub const RAKNET_PROTOCOL_VERSION: u8 = 11;

/// Smallest MTU a session may negotiate
pub const MINIMUM_MTU_SIZE: u16 = 576;

/// Largest MTU a session may negotiate
pub const MAXIMUM_MTU_SIZE: u16 = 1400;

/// Top-level configuration
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct HandshakeConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl HandshakeConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = File::open(path)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to open config file: {e}")))?;

        let mut contents = String::new();
        file.read_to_string(&mut contents)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to read config file: {e}")))?;

        Self::from_toml(&contents)
    }

    /// Load configuration from TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str::<Self>(content)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to parse TOML: {e}")))
    }

    /// Load configuration from environment variables on top of the defaults
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(guid) = std::env::var("RAKNET_SERVER_GUID") {
            let guid = guid.parse::<u64>().map_err(|e| {
                ProtocolError::ConfigError(format!("Invalid RAKNET_SERVER_GUID: {e}"))
            })?;
            config.server.guid = Some(guid);
        }

        if let Ok(mtu) = std::env::var("RAKNET_MINIMUM_MTU") {
            if let Ok(val) = mtu.parse::<u16>() {
                config.server.minimum_mtu = val;
            }
        }

        if let Ok(mtu) = std::env::var("RAKNET_MAXIMUM_MTU") {
            if let Ok(val) = mtu.parse::<u16>() {
                config.server.maximum_mtu = val;
            }
        }

        if let Ok(version) = std::env::var("RAKNET_PROTOCOL_VERSION") {
            if let Ok(val) = version.parse::<u8>() {
                config.server.protocol_version = val;
            }
        }

        Ok(config)
    }

    /// Apply overrides to the default configuration
    pub fn default_with_overrides<F>(mutator: F) -> Self
    where
        F: FnOnce(&mut Self),
    {
        let mut config = Self::default();
        mutator(&mut config);
        config
    }

    /// Generate example configuration file content
    pub fn example_config() -> String {
        toml::to_string_pretty(&Self::default())
            .unwrap_or_else(|_| String::from("# Failed to generate example config"))
    }

    /// Validate the configuration for common issues and misconfigurations
    ///
    /// Returns a list of validation errors. Empty list means configuration is valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        errors.extend(self.server.validate());
        errors.extend(self.logging.validate());
        errors
    }

    /// Validate and return Result - convenience method
    pub fn validate_strict(&self) -> Result<()> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ProtocolError::ConfigError(format!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            )))
        }
    }
}

/// Server-specific configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Fixed server GUID; a random one is generated at startup when unset
    pub guid: Option<u64>,

    /// RakNet protocol version accepted in OPEN_CONNECTION_REQUEST_1
    pub protocol_version: u8,

    /// Lower clamp bound for negotiated MTU
    pub minimum_mtu: u16,

    /// Upper clamp bound for negotiated MTU
    pub maximum_mtu: u16,

    /// Addresses advertised to IPv4 peers in CONNECTION_REQUEST_ACCEPTED
    pub local_addresses_v4: Vec<SocketAddr>,

    /// Addresses advertised to IPv6 peers in CONNECTION_REQUEST_ACCEPTED
    pub local_addresses_v6: Vec<SocketAddr>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            guid: None,
            protocol_version: RAKNET_PROTOCOL_VERSION,
            minimum_mtu: MINIMUM_MTU_SIZE,
            maximum_mtu: MAXIMUM_MTU_SIZE,
            local_addresses_v4: vec![SocketAddr::from(([127, 0, 0, 1], 19132))],
            local_addresses_v6: vec![SocketAddr::from((
                [0u16, 0, 0, 0, 0, 0, 0, 1],
                19133,
            ))],
        }
    }
}

impl ServerConfig {
    /// Validate server configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.minimum_mtu < MINIMUM_MTU_SIZE {
            errors.push(format!(
                "Minimum MTU too small: {} (protocol minimum: {MINIMUM_MTU_SIZE})",
                self.minimum_mtu
            ));
        }

        if self.maximum_mtu > MAXIMUM_MTU_SIZE {
            errors.push(format!(
                "Maximum MTU too large: {} (protocol maximum: {MAXIMUM_MTU_SIZE})",
                self.maximum_mtu
            ));
        }

        if self.minimum_mtu > self.maximum_mtu {
            errors.push(format!(
                "Minimum MTU {} exceeds maximum MTU {}",
                self.minimum_mtu, self.maximum_mtu
            ));
        }

        if self.protocol_version == 0 {
            errors.push("Protocol version must be greater than 0".to_string());
        }

        if self.local_addresses_v4.iter().any(SocketAddr::is_ipv6) {
            errors.push("local_addresses_v4 contains an IPv6 address".to_string());
        }

        if self.local_addresses_v6.iter().any(SocketAddr::is_ipv4) {
            errors.push("local_addresses_v6 contains an IPv4 address".to_string());
        }

        errors
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Application name for logs
    pub app_name: String,

    /// Log level
    #[serde(with = "log_level_serde")]
    pub log_level: Level,

    /// Whether to use JSON formatting for logs
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            app_name: String::from("raknet-handshake"),
            log_level: Level::INFO,
            json_format: false,
        }
    }
}

impl LoggingConfig {
    /// Validate logging configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.app_name.is_empty() {
            errors.push("Application name cannot be empty".to_string());
        } else if self.app_name.len() > 64 {
            errors.push(format!(
                "Application name too long: {} characters (maximum: 64)",
                self.app_name.len()
            ));
        }

        errors
    }
}

/// Helper module for tracing::Level serialization/deserialization
mod log_level_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::str::FromStr;
    use tracing::Level;

    pub fn serialize<S>(level: &Level, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let level_str = match *level {
            Level::TRACE => "trace",
            Level::DEBUG => "debug",
            Level::INFO => "info",
            Level::WARN => "warn",
            Level::ERROR => "error",
        };
        level_str.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Level, D::Error>
    where
        D: Deserializer<'de>,
    {
        let level_str = String::deserialize(deserializer)?;
        Level::from_str(&level_str)
            .map_err(|_| serde::de::Error::custom(format!("Invalid log level: {level_str}")))
    }
}
