//! # Configuration Management
//!
//! Wire constants and the client-side configuration for the ADB transport.
//!
//! ## Configuration Sources
//! - TOML files via `from_file()` / `from_toml()`
//! - Direct instantiation with defaults
//! - Environment overrides via `from_env()`
//!
//! The wire constants below are protocol-mandated and must not change:
//! devices compare them byte-for-byte.

use crate::error::{AdbError, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::Level;

/// Protocol version announced in our CNXN
pub const CONNECT_VERSION: u32 = 0x0100_0000;

/// Max payload we accept, announced in our CNXN
pub const CONNECT_MAXDATA: u32 = 1024 * 1024;

/// CNXN banner sent by the host
pub const CONNECT_PAYLOAD: &[u8] = b"host::\0";

/// Default adb daemon port
pub const DEFAULT_ADB_PORT: u16 = 5555;

/// Default timeout for establishing the TCP connection
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Main configuration structure
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct AdbConfig {
    /// Transport target and timeouts
    #[serde(default)]
    pub client: ClientConfig,

    /// Key material used to answer AUTH challenges
    #[serde(default)]
    pub auth: AuthConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AdbConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = File::open(path)
            .map_err(|e| AdbError::ConfigError(format!("Failed to open config file: {e}")))?;

        let mut contents = String::new();
        file.read_to_string(&mut contents)
            .map_err(|e| AdbError::ConfigError(format!("Failed to read config file: {e}")))?;

        Self::from_toml(&contents)
    }

    /// Load configuration from TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str::<Self>(content)
            .map_err(|e| AdbError::ConfigError(format!("Failed to parse TOML: {e}")))
    }

    /// Defaults overridden by `ADB_TRANSPORT_*` environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(addr) = std::env::var("ADB_TRANSPORT_ADDRESS") {
            config.client.address = addr;
        }

        if let Ok(timeout) = std::env::var("ADB_TRANSPORT_CONNECT_TIMEOUT_MS") {
            if let Ok(val) = timeout.parse::<u64>() {
                config.client.connect_timeout = Duration::from_millis(val);
            }
        }

        if let Ok(timeout) = std::env::var("ADB_TRANSPORT_SOCKET_TIMEOUT_MS") {
            if let Ok(val) = timeout.parse::<u64>() {
                config.client.socket_timeout = Duration::from_millis(val);
            }
        }

        if let Ok(path) = std::env::var("ADB_TRANSPORT_PRIVATE_KEY") {
            config.auth.private_key_path = Some(path);
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

    /// Save configuration to a file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| AdbError::ConfigError(format!("Failed to serialize config: {e}")))?;

        std::fs::write(path, content)
            .map_err(|e| AdbError::ConfigError(format!("Failed to write config file: {e}")))?;

        Ok(())
    }

    /// Validate the configuration. Empty list means valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        errors.extend(self.client.validate());
        errors.extend(self.auth.validate());
        errors.extend(self.logging.validate());
        errors
    }

    /// Validate and return Result - convenience method
    pub fn validate_strict(&self) -> Result<()> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(AdbError::ConfigError(format!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            )))
        }
    }
}

/// Client-side transport configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ClientConfig {
    /// Device address (e.g., "127.0.0.1:5555")
    pub address: String,

    /// Timeout for the TCP connect; zero means block indefinitely
    #[serde(with = "duration_serde")]
    pub connect_timeout: Duration,

    /// Read/write timeout applied to the socket; zero disables it
    #[serde(with = "duration_serde")]
    pub socket_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            address: format!("127.0.0.1:{DEFAULT_ADB_PORT}"),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            socket_timeout: Duration::ZERO,
        }
    }
}

impl ClientConfig {
    /// Config targeting `address` with default timeouts
    pub fn for_address(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            ..Self::default()
        }
    }

    /// Validate client configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.address.is_empty() {
            errors.push("Client address cannot be empty".to_string());
        } else if !self.address.contains(':') {
            errors.push(format!(
                "Invalid client address format: '{}' (expected format: 'host:5555')",
                self.address
            ));
        }

        if !self.connect_timeout.is_zero() && self.connect_timeout.as_millis() < 100 {
            errors.push("Connect timeout too short (minimum: 100ms)".to_string());
        }

        if !self.socket_timeout.is_zero() && self.socket_timeout.as_millis() < 10 {
            errors.push("Socket timeout too short (minimum: 10ms)".to_string());
        }

        errors
    }
}

/// Key material configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthConfig {
    /// PEM private key; `None` uses `$HOME/.android/adbkey`
    pub private_key_path: Option<String>,

    /// Device-format public key; `None` uses `<private_key_path>.pub`
    pub public_key_path: Option<String>,

    /// Create a fresh key pair when the private key does not exist
    pub generate_if_missing: bool,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            private_key_path: None,
            public_key_path: None,
            generate_if_missing: true,
        }
    }
}

impl AuthConfig {
    /// Resolved private key location
    pub fn private_key_file(&self) -> Result<PathBuf> {
        match &self.private_key_path {
            Some(path) => Ok(PathBuf::from(path)),
            None => default_key_dir().map(|dir| dir.join("adbkey")),
        }
    }

    /// Resolved public key location
    pub fn public_key_file(&self) -> Result<PathBuf> {
        match &self.public_key_path {
            Some(path) => Ok(PathBuf::from(path)),
            None => {
                let private = self.private_key_file()?;
                let mut name = private.into_os_string();
                name.push(".pub");
                Ok(PathBuf::from(name))
            }
        }
    }

    /// Validate auth configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if let Some(path) = &self.private_key_path {
            if path.is_empty() {
                errors.push("private_key_path cannot be empty when set".to_string());
            }
        }

        if let (Some(private), Some(public)) = (&self.private_key_path, &self.public_key_path) {
            if private == public {
                errors.push("Private and public key paths must differ".to_string());
            }
        }

        errors
    }
}

fn default_key_dir() -> Result<PathBuf> {
    std::env::var_os("HOME")
        .map(|home| PathBuf::from(home).join(".android"))
        .ok_or_else(|| AdbError::ConfigError("HOME is not set".to_string()))
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
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
            app_name: String::from("adb-transport"),
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

/// Helper module for Duration serialization/deserialization
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let millis = duration.as_millis() as u64;
        millis.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
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
