#![deny(unsafe_code)]

//! Configuration loading and validation for gpiod.
//!
//! Loads TOML configuration files and validates them. Provides the
//! [`AppConfig`] type as the central configuration structure shared by the
//! daemon and the command-line front end.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Default location of the daemon configuration file.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/gpiod.toml";

/// Errors that can occur during configuration loading and validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("validation error: {0}")]
    Validation(String),
}

/// Top-level application configuration.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Socket and startup configuration.
    #[serde(default)]
    pub daemon: DaemonConfig,

    /// Pin backend configuration.
    #[serde(default)]
    pub gpio: GpioConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Configuration for the socket server and startup sequence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Filesystem path of the Unix socket clients connect to.
    #[serde(default = "default_socket_path")]
    pub socket_path: String,

    /// Permission bits applied to the socket file after binding.
    ///
    /// The socket is the only trust boundary, so the default grants
    /// read/write to owner, group, and everyone.
    #[serde(default = "default_socket_mode")]
    pub socket_mode: u32,

    /// Listen backlog. Only one client is served at a time; further
    /// connection attempts queue here.
    #[serde(default = "default_listen_backlog")]
    pub listen_backlog: u32,

    /// Command file replayed once at startup, before the socket opens.
    #[serde(default = "default_init_file")]
    pub init_file: String,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            socket_path: default_socket_path(),
            socket_mode: default_socket_mode(),
            listen_backlog: default_listen_backlog(),
            init_file: default_init_file(),
        }
    }
}

fn default_socket_path() -> String {
    "/var/run/gpiod.sock".to_string()
}

fn default_socket_mode() -> u32 {
    0o666
}

fn default_listen_backlog() -> u32 {
    1
}

fn default_init_file() -> String {
    "/etc/gpiod.cfg".to_string()
}

/// Pin backend configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GpioConfig {
    /// Pin backend: "sysfs" or "simulated".
    #[serde(default = "default_gpio_backend")]
    pub backend: String,

    /// How pin numbers in commands are interpreted: "board" (physical
    /// header position) or "bcm" (SoC channel number).
    #[serde(default = "default_gpio_numbering")]
    pub numbering: String,

    /// Root of the sysfs GPIO tree.
    #[serde(default = "default_sysfs_root")]
    pub sysfs_root: String,
}

impl Default for GpioConfig {
    fn default() -> Self {
        Self {
            backend: default_gpio_backend(),
            numbering: default_gpio_numbering(),
            sysfs_root: default_sysfs_root(),
        }
    }
}

fn default_gpio_backend() -> String {
    "sysfs".to_string()
}

fn default_gpio_numbering() -> String {
    "board".to_string()
}

fn default_sysfs_root() -> String {
    "/sys/class/gpio".to_string()
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g. "info", "debug", "trace").
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Accepted values for `gpio.backend`.
pub const VALID_BACKENDS: [&str; 2] = ["sysfs", "simulated"];

/// Accepted values for `gpio.numbering`.
pub const VALID_NUMBERINGS: [&str; 2] = ["board", "bcm"];

impl AppConfig {
    /// Load and validate configuration from a TOML file.
    pub async fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = tokio::fs::read_to_string(path).await?;
        Self::parse(&content)
    }

    /// Load configuration from `path`, falling back to defaults when the
    /// file does not exist.
    pub async fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        match Self::load(path).await {
            Err(ConfigError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "Config file not found, using defaults");
                Ok(Self::default())
            }
            other => other,
        }
    }

    /// Parse and validate configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.daemon.socket_path.is_empty() {
            return Err(ConfigError::Validation(
                "daemon.socket_path must not be empty".to_string(),
            ));
        }
        if self.daemon.socket_mode > 0o777 {
            return Err(ConfigError::Validation(format!(
                "daemon.socket_mode must be at most 0o777, got {:#o}",
                self.daemon.socket_mode
            )));
        }
        if self.daemon.listen_backlog == 0 {
            return Err(ConfigError::Validation(
                "daemon.listen_backlog must be at least 1".to_string(),
            ));
        }

        if !VALID_BACKENDS.contains(&self.gpio.backend.as_str()) {
            return Err(ConfigError::Validation(format!(
                "gpio.backend must be one of {:?}, got {:?}",
                VALID_BACKENDS, self.gpio.backend
            )));
        }
        if !VALID_NUMBERINGS.contains(&self.gpio.numbering.as_str()) {
            return Err(ConfigError::Validation(format!(
                "gpio.numbering must be one of {:?}, got {:?}",
                VALID_NUMBERINGS, self.gpio.numbering
            )));
        }
        if self.gpio.backend == "sysfs" && self.gpio.sysfs_root.is_empty() {
            return Err(ConfigError::Validation(
                "gpio.sysfs_root must not be empty for the sysfs backend".to_string(),
            ));
        }

        Ok(())
    }
}
