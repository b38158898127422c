//! Configuration builders for tests.
//!
//! Use [`TestConfigBuilder`] to create customised [`AppConfig`] values without
//! repeating boilerplate across crate boundaries. Defaults to the simulated
//! backend so tests never touch real hardware.

use std::path::Path;

use gpiod_config::AppConfig;

/// Fluent builder for [`AppConfig`] in tests.
///
/// # Example
///
/// ```ignore
/// let config = TestConfigBuilder::new()
///     .socket_path(dir.path().join("gpiod.sock"))
///     .numbering("bcm")
///     .build();
/// ```
pub struct TestConfigBuilder {
    config: AppConfig,
}

impl TestConfigBuilder {
    pub fn new() -> Self {
        let mut config = AppConfig::default();
        config.gpio.backend = "simulated".to_string();
        Self { config }
    }

    pub fn socket_path(mut self, path: impl AsRef<Path>) -> Self {
        self.config.daemon.socket_path = path.as_ref().display().to_string();
        self
    }

    pub fn socket_mode(mut self, mode: u32) -> Self {
        self.config.daemon.socket_mode = mode;
        self
    }

    pub fn init_file(mut self, path: impl AsRef<Path>) -> Self {
        self.config.daemon.init_file = path.as_ref().display().to_string();
        self
    }

    pub fn numbering(mut self, numbering: &str) -> Self {
        self.config.gpio.numbering = numbering.to_string();
        self
    }

    pub fn build(self) -> AppConfig {
        self.config
    }
}

impl Default for TestConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
