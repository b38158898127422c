//! Daemon test helpers.
//!
//! [`TestDaemon`] runs a [`Daemon`] on a background task with its socket and
//! init file inside a temporary directory.

use std::path::PathBuf;
use std::time::Duration;

use gpiod_config::AppConfig;
use gpiod_core::ipc::GpioClient;
use gpiod_core::pin::PinController;
use gpiod_core::{Daemon, DaemonError, ShutdownHandle};
use tempfile::TempDir;
use tokio::task::JoinHandle;

use crate::config::TestConfigBuilder;

/// How long to wait for the socket to appear.
const STARTUP_TIMEOUT: Duration = Duration::from_secs(5);

/// A running daemon with an owned temp directory.
///
/// The temp directory is deleted automatically when this value is dropped,
/// guaranteeing cleanup even on panic.
pub struct TestDaemon {
    pub socket_path: PathBuf,
    pub init_file: PathBuf,
    shutdown: ShutdownHandle,
    task: JoinHandle<Result<(), DaemonError>>,
    _temp_dir: TempDir,
}

impl TestDaemon {
    /// Start a daemon around `controller` with no init file.
    pub async fn start(controller: impl PinController + 'static) -> Self {
        Self::start_with_init(controller, None).await
    }

    /// Start a daemon, writing `init` to its init file first.
    pub async fn start_with_init(
        controller: impl PinController + 'static,
        init: Option<&str>,
    ) -> Self {
        Self::start_with_config(controller, TestConfigBuilder::new(), init).await
    }

    /// Start a daemon from `builder`. The socket and init file paths are
    /// always placed in the daemon's temp directory.
    pub async fn start_with_config(
        controller: impl PinController + 'static,
        builder: TestConfigBuilder,
        init: Option<&str>,
    ) -> Self {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let socket_path = temp_dir.path().join("gpiod.sock");
        let init_file = temp_dir.path().join("gpiod.cfg");

        if let Some(contents) = init {
            tokio::fs::write(&init_file, contents)
                .await
                .expect("failed to write init file");
        }

        let config = builder
            .socket_path(&socket_path)
            .init_file(&init_file)
            .build();

        Self::spawn(config, Box::new(controller), temp_dir).await
    }

    async fn spawn(
        config: AppConfig,
        controller: Box<dyn PinController>,
        temp_dir: TempDir,
    ) -> Self {
        let socket_path = PathBuf::from(&config.daemon.socket_path);
        let init_file = PathBuf::from(&config.daemon.init_file);

        let mut daemon = Daemon::with_controller(config, controller);
        let shutdown = daemon.shutdown_handle();
        let task = tokio::spawn(async move { daemon.run().await });

        let deadline = tokio::time::Instant::now() + STARTUP_TIMEOUT;
        while !socket_path.exists() {
            assert!(
                !task.is_finished(),
                "daemon exited before binding its socket"
            );
            assert!(
                tokio::time::Instant::now() < deadline,
                "daemon socket never appeared at {}",
                socket_path.display()
            );
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        Self {
            socket_path,
            init_file,
            shutdown,
            task,
            _temp_dir: temp_dir,
        }
    }

    /// A client pointed at this daemon's socket.
    pub fn client(&self) -> GpioClient {
        GpioClient::new(&self.socket_path)
    }

    /// Whether the daemon task has already exited.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Ask the daemon to shut down without waiting.
    pub fn request_stop(&self) {
        self.shutdown.shutdown();
    }

    /// Wait until the daemon task has exited, keeping the temp directory.
    pub async fn wait_for_exit(&self) {
        let deadline = tokio::time::Instant::now() + STARTUP_TIMEOUT;
        while !self.task.is_finished() {
            assert!(
                tokio::time::Instant::now() < deadline,
                "daemon did not exit in time"
            );
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    /// Signal shutdown and wait for the daemon to exit.
    pub async fn stop(self) -> Result<(), DaemonError> {
        self.request_stop();
        self.join().await
    }

    /// Wait for the daemon to exit on its own.
    pub async fn join(self) -> Result<(), DaemonError> {
        tokio::time::timeout(STARTUP_TIMEOUT, self.task)
            .await
            .expect("daemon did not exit in time")
            .expect("daemon task panicked")
    }
}
