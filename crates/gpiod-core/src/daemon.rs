//! Core daemon process: startup, shutdown, and main loop.
//!
//! Startup order: signal handlers, pin backend `init`, init file replay,
//! socket bind, then serve until a hangup (or terminate/interrupt) signal
//! arrives. Signal handling never touches the connection directly; it sends
//! a [`ShutdownSignal`] and the serve loop closes whatever it holds.

use std::path::Path;

use tokio::signal::unix::{SignalKind, signal};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use gpiod_config::AppConfig;

use crate::build_info;
use crate::init_file::{self, InitReport};
use crate::ipc::{ConnectionServer, ServerError, ServerOptions};
use crate::pin::{self, PinController, PinError, PinNumbering};
use crate::protocol::ProtocolParser;

/// Shutdown signal sent via broadcast channel.
#[derive(Debug, Clone)]
pub struct ShutdownSignal;

/// Cloneable handle that asks a running daemon to stop.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    tx: broadcast::Sender<ShutdownSignal>,
}

impl ShutdownHandle {
    pub fn shutdown(&self) {
        let _ = self.tx.send(ShutdownSignal);
    }
}

/// The gpiod daemon.
pub struct Daemon {
    config: AppConfig,
    parser: ProtocolParser<Box<dyn PinController>>,
    shutdown_tx: broadcast::Sender<ShutdownSignal>,
    // Subscribed at construction so a shutdown requested before `run`
    // is not lost.
    shutdown_rx: broadcast::Receiver<ShutdownSignal>,
}

impl Daemon {
    /// Create a daemon using the backend named in `config.gpio.backend`.
    pub fn new(config: AppConfig) -> Result<Self, DaemonError> {
        let controller = pin::controller_from_config(&config.gpio)?;
        Ok(Self::with_controller(config, controller))
    }

    /// Create a daemon around an explicit pin controller.
    pub fn with_controller(config: AppConfig, controller: Box<dyn PinController>) -> Self {
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

        Self {
            config,
            parser: ProtocolParser::new(controller),
            shutdown_tx,
            shutdown_rx,
        }
    }

    /// Run the daemon until a shutdown signal is received.
    ///
    /// Returns an error for startup failures and for faults the serve loop
    /// does not recover from; the process is expected to exit in both cases
    /// and be restarted by its supervisor.
    pub async fn run(&mut self) -> Result<(), DaemonError> {
        let numbering: PinNumbering = self.config.gpio.numbering.parse()?;
        let options = ServerOptions::from_config(&self.config);

        info!(
            version = %build_info::version_string(),
            backend = self.parser.controller().name(),
            numbering = %self.config.gpio.numbering,
            socket = %options.socket_path.display(),
            "gpiod starting"
        );

        // Installed before any hardware work, so a hangup during startup
        // still goes through the shutdown channel.
        let watcher = spawn_signal_watcher(self.shutdown_tx.clone())?;
        let result = self.start_and_serve(numbering, &options).await;
        watcher.abort();
        result
    }

    async fn start_and_serve(
        &mut self,
        numbering: PinNumbering,
        options: &ServerOptions,
    ) -> Result<(), DaemonError> {
        self.parser.controller_mut().init(numbering)?;
        let report = self.run_init_file().await;
        if report.failed() > 0 {
            warn!(failed = report.failed(), "Some init commands were rejected");
        }

        let mut server = ConnectionServer::bind(options)?;
        let result = server.serve(&mut self.parser, &mut self.shutdown_rx).await;
        let clients = server.clients_served();
        drop(server);

        match result {
            Ok(()) => {
                info!(clients, "Exiting on signal");
                Ok(())
            }
            Err(e) => {
                error!(error = %e, clients, "Daemon stopped by unexpected error");
                Err(e.into())
            }
        }
    }

    async fn run_init_file(&mut self) -> InitReport {
        let path = self.config.daemon.init_file.clone();
        init_file::run_init_file(Path::new(&path), &mut self.parser).await
    }

    /// Request a graceful shutdown of the daemon.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(ShutdownSignal);
    }

    /// A handle that can stop the daemon from another task.
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            tx: self.shutdown_tx.clone(),
        }
    }

    /// Get a reference to the daemon's configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }
}

/// Forward SIGHUP, SIGTERM, and Ctrl-C to the shutdown channel.
fn spawn_signal_watcher(
    shutdown_tx: broadcast::Sender<ShutdownSignal>,
) -> Result<JoinHandle<()>, DaemonError> {
    let mut hangup = signal(SignalKind::hangup())?;
    let mut terminate = signal(SignalKind::terminate())?;
    let mut interrupt = signal(SignalKind::interrupt())?;

    Ok(tokio::spawn(async move {
        tokio::select! {
            _ = hangup.recv() => info!("SIGHUP received, shutting down"),
            _ = terminate.recv() => info!("SIGTERM received, shutting down"),
            _ = interrupt.recv() => warn!("Ctrl-C received, initiating graceful shutdown"),
        }
        let _ = shutdown_tx.send(ShutdownSignal);
    }))
}

/// Errors from the daemon runtime.
#[derive(Debug, thiserror::Error)]
pub enum DaemonError {
    #[error("pin backend error: {0}")]
    Pin(#[from] PinError),

    #[error(transparent)]
    Server(#[from] ServerError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pin::SimulatedController;
    use tempfile::TempDir;

    fn test_config(dir: &TempDir) -> AppConfig {
        let mut config = AppConfig::default();
        config.daemon.socket_path = dir.path().join("gpiod.sock").display().to_string();
        config.daemon.init_file = dir.path().join("gpiod.cfg").display().to_string();
        config.gpio.backend = "simulated".to_string();
        config
    }

    #[test]
    fn test_daemon_creation() {
        let dir = TempDir::new().unwrap();
        let daemon = Daemon::new(test_config(&dir)).unwrap();
        assert_eq!(daemon.config().gpio.backend, "simulated");
    }

    #[test]
    fn test_daemon_rejects_unknown_backend() {
        let dir = TempDir::new().unwrap();
        let mut config = test_config(&dir);
        config.gpio.backend = "bogus".to_string();
        assert!(matches!(Daemon::new(config), Err(DaemonError::Pin(_))));
    }

    #[tokio::test]
    async fn test_shutdown_before_run_stops_immediately() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir);
        let socket = std::path::PathBuf::from(&config.daemon.socket_path);
        let mut daemon = Daemon::with_controller(config, Box::new(SimulatedController::new()));

        daemon.shutdown();
        daemon.run().await.unwrap();
        assert!(!socket.exists(), "socket file must be removed on exit");
    }

    #[tokio::test]
    async fn test_init_failure_is_fatal() {
        let dir = TempDir::new().unwrap();
        let mut config = test_config(&dir);
        config.gpio.backend = "sysfs".to_string();
        config.gpio.sysfs_root = dir.path().join("no-sysfs").display().to_string();

        let mut daemon = Daemon::new(config).unwrap();
        assert!(matches!(daemon.run().await, Err(DaemonError::Pin(_))));
    }
}
