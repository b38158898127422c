//! Socket client for sending command lines to a running daemon.
//!
//! Used by `gpiod send` and by the integration tests. [`GpioClient::send`]
//! opens a connection per command; [`GpioClient::connect`] keeps one open
//! for a sequence of commands.

use std::path::{Path, PathBuf};

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tracing::debug;

use crate::protocol::Response;
use crate::protocol::command::strip_terminator;

/// Errors from the socket client.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("failed to connect to daemon socket at {path}: {source}")]
    Connect {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("daemon is not running (socket not found at {0})")]
    NotRunning(PathBuf),

    #[error("a command must be a single line")]
    MultiLine,

    #[error("daemon closed the connection without responding")]
    Closed,

    #[error("unrecognised response from daemon: {0:?}")]
    InvalidResponse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Client for the daemon socket.
#[derive(Debug, Clone)]
pub struct GpioClient {
    socket_path: PathBuf,
}

impl GpioClient {
    pub fn new(socket_path: impl Into<PathBuf>) -> Self {
        Self {
            socket_path: socket_path.into(),
        }
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Check if the daemon socket exists (daemon is likely running).
    pub fn daemon_available(&self) -> bool {
        self.socket_path.exists()
    }

    /// Open a connection for several commands.
    pub async fn connect(&self) -> Result<GpioConnection, ClientError> {
        if !self.daemon_available() {
            return Err(ClientError::NotRunning(self.socket_path.clone()));
        }

        let stream = UnixStream::connect(&self.socket_path)
            .await
            .map_err(|source| ClientError::Connect {
                path: self.socket_path.clone(),
                source,
            })?;
        let (reader, writer) = stream.into_split();

        Ok(GpioConnection {
            reader: BufReader::new(reader),
            writer,
        })
    }

    /// Send a single command on a fresh connection.
    pub async fn send(&self, command: &str) -> Result<Response, ClientError> {
        let mut conn = self.connect().await?;
        conn.command(command).await
    }
}

/// An open connection to the daemon.
#[derive(Debug)]
pub struct GpioConnection {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl GpioConnection {
    /// Send one command and wait for its response.
    pub async fn command(&mut self, command: &str) -> Result<Response, ClientError> {
        let command = strip_terminator(command);
        if command.contains('\n') {
            return Err(ClientError::MultiLine);
        }

        debug!(command, "Sending command");
        self.writer.write_all(command.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;

        let mut line = String::new();
        if self.reader.read_line(&mut line).await? == 0 {
            return Err(ClientError::Closed);
        }

        Response::parse(&line)
            .ok_or_else(|| ClientError::InvalidResponse(line.trim_end().to_string()))
    }
}
