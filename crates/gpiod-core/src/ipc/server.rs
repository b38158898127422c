//! Connection server — one client at a time over a Unix stream socket.
//!
//! The server binds the socket, accepts a client, and answers one response
//! line per command line until the client goes away, then accepts the next
//! one. A client disconnecting is routine. Anything else that goes wrong on
//! the socket, or a hardware fault, ends [`ConnectionServer::serve`] with an
//! error.

use std::fs;
use std::io;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use bytes::BytesMut;
use socket2::{Domain, SockAddr, Socket, Type};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use gpiod_config::AppConfig;

use crate::daemon::ShutdownSignal;
use crate::pin::{PinController, PinError};
use crate::protocol::{ProtocolParser, Response};
use crate::protocol::command::strip_terminator;

/// Bytes requested per read. Commands are short.
const READ_CHUNK: usize = 64;

/// Longest command line accepted before the client is dropped.
const MAX_LINE: usize = 1024;

const LINE_TOO_LONG: &str = "Command line too long";

/// Socket parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerOptions {
    pub socket_path: PathBuf,
    pub socket_mode: u32,
    pub backlog: u32,
}

impl ServerOptions {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            socket_path: PathBuf::from(&config.daemon.socket_path),
            socket_mode: config.daemon.socket_mode,
            backlog: config.daemon.listen_backlog,
        }
    }
}

/// Errors that stop the server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("failed to bind socket at {path}: {source}")]
    Bind { path: PathBuf, source: io::Error },

    #[error("accept failed: {0}")]
    Accept(io::Error),

    #[error("connection I/O error: {0}")]
    Connection(io::Error),

    #[error("hardware fault while handling {command:?}: {source}")]
    Hardware { command: String, source: PinError },
}

/// Removes the socket file when dropped, so every exit path leaves the
/// path free for the next start.
#[derive(Debug)]
struct SocketFile {
    path: PathBuf,
}

impl Drop for SocketFile {
    fn drop(&mut self) {
        match fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "Removed socket file"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.path.display(), error = %e, "Failed to remove socket file"),
        }
    }
}

/// How a single client session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionEnd {
    Disconnected,
    Shutdown,
}

/// The listening socket plus bookkeeping.
#[derive(Debug)]
pub struct ConnectionServer {
    listener: UnixListener,
    socket: SocketFile,
    clients_served: u64,
}

impl ConnectionServer {
    /// Bind the socket described by `options`.
    ///
    /// A stale file at the path is removed first. Must be called from within
    /// a tokio runtime.
    pub fn bind(options: &ServerOptions) -> Result<Self, ServerError> {
        let path = &options.socket_path;
        let bind_err = |source: io::Error| ServerError::Bind {
            path: path.clone(),
            source,
        };

        match fs::remove_file(path) {
            Ok(()) => info!(path = %path.display(), "Removed stale socket file"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(bind_err(e)),
        }

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(bind_err)?;
            }
        }

        let std_listener = bind_std_listener(path, options.backlog).map_err(bind_err)?;
        let socket = SocketFile { path: path.clone() };

        fs::set_permissions(path, fs::Permissions::from_mode(options.socket_mode))
            .map_err(bind_err)?;
        let listener = UnixListener::from_std(std_listener).map_err(bind_err)?;

        info!(
            path = %path.display(),
            mode = %format!("{:#o}", options.socket_mode),
            backlog = options.backlog,
            "Socket listening"
        );

        Ok(Self {
            listener,
            socket,
            clients_served: 0,
        })
    }

    /// Path of the bound socket.
    pub fn socket_path(&self) -> &Path {
        &self.socket.path
    }

    /// Number of client connections accepted so far.
    pub fn clients_served(&self) -> u64 {
        self.clients_served
    }

    /// Serve clients one after another until shutdown is signalled.
    ///
    /// Returns `Ok(())` on shutdown. The active connection, if any, is
    /// closed before returning on every path.
    pub async fn serve<C: PinController>(
        &mut self,
        parser: &mut ProtocolParser<C>,
        shutdown_rx: &mut broadcast::Receiver<ShutdownSignal>,
    ) -> Result<(), ServerError> {
        loop {
            let stream = tokio::select! {
                _ = shutdown_rx.recv() => {
                    info!("Shutdown requested while waiting for a client");
                    return Ok(());
                }
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, _addr)) => stream,
                    Err(e) => {
                        error!(error = %e, "Accept failed");
                        return Err(ServerError::Accept(e));
                    }
                },
            };

            self.clients_served += 1;
            debug!(client = self.clients_served, "Client connected");

            match serve_client(stream, parser, shutdown_rx).await? {
                SessionEnd::Disconnected => {
                    debug!(client = self.clients_served, "Client disconnected");
                }
                SessionEnd::Shutdown => return Ok(()),
            }
        }
    }
}

fn bind_std_listener(path: &Path, backlog: u32) -> io::Result<std::os::unix::net::UnixListener> {
    let socket = Socket::new(Domain::UNIX, Type::STREAM, None)?;
    socket.bind(&SockAddr::unix(path)?)?;
    socket.listen(i32::try_from(backlog).unwrap_or(i32::MAX))?;
    socket.set_nonblocking(true)?;
    Ok(socket.into())
}

/// A peer that vanished mid-exchange, as opposed to a local failure.
fn is_disconnect(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::BrokenPipe
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
    )
}

/// Serve one client until it disconnects or shutdown is signalled.
///
/// The stream is dropped, closing the connection, on every return.
async fn serve_client<C: PinController>(
    mut stream: UnixStream,
    parser: &mut ProtocolParser<C>,
    shutdown_rx: &mut broadcast::Receiver<ShutdownSignal>,
) -> Result<SessionEnd, ServerError> {
    let mut buf = BytesMut::with_capacity(READ_CHUNK);

    loop {
        while let Some(pos) = buf.iter().position(|&b| b == b'\n') {
            let raw = buf.split_to(pos + 1);
            let line = String::from_utf8_lossy(&raw);

            let response = match parser.handle_line(&line) {
                Ok(response) => response,
                Err(source) => {
                    let command = strip_terminator(&line).to_string();
                    error!(%command, error = %source, "Hardware fault, closing connection");
                    return Err(ServerError::Hardware { command, source });
                }
            };

            if let Some(end) = send_response(&mut stream, &response, shutdown_rx).await? {
                return Ok(end);
            }
        }

        if buf.len() > MAX_LINE {
            warn!(bytes = buf.len(), "Command line too long, dropping client");
            let response = Response::Error(LINE_TOO_LONG.to_string());
            return Ok(send_response(&mut stream, &response, shutdown_rx)
                .await?
                .unwrap_or(SessionEnd::Disconnected));
        }

        buf.reserve(READ_CHUNK);
        let read = tokio::select! {
            _ = shutdown_rx.recv() => {
                info!("Closing active connection for shutdown");
                return Ok(SessionEnd::Shutdown);
            }
            read = stream.read_buf(&mut buf) => read,
        };

        match read {
            Ok(0) => {
                if !buf.is_empty() {
                    debug!(bytes = buf.len(), "Discarding partial command from closed connection");
                }
                return Ok(SessionEnd::Disconnected);
            }
            Ok(n) => debug!(bytes = n, "Read from client"),
            Err(e) if is_disconnect(&e) => {
                debug!(error = %e, "Client connection reset");
                return Ok(SessionEnd::Disconnected);
            }
            Err(e) => {
                error!(error = %e, "Failed to read from client, closing connection");
                return Err(ServerError::Connection(e));
            }
        }
    }
}

/// Write one response line.
///
/// A client that stops reading can block the write indefinitely, so it
/// races the shutdown signal. `Some` means the session is over.
async fn send_response(
    stream: &mut UnixStream,
    response: &Response,
    shutdown_rx: &mut broadcast::Receiver<ShutdownSignal>,
) -> Result<Option<SessionEnd>, ServerError> {
    let line = response.to_line();
    let written = tokio::select! {
        _ = shutdown_rx.recv() => {
            info!("Closing active connection for shutdown");
            return Ok(Some(SessionEnd::Shutdown));
        }
        written = stream.write_all(line.as_bytes()) => written,
    };

    match written {
        Ok(()) => Ok(None),
        Err(e) if is_disconnect(&e) => {
            debug!(error = %e, "Client left before reading the response");
            Ok(Some(SessionEnd::Disconnected))
        }
        Err(e) => {
            error!(error = %e, "Failed to write response, closing connection");
            Err(ServerError::Connection(e))
        }
    }
}
