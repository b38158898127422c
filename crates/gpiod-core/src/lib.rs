#![deny(unsafe_code)]

//! gpiod core — GPIO access for unprivileged processes.
//!
//! A privileged daemon owns the pins and serves a line-oriented text
//! protocol on a world-writable Unix socket:
//!
//! ```text
//! SETUP 16 IN PULLUP   → ok
//! INPUT 16             → true
//! OUTPUT 11 HIGH       → error Wrong direction exception
//! ```
//!
//! Clients are served one at a time and every pin operation runs on the
//! daemon's single task, so hardware access is strictly serial.

/// Compile-time build metadata (version, git hash, profile).
pub mod build_info;
/// Daemon lifecycle: startup sequence, signal handling, shutdown.
pub mod daemon;
/// Startup command file replay.
pub mod init_file;
/// Unix socket server and client.
pub mod ipc;
/// Pin controller capability and backends.
pub mod pin;
/// Command grammar, parser, and responses.
pub mod protocol;

pub use daemon::{Daemon, DaemonError, ShutdownHandle, ShutdownSignal};
pub use ipc::{GpioClient, ServerOptions};
pub use pin::{PinController, PinError};
pub use protocol::{ProtocolParser, Response};
