//! Daemon socket: a Unix domain stream socket speaking the line protocol.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐        Unix socket         ┌──────────────────┐
//! │  client  │───────────────────────────▶│ ConnectionServer │
//! │ (any uid)│  "SETUP 16 OUT\n" / "ok\n"  │  one at a time   │
//! └──────────┘                            └────────┬─────────┘
//!                                                  │
//!                                         ┌────────▼─────────┐
//!                                         │  ProtocolParser  │
//!                                         └────────┬─────────┘
//!                                                  │
//!                                         ┌────────▼─────────┐
//!                                         │  PinController   │
//!                                         └──────────────────┘
//! ```

pub mod client;
pub mod server;

pub use client::{ClientError, GpioClient, GpioConnection};
pub use server::{ConnectionServer, ServerError, ServerOptions};
