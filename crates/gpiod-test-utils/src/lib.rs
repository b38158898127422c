#![deny(unsafe_code)]

//! Shared test utilities for the gpiod workspace.
//!
//! Provides a scripted pin controller, config builders, a running-daemon
//! harness, and tracing helpers so that individual crate tests stay concise
//! and consistent.
//!
//! Add this crate as a `[dev-dependency]` in any workspace member:
//!
//! ```toml
//! [dev-dependencies]
//! gpiod-test-utils = { workspace = true }
//! ```

pub mod config;
pub mod daemon;
pub mod mock;
pub mod tracing_setup;
