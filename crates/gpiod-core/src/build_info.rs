//! Build metadata embedded by the build script, logged at startup and
//! shown by `gpiod --version`.

/// Short git commit hash, or `unknown`.
pub const GIT_HASH: &str = env!("GPIOD_GIT_HASH");

/// Build time as Unix epoch seconds.
pub const BUILD_TIMESTAMP: &str = env!("GPIOD_BUILD_TIMESTAMP");

/// Cargo profile (`debug` or `release`).
pub const BUILD_PROFILE: &str = env!("GPIOD_BUILD_PROFILE");

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// One-line version, e.g. `0.1.0 (abc1234, release)`.
pub fn version_string() -> String {
    format!("{VERSION} ({GIT_HASH}, {BUILD_PROFILE})")
}

/// Multi-line version block for `--version`.
pub fn long_version() -> String {
    format!("{VERSION}\ncommit:  {GIT_HASH}\nprofile: {BUILD_PROFILE}\nbuilt:   {BUILD_TIMESTAMP}")
}
