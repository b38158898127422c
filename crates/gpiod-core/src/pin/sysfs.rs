//! Linux sysfs GPIO backend (`/sys/class/gpio`).
//!
//! Channels are exported on first setup. Direction and value are plain text
//! files under `gpioN/`; writing `high`/`low` to `direction` switches a pin
//! to output with that initial level in one step.
//!
//! The sysfs interface cannot configure bias resistors. Pull requests are
//! rejected without touching the pin; set the bias in the device tree and
//! use a plain `SETUP <pin> IN` instead.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use tracing::{debug, warn};

use super::{Direction, Level, PinController, PinError, PinNumbering, SetupOption};

/// How often to look for the `gpioN` directory after an export.
const EXPORT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// How many times to look before giving up.
const EXPORT_POLL_ATTEMPTS: u32 = 20;

/// A [`PinController`] driving the legacy sysfs GPIO interface.
#[derive(Debug)]
pub struct SysfsController {
    root: PathBuf,
    numbering: PinNumbering,
}

impl SysfsController {
    /// Create a controller rooted at `root` (normally `/sys/class/gpio`).
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            numbering: PinNumbering::Board,
        }
    }

    fn channel_dir(&self, channel: u32) -> PathBuf {
        self.root.join(format!("gpio{channel}"))
    }

    fn ensure_exported(&self, channel: u32) -> Result<PathBuf, PinError> {
        let dir = self.channel_dir(channel);
        if dir.exists() {
            return Ok(dir);
        }

        write_file(&self.root.join("export"), &channel.to_string())?;

        // udev creates the directory asynchronously after the export.
        for _ in 0..EXPORT_POLL_ATTEMPTS {
            if dir.join("direction").exists() {
                debug!(channel, "Exported GPIO channel");
                return Ok(dir);
            }
            thread::sleep(EXPORT_POLL_INTERVAL);
        }

        Err(PinError::Io {
            path: dir,
            source: io::Error::new(io::ErrorKind::TimedOut, "exported channel never appeared"),
        })
    }
}

fn write_file(path: &Path, contents: &str) -> Result<(), PinError> {
    fs::write(path, contents).map_err(|source| PinError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn read_file(path: &Path) -> Result<String, PinError> {
    fs::read_to_string(path)
        .map(|s| s.trim().to_string())
        .map_err(|source| PinError::Io {
            path: path.to_path_buf(),
            source,
        })
}

impl PinController for SysfsController {
    fn name(&self) -> &'static str {
        "sysfs"
    }

    fn init(&mut self, numbering: PinNumbering) -> Result<(), PinError> {
        if !self.root.is_dir() {
            return Err(PinError::Io {
                path: self.root.clone(),
                source: io::Error::new(io::ErrorKind::NotFound, "sysfs GPIO root not found"),
            });
        }
        self.numbering = numbering;
        debug!(root = %self.root.display(), ?numbering, "sysfs GPIO backend initialised");
        Ok(())
    }

    fn setup(
        &mut self,
        pin: u32,
        direction: Direction,
        option: SetupOption,
    ) -> Result<(), PinError> {
        let channel = self.numbering.channel(pin)?;
        if let SetupOption::Pull(pull) = option {
            warn!(pin, ?pull, "sysfs cannot configure pull resistors");
            return Err(PinError::PullUnsupported(pin));
        }
        let dir = self.ensure_exported(channel)?;

        let mode = match (direction, option) {
            (Direction::Output, SetupOption::Initial(Level::High)) => "high",
            (Direction::Output, SetupOption::Initial(Level::Low)) => "low",
            (Direction::Output, _) => "out",
            (Direction::Input, _) => "in",
        };

        write_file(&dir.join("direction"), mode)
    }

    fn write(&mut self, pin: u32, level: Level) -> Result<(), PinError> {
        let channel = self.numbering.channel(pin)?;
        let dir = self.channel_dir(channel);
        if !dir.exists() {
            return Err(PinError::WrongDirection(pin));
        }
        if read_file(&dir.join("direction"))? != "out" {
            return Err(PinError::WrongDirection(pin));
        }

        let value = if level.is_high() { "1" } else { "0" };
        write_file(&dir.join("value"), value)
    }

    fn read(&mut self, pin: u32) -> Result<bool, PinError> {
        let channel = self.numbering.channel(pin)?;
        let dir = self.channel_dir(channel);
        if !dir.exists() {
            return Err(PinError::WrongDirection(pin));
        }

        Ok(read_file(&dir.join("value"))? == "1")
    }
}
