//! Pin-level hardware capability.
//!
//! Everything above this module talks to hardware exclusively through the
//! [`PinController`] trait. Two backends ship with the daemon:
//!
//! - [`SysfsController`]: the Linux `/sys/class/gpio` interface.
//! - [`SimulatedController`]: an in-memory pin bank for tests and dry runs.
//!
//! Pin numbers arriving from clients are physical header positions by
//! default. Translating them to SoC channel numbers is the backend's job,
//! driven by the [`PinNumbering`] passed to [`PinController::init`].

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

pub mod simulated;
pub mod sysfs;

pub use simulated::SimulatedController;
pub use sysfs::SysfsController;

/// Pin direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Driven by the board.
    Output,
    /// Sensed by the board.
    Input,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Output => write!(f, "out"),
            Direction::Input => write!(f, "in"),
        }
    }
}

/// Logic level of a pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Level {
    Low,
    High,
}

impl Level {
    pub fn is_high(self) -> bool {
        self == Level::High
    }
}

impl From<bool> for Level {
    fn from(high: bool) -> Self {
        if high { Level::High } else { Level::Low }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Level::Low => write!(f, "low"),
            Level::High => write!(f, "high"),
        }
    }
}

/// Internal bias resistor for an input pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pull {
    Up,
    Down,
}

/// Optional extra parameter of a setup call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SetupOption {
    #[default]
    None,
    /// Initial level of an output pin.
    Initial(Level),
    /// Bias resistor of an input pin.
    Pull(Pull),
}

/// How pin numbers in commands map onto hardware channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PinNumbering {
    /// Physical position on the 40-pin header.
    #[default]
    Board,
    /// Broadcom SoC channel number.
    Bcm,
}

impl FromStr for PinNumbering {
    type Err = PinError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "board" => Ok(PinNumbering::Board),
            "bcm" => Ok(PinNumbering::Bcm),
            other => Err(PinError::Unsupported(format!(
                "unknown pin numbering scheme {other:?}"
            ))),
        }
    }
}

/// Highest channel exposed on the header of a 40-pin board.
const MAX_BCM_CHANNEL: u32 = 27;

/// Header position → BCM channel. `None` marks power and ground pins.
const BOARD_TO_BCM: [Option<u32>; 41] = [
    None,     // 0 (unused)
    None,     // 1: 3V3
    None,     // 2: 5V
    Some(2),  // 3
    None,     // 4: 5V
    Some(3),  // 5
    None,     // 6: GND
    Some(4),  // 7
    Some(14), // 8
    None,     // 9: GND
    Some(15), // 10
    Some(17), // 11
    Some(18), // 12
    Some(27), // 13
    None,     // 14: GND
    Some(22), // 15
    Some(23), // 16
    None,     // 17: 3V3
    Some(24), // 18
    Some(10), // 19
    None,     // 20: GND
    Some(9),  // 21
    Some(25), // 22
    Some(11), // 23
    Some(8),  // 24
    None,     // 25: GND
    Some(7),  // 26
    Some(0),  // 27
    Some(1),  // 28
    Some(5),  // 29
    None,     // 30: GND
    Some(6),  // 31
    Some(12), // 32
    Some(13), // 33
    None,     // 34: GND
    Some(19), // 35
    Some(16), // 36
    Some(26), // 37
    Some(20), // 38
    None,     // 39: GND
    Some(21), // 40
];

impl PinNumbering {
    /// Resolve a client-supplied pin number to a hardware channel.
    pub fn channel(self, pin: u32) -> Result<u32, PinError> {
        match self {
            PinNumbering::Board => BOARD_TO_BCM
                .get(pin as usize)
                .copied()
                .flatten()
                .ok_or(PinError::InvalidChannel(pin)),
            PinNumbering::Bcm if pin <= MAX_BCM_CHANNEL => Ok(pin),
            PinNumbering::Bcm => Err(PinError::InvalidChannel(pin)),
        }
    }
}

/// Errors raised by a pin backend.
#[derive(Debug, thiserror::Error)]
pub enum PinError {
    /// The operation needs the opposite direction from the one the pin is
    /// configured for.
    #[error("pin {0} is not configured for this direction")]
    WrongDirection(u32),

    /// The pin number does not name a usable GPIO channel.
    #[error("pin {0} is not a GPIO channel")]
    InvalidChannel(u32),

    /// The backend has no way to apply a pull resistor.
    #[error("pin {0}: pull resistors are not supported by this backend")]
    PullUnsupported(u32),

    #[error("unsupported: {0}")]
    Unsupported(String),

    #[error("GPIO I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl PinError {
    /// Message reported to the client for errors caused by the command
    /// itself. `None` means a hardware fault the daemon cannot answer for.
    pub fn client_message(&self) -> Option<String> {
        match self {
            PinError::WrongDirection(_) => Some("Wrong direction exception".to_string()),
            PinError::InvalidChannel(pin) => Some(format!("Invalid channel {pin}")),
            PinError::PullUnsupported(_) => Some("Pull resistor not supported".to_string()),
            PinError::Unsupported(_) | PinError::Io { .. } => None,
        }
    }
}

/// Capability interface to the GPIO hardware.
///
/// Calls are made strictly serially from a single task; implementations
/// need no internal locking.
pub trait PinController: Send {
    /// Short backend name used in logs.
    fn name(&self) -> &'static str;

    /// Configure global hardware mode. Called exactly once, before any
    /// other operation.
    fn init(&mut self, numbering: PinNumbering) -> Result<(), PinError>;

    /// Configure the direction of a pin.
    fn setup(
        &mut self,
        pin: u32,
        direction: Direction,
        option: SetupOption,
    ) -> Result<(), PinError>;

    /// Drive an output pin.
    fn write(&mut self, pin: u32, level: Level) -> Result<(), PinError>;

    /// Sample a pin. Returns `true` when the pin reads high.
    fn read(&mut self, pin: u32) -> Result<bool, PinError>;
}

impl<C: PinController + ?Sized> PinController for Box<C> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn init(&mut self, numbering: PinNumbering) -> Result<(), PinError> {
        (**self).init(numbering)
    }

    fn setup(
        &mut self,
        pin: u32,
        direction: Direction,
        option: SetupOption,
    ) -> Result<(), PinError> {
        (**self).setup(pin, direction, option)
    }

    fn write(&mut self, pin: u32, level: Level) -> Result<(), PinError> {
        (**self).write(pin, level)
    }

    fn read(&mut self, pin: u32) -> Result<bool, PinError> {
        (**self).read(pin)
    }
}

/// Build the backend selected by `gpio.backend`.
pub fn controller_from_config(
    config: &gpiod_config::GpioConfig,
) -> Result<Box<dyn PinController>, PinError> {
    match config.backend.as_str() {
        "sysfs" => Ok(Box::new(SysfsController::new(&config.sysfs_root))),
        "simulated" => Ok(Box::new(SimulatedController::new())),
        other => Err(PinError::Unsupported(format!(
            "unknown GPIO backend {other:?}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_board_numbering_maps_header_pins() {
        assert_eq!(PinNumbering::Board.channel(11).unwrap(), 17);
        assert_eq!(PinNumbering::Board.channel(16).unwrap(), 23);
        assert_eq!(PinNumbering::Board.channel(40).unwrap(), 21);
        assert_eq!(PinNumbering::Board.channel(3).unwrap(), 2);
    }

    #[test]
    fn test_board_numbering_rejects_power_and_ground() {
        for pin in [0, 1, 2, 4, 6, 9, 14, 17, 20, 25, 30, 34, 39, 41, 1000] {
            assert!(
                matches!(PinNumbering::Board.channel(pin), Err(PinError::InvalidChannel(p)) if p == pin),
                "pin {pin} should be rejected"
            );
        }
    }

    #[test]
    fn test_bcm_numbering_passes_through() {
        assert_eq!(PinNumbering::Bcm.channel(0).unwrap(), 0);
        assert_eq!(PinNumbering::Bcm.channel(27).unwrap(), 27);
        assert!(PinNumbering::Bcm.channel(28).is_err());
    }

    #[test]
    fn test_numbering_from_str() {
        assert_eq!("board".parse::<PinNumbering>().unwrap(), PinNumbering::Board);
        assert_eq!("bcm".parse::<PinNumbering>().unwrap(), PinNumbering::Bcm);
        assert!("wpi".parse::<PinNumbering>().is_err());
    }

    #[test]
    fn test_client_messages() {
        assert_eq!(
            PinError::WrongDirection(11).client_message().as_deref(),
            Some("Wrong direction exception")
        );
        assert_eq!(
            PinError::InvalidChannel(1).client_message().as_deref(),
            Some("Invalid channel 1")
        );
        let io = PinError::Io {
            path: PathBuf::from("/sys/class/gpio/export"),
            source: std::io::Error::other("boom"),
        };
        assert!(io.client_message().is_none());
        assert_eq!(
            PinError::PullUnsupported(16).client_message().as_deref(),
            Some("Pull resistor not supported")
        );
    }

    #[test]
    fn test_level_conversions() {
        assert_eq!(Level::from(true), Level::High);
        assert_eq!(Level::from(false), Level::Low);
        assert!(Level::High.is_high());
        assert_eq!(Level::Low.to_string(), "low");
        assert_eq!(Direction::Output.to_string(), "out");
    }

    #[test]
    fn test_controller_from_config() {
        let mut config = gpiod_config::GpioConfig::default();
        config.backend = "simulated".to_string();
        assert_eq!(controller_from_config(&config).unwrap().name(), "simulated");

        config.backend = "sysfs".to_string();
        assert_eq!(controller_from_config(&config).unwrap().name(), "sysfs");

        config.backend = "bogus".to_string();
        assert!(controller_from_config(&config).is_err());
    }
}
