//! In-memory pin bank.
//!
//! Behaves like a freshly booted board: every channel starts as an
//! unconfigured input. Writes to anything that is not an output fail with
//! [`PinError::WrongDirection`], as do reads from channels that were never
//! set up.

use std::collections::HashMap;

use tracing::debug;

use super::{Direction, Level, PinController, PinError, PinNumbering, Pull, SetupOption};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SimPin {
    direction: Direction,
    /// Driven level for outputs, sensed level for inputs.
    level: Level,
}

/// A [`PinController`] backed by a `HashMap` of channel states.
#[derive(Debug, Default)]
pub struct SimulatedController {
    numbering: PinNumbering,
    pins: HashMap<u32, SimPin>,
    /// Externally applied levels for input channels.
    external: HashMap<u32, Level>,
}

impl SimulatedController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply an external level to a pin, as a switch or sensor would.
    /// Visible to subsequent reads while the pin is an input.
    pub fn set_external_level(&mut self, pin: u32, level: Level) -> Result<(), PinError> {
        let channel = self.numbering.channel(pin)?;
        self.external.insert(channel, level);
        if let Some(state) = self.pins.get_mut(&channel) {
            if state.direction == Direction::Input {
                state.level = level;
            }
        }
        Ok(())
    }

    /// Current direction of a pin, if it has been set up.
    pub fn direction(&self, pin: u32) -> Option<Direction> {
        let channel = self.numbering.channel(pin).ok()?;
        self.pins.get(&channel).map(|p| p.direction)
    }

    /// Current level of a pin, if it has been set up.
    pub fn level(&self, pin: u32) -> Option<Level> {
        let channel = self.numbering.channel(pin).ok()?;
        self.pins.get(&channel).map(|p| p.level)
    }
}

impl PinController for SimulatedController {
    fn name(&self) -> &'static str {
        "simulated"
    }

    fn init(&mut self, numbering: PinNumbering) -> Result<(), PinError> {
        debug!(?numbering, "Simulated pin bank initialised");
        self.numbering = numbering;
        self.pins.clear();
        Ok(())
    }

    fn setup(
        &mut self,
        pin: u32,
        direction: Direction,
        option: SetupOption,
    ) -> Result<(), PinError> {
        let channel = self.numbering.channel(pin)?;
        let previous = self.pins.get(&channel).copied();

        let level = match (direction, option) {
            (Direction::Output, SetupOption::Initial(level)) => level,
            (Direction::Output, _) => match previous {
                Some(p) if p.direction == Direction::Output => p.level,
                _ => Level::Low,
            },
            (Direction::Input, SetupOption::Pull(Pull::Up)) => {
                self.external.get(&channel).copied().unwrap_or(Level::High)
            }
            (Direction::Input, _) => self.external.get(&channel).copied().unwrap_or(Level::Low),
        };

        self.pins.insert(channel, SimPin { direction, level });
        Ok(())
    }

    fn write(&mut self, pin: u32, level: Level) -> Result<(), PinError> {
        let channel = self.numbering.channel(pin)?;
        match self.pins.get_mut(&channel) {
            Some(state) if state.direction == Direction::Output => {
                state.level = level;
                Ok(())
            }
            _ => Err(PinError::WrongDirection(pin)),
        }
    }

    fn read(&mut self, pin: u32) -> Result<bool, PinError> {
        let channel = self.numbering.channel(pin)?;
        self.pins
            .get(&channel)
            .map(|state| state.level.is_high())
            .ok_or(PinError::WrongDirection(pin))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn controller() -> SimulatedController {
        let mut c = SimulatedController::new();
        c.init(PinNumbering::Board).unwrap();
        c
    }

    #[test]
    fn test_write_requires_output() {
        let mut c = controller();
        assert!(matches!(
            c.write(11, Level::High),
            Err(PinError::WrongDirection(11))
        ));

        c.setup(11, Direction::Output, SetupOption::None).unwrap();
        c.write(11, Level::High).unwrap();
        assert_eq!(c.level(11), Some(Level::High));
    }

    #[test]
    fn test_write_to_input_fails() {
        let mut c = controller();
        c.setup(16, Direction::Input, SetupOption::None).unwrap();
        assert!(matches!(
            c.write(16, Level::Low),
            Err(PinError::WrongDirection(16))
        ));
    }

    #[test]
    fn test_initial_level_is_applied() {
        let mut c = controller();
        c.setup(12, Direction::Output, SetupOption::Initial(Level::High))
            .unwrap();
        assert_eq!(c.level(12), Some(Level::High));
        assert!(c.read(12).unwrap());
    }

    #[test]
    fn test_pull_resistors_bias_inputs() {
        let mut c = controller();
        c.setup(16, Direction::Input, SetupOption::Pull(Pull::Up))
            .unwrap();
        assert!(c.read(16).unwrap());

        c.setup(18, Direction::Input, SetupOption::Pull(Pull::Down))
            .unwrap();
        assert!(!c.read(18).unwrap());
    }

    #[test]
    fn test_external_level_overrides_pull() {
        let mut c = controller();
        c.setup(16, Direction::Input, SetupOption::Pull(Pull::Up))
            .unwrap();
        c.set_external_level(16, Level::Low).unwrap();
        assert!(!c.read(16).unwrap());
    }

    #[test]
    fn test_read_unconfigured_pin_fails() {
        let mut c = controller();
        assert!(matches!(c.read(16), Err(PinError::WrongDirection(16))));
    }

    #[test]
    fn test_invalid_channel() {
        let mut c = controller();
        assert!(matches!(
            c.setup(1, Direction::Output, SetupOption::None),
            Err(PinError::InvalidChannel(1))
        ));
    }

    #[test]
    fn test_bcm_numbering_addresses_channels_directly() {
        let mut c = SimulatedController::new();
        c.init(PinNumbering::Bcm).unwrap();
        c.setup(17, Direction::Output, SetupOption::None).unwrap();
        assert_eq!(c.direction(17), Some(Direction::Output));
        // Header pin 17 is 3V3 under board numbering, but channel 17 is fine here.
        c.write(17, Level::High).unwrap();
    }
}
