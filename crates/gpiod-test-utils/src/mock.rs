//! Scripted pin controller.
//!
//! [`ScriptedController`] accepts every operation unless told otherwise and
//! records each call. Clones share state, so a test can keep one handle
//! while the daemon owns another.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use gpiod_core::pin::{Direction, Level, PinController, PinError, PinNumbering, SetupOption};

/// A call received by the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PinCall {
    Init(PinNumbering),
    Setup(u32, Direction, SetupOption),
    Write(u32, Level),
    Read(u32),
}

#[derive(Debug, Default)]
struct Script {
    calls: Vec<PinCall>,
    /// Pins the "hardware" considers inputs; writes fail.
    inputs: HashSet<u32>,
    /// Pins the "hardware" considers outputs; reads fail.
    outputs: HashSet<u32>,
    /// Every operation on these pins is a hardware fault.
    faulty: HashSet<u32>,
    read_values: HashMap<u32, bool>,
    setup_delay: Option<Duration>,
}

/// A [`PinController`] whose behaviour is set up by the test.
#[derive(Debug, Clone, Default)]
pub struct ScriptedController {
    script: Arc<Mutex<Script>>,
}

impl ScriptedController {
    pub fn new() -> Self {
        Self::default()
    }

    fn script(&self) -> MutexGuard<'_, Script> {
        self.script.lock().expect("script lock poisoned")
    }

    /// Report `pin` as input-configured: writes fail with wrong direction.
    pub fn with_input_pin(self, pin: u32) -> Self {
        self.script().inputs.insert(pin);
        self
    }

    /// Report `pin` as output-configured: reads fail with wrong direction.
    pub fn with_output_pin(self, pin: u32) -> Self {
        self.script().outputs.insert(pin);
        self
    }

    /// Make every operation on `pin` fail with an I/O fault.
    pub fn with_faulty_pin(self, pin: u32) -> Self {
        self.script().faulty.insert(pin);
        self
    }

    /// Block the calling thread for `delay` in every `setup`, the way a
    /// sysfs export poll does.
    pub fn with_blocking_setup(self, delay: Duration) -> Self {
        self.script().setup_delay = Some(delay);
        self
    }

    pub fn with_read_value(self, pin: u32, high: bool) -> Self {
        self.set_read_value(pin, high);
        self
    }

    /// Change what a read of `pin` returns.
    pub fn set_read_value(&self, pin: u32, high: bool) {
        self.script().read_values.insert(pin, high);
    }

    /// Every call received so far, in order.
    pub fn calls(&self) -> Vec<PinCall> {
        self.script().calls.clone()
    }

    fn record(&self, call: PinCall, pin: Option<u32>) -> Result<MutexGuard<'_, Script>, PinError> {
        let mut script = self.script();
        script.calls.push(call);
        match pin {
            Some(pin) if script.faulty.contains(&pin) => Err(PinError::Io {
                path: PathBuf::from(format!("/scripted/gpio{pin}")),
                source: std::io::Error::other("scripted fault"),
            }),
            _ => Ok(script),
        }
    }
}

impl PinController for ScriptedController {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn init(&mut self, numbering: PinNumbering) -> Result<(), PinError> {
        self.record(PinCall::Init(numbering), None)?;
        Ok(())
    }

    fn setup(
        &mut self,
        pin: u32,
        direction: Direction,
        option: SetupOption,
    ) -> Result<(), PinError> {
        let delay = self.script().setup_delay;
        if let Some(delay) = delay {
            std::thread::sleep(delay);
        }
        let mut script = self.record(PinCall::Setup(pin, direction, option), Some(pin))?;
        match direction {
            Direction::Output => {
                script.inputs.remove(&pin);
                script.outputs.insert(pin);
            }
            Direction::Input => {
                script.outputs.remove(&pin);
                script.inputs.insert(pin);
            }
        }
        Ok(())
    }

    fn write(&mut self, pin: u32, level: Level) -> Result<(), PinError> {
        let script = self.record(PinCall::Write(pin, level), Some(pin))?;
        if script.inputs.contains(&pin) {
            return Err(PinError::WrongDirection(pin));
        }
        Ok(())
    }

    fn read(&mut self, pin: u32) -> Result<bool, PinError> {
        let script = self.record(PinCall::Read(pin), Some(pin))?;
        if script.outputs.contains(&pin) {
            return Err(PinError::WrongDirection(pin));
        }
        Ok(script.read_values.get(&pin).copied().unwrap_or(false))
    }
}
