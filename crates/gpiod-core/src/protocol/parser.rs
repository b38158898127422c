//! Line → pin operation → response.

use tracing::{debug, warn};

use super::command::{Operation, parse_line, strip_terminator};
use super::response::Response;
use crate::pin::{PinController, PinError};

/// Turns command lines into calls on a [`PinController`].
///
/// Every line yields exactly one [`Response`]. Malformed commands and
/// commands the hardware rejects (wrong direction, invalid channel) become
/// `error` responses. Only hardware faults come back as `Err`.
#[derive(Debug)]
pub struct ProtocolParser<C> {
    controller: C,
}

impl<C: PinController> ProtocolParser<C> {
    pub fn new(controller: C) -> Self {
        Self { controller }
    }

    pub fn controller(&self) -> &C {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut C {
        &mut self.controller
    }

    pub fn into_controller(self) -> C {
        self.controller
    }

    /// Handle one command line, with or without its trailing newline.
    pub fn handle_line(&mut self, line: &str) -> Result<Response, PinError> {
        match parse_line(line) {
            Ok(op) => self.execute(op),
            Err(e) => {
                debug!(line = strip_terminator(line), error = %e, "Rejected command");
                Ok(Response::Error(e.to_string()))
            }
        }
    }

    /// Run a validated operation against the controller.
    pub fn execute(&mut self, op: Operation) -> Result<Response, PinError> {
        let result = match op {
            Operation::Setup {
                pin,
                direction,
                option,
            } => self
                .controller
                .setup(pin, direction, option)
                .map(|()| Response::Ok),
            Operation::Write { pin, level } => {
                self.controller.write(pin, level).map(|()| Response::Ok)
            }
            Operation::Read { pin } => self.controller.read(pin).map(Response::from),
        };

        match result {
            Ok(response) => {
                debug!(%op, %response, "Executed command");
                Ok(response)
            }
            Err(e) => match e.client_message() {
                Some(message) => {
                    warn!(%op, error = %e, "Pin rejected command");
                    Ok(Response::Error(message))
                }
                None => Err(e),
            },
        }
    }
}
