//! Fuzz target for the command line grammar and dispatcher.
//!
//! Run with: cargo +nightly fuzz run fuzz_command_parser
//!
//! Every line must produce exactly one response line against the simulated
//! controller, never a panic.

#![no_main]

use gpiod_core::pin::{PinController, PinNumbering, SimulatedController};
use gpiod_core::protocol::{ProtocolParser, parse_line};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    // The server frames on '\n', so a command line never contains one.
    let line = text.split('\n').next().unwrap_or_default();
    let _ = parse_line(line);

    let mut controller = SimulatedController::new();
    if controller.init(PinNumbering::Board).is_err() {
        return;
    }
    let mut parser = ProtocolParser::new(controller);
    if let Ok(response) = parser.handle_line(line) {
        let out = response.to_line();
        assert!(out.ends_with('\n'));
        assert_eq!(out.matches('\n').count(), 1);
    }
});
