//! Command grammar.
//!
//! ```text
//! SETUP  <pin> OUT [LOW|HIGH]
//! SETUP  <pin> IN  [PULLUP|PULLDOWN]
//! OUTPUT <pin> LOW|HIGH
//! INPUT  <pin>
//! ```
//!
//! Commands are case-insensitive and whitespace-separated. The pin token is
//! parsed before the verb is looked at, so a malformed pin is reported even
//! for an unknown verb.

use std::fmt;

use crate::pin::{Direction, Level, Pull, SetupOption};

/// Command verb.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    Setup,
    Output,
    Input,
}

impl Verb {
    /// Match an already lowercased token.
    fn from_token(token: &str) -> Option<Self> {
        match token {
            "setup" => Some(Verb::Setup),
            "output" => Some(Verb::Output),
            "input" => Some(Verb::Input),
            _ => None,
        }
    }
}

/// A tokenized command: verb, pin, and the remaining lowercased arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub verb: Verb,
    pub pin: u32,
    pub args: Vec<String>,
}

/// A fully validated pin operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Setup {
        pin: u32,
        direction: Direction,
        option: SetupOption,
    },
    Write {
        pin: u32,
        level: Level,
    },
    Read {
        pin: u32,
    },
}

/// Reasons a line is rejected before reaching the hardware.
///
/// The `Display` text is the message carried in the `error` response.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("Invalid port number")]
    InvalidPort,

    #[error("Port number not found")]
    MissingPort,

    /// Carries the offending line as received, minus its newline.
    #[error("Command syntax error: {0}")]
    Syntax(String),
}

/// Remove the line terminator (`\n` or `\r\n`) if present.
pub fn strip_terminator(line: &str) -> &str {
    let line = line.strip_suffix('\n').unwrap_or(line);
    line.strip_suffix('\r').unwrap_or(line)
}

impl Command {
    /// Tokenize a line.
    pub fn parse(line: &str) -> Result<Self, ParseError> {
        let text = strip_terminator(line);
        let lowered = text.to_lowercase();
        let tokens: Vec<&str> = lowered.split_whitespace().collect();

        let pin = match tokens.get(1) {
            None => return Err(ParseError::MissingPort),
            Some(token) => token.parse::<u32>().map_err(|_| ParseError::InvalidPort)?,
        };

        let verb =
            Verb::from_token(tokens[0]).ok_or_else(|| ParseError::Syntax(text.to_string()))?;

        Ok(Command {
            verb,
            pin,
            args: tokens[2..].iter().map(|t| t.to_string()).collect(),
        })
    }

    /// Validate arity and argument values, yielding the operation to run.
    /// `None` means a syntax error.
    pub fn operation(&self) -> Option<Operation> {
        let pin = self.pin;
        let args: Vec<&str> = self.args.iter().map(String::as_str).collect();

        match (self.verb, args.as_slice()) {
            (Verb::Output, [level]) => Some(Operation::Write {
                pin,
                level: parse_level(level)?,
            }),
            (Verb::Input, []) => Some(Operation::Read { pin }),
            (Verb::Setup, ["out"]) => Some(Operation::Setup {
                pin,
                direction: Direction::Output,
                option: SetupOption::None,
            }),
            (Verb::Setup, ["out", level]) => Some(Operation::Setup {
                pin,
                direction: Direction::Output,
                option: SetupOption::Initial(parse_level(level)?),
            }),
            (Verb::Setup, ["in"]) => Some(Operation::Setup {
                pin,
                direction: Direction::Input,
                option: SetupOption::None,
            }),
            (Verb::Setup, ["in", pull]) => Some(Operation::Setup {
                pin,
                direction: Direction::Input,
                option: SetupOption::Pull(parse_pull(pull)?),
            }),
            _ => None,
        }
    }
}

fn parse_level(token: &str) -> Option<Level> {
    match token {
        "low" => Some(Level::Low),
        "high" => Some(Level::High),
        _ => None,
    }
}

fn parse_pull(token: &str) -> Option<Pull> {
    match token {
        "pullup" => Some(Pull::Up),
        "pulldown" => Some(Pull::Down),
        _ => None,
    }
}

/// Parse a line all the way to a runnable [`Operation`].
pub fn parse_line(line: &str) -> Result<Operation, ParseError> {
    let command = Command::parse(line)?;
    command
        .operation()
        .ok_or_else(|| ParseError::Syntax(strip_terminator(line).to_string()))
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Setup {
                pin,
                direction,
                option,
            } => {
                write!(f, "setup {pin} {direction}")?;
                match option {
                    SetupOption::None => Ok(()),
                    SetupOption::Initial(level) => write!(f, " {level}"),
                    SetupOption::Pull(Pull::Up) => write!(f, " pullup"),
                    SetupOption::Pull(Pull::Down) => write!(f, " pulldown"),
                }
            }
            Operation::Write { pin, level } => write!(f, "output {pin} {level}"),
            Operation::Read { pin } => write!(f, "input {pin}"),
        }
    }
}
