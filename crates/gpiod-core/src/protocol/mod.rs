//! Text protocol spoken over the daemon socket and in the init file.
//!
//! One command per line, one response line per command. See [`command`] for
//! the grammar and [`response`] for the reply vocabulary.

pub mod command;
pub mod parser;
pub mod response;

pub use command::{Command, Operation, ParseError, Verb, parse_line};
pub use parser::ProtocolParser;
pub use response::Response;
