//! Response vocabulary: `ok`, `true`, `false`, `error <message>`.

use std::fmt;

/// One response line, without its terminating newline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    Ok,
    True,
    False,
    Error(String),
}

impl Response {
    pub fn is_error(&self) -> bool {
        matches!(self, Response::Error(_))
    }

    /// Parse a response line as sent by the daemon. Returns `None` for
    /// anything outside the vocabulary.
    pub fn parse(line: &str) -> Option<Self> {
        let line = super::command::strip_terminator(line);
        match line {
            "ok" => Some(Response::Ok),
            "true" => Some(Response::True),
            "false" => Some(Response::False),
            "error" => Some(Response::Error(String::new())),
            _ => line
                .strip_prefix("error ")
                .map(|msg| Response::Error(msg.to_string())),
        }
    }

    /// The wire form, including the trailing newline.
    pub fn to_line(&self) -> String {
        format!("{self}\n")
    }
}

impl From<bool> for Response {
    fn from(value: bool) -> Self {
        if value { Response::True } else { Response::False }
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Response::Ok => write!(f, "ok"),
            Response::True => write!(f, "true"),
            Response::False => write!(f, "false"),
            Response::Error(msg) => write!(f, "error {msg}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_display() {
        assert_eq!(Response::Ok.to_string(), "ok");
        assert_eq!(Response::from(true).to_string(), "true");
        assert_eq!(Response::from(false).to_string(), "false");
        assert_eq!(
            Response::Error("Invalid port number".into()).to_string(),
            "error Invalid port number"
        );
        assert_eq!(Response::Ok.to_line(), "ok\n");
    }

    #[test]
    fn test_parse() {
        assert_eq!(Response::parse("ok\n"), Some(Response::Ok));
        assert_eq!(Response::parse("true"), Some(Response::True));
        assert_eq!(
            Response::parse("error Wrong direction exception\n"),
            Some(Response::Error("Wrong direction exception".into()))
        );
        assert_eq!(Response::parse("OK"), None);
        assert_eq!(Response::parse("errors happen"), None);
    }
}
