//! Response tokenizer and interpreter.
//!
//! A decoded payload is split into at most [`MAX_ARGS`] whitespace separated
//! tokens. The first token is the message type: either an echo of the first
//! character of the issued command, or [`ERROR_DISCRIMINATOR`] followed by a
//! device error code.

use crate::error::{Error, ErrorCode, Result};
use std::fmt;
use std::str::FromStr;

/// Maximum number of tokens kept from one response.
pub const MAX_ARGS: usize = 20;

/// First token of a device error frame.
pub const ERROR_DISCRIMINATOR: &str = "E";

/// Tokenized response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Response {
    argv: Vec<String>,
}

impl Response {
    /// Tokenize a decoded payload.
    ///
    /// Runs of whitespace separate tokens; tokens beyond [`MAX_ARGS`] are
    /// dropped.
    pub fn parse(payload: &[u8]) -> Self {
        Self::parse_str(&String::from_utf8_lossy(payload))
    }

    /// Tokenize a payload given as text.
    pub fn parse_str(payload: &str) -> Self {
        Self {
            argv: payload
                .split_whitespace()
                .take(MAX_ARGS)
                .map(str::to_owned)
                .collect(),
        }
    }

    /// Number of tokens.
    pub fn argc(&self) -> usize {
        self.argv.len()
    }

    /// All tokens in order.
    pub fn argv(&self) -> &[String] {
        &self.argv
    }

    /// Token at `index`, if present.
    pub fn arg(&self, index: usize) -> Option<&str> {
        self.argv.get(index).map(String::as_str)
    }

    /// The message type discriminator (first token).
    pub fn message_type(&self) -> Option<&str> {
        self.arg(0)
    }

    /// Parse the token at `index` as a base-10 number.
    pub fn number<T: FromStr>(&self, index: usize) -> Result<T> {
        let token = self
            .arg(index)
            .ok_or_else(|| Error::Protocol(format!("missing field {index} in '{self}'")))?;
        token
            .parse()
            .map_err(|_| Error::Protocol(format!("field {index} is not a number: '{token}'")))
    }

    /// Device error code carried by an `E <code>` frame.
    pub fn device_error(&self) -> Option<Result<ErrorCode>> {
        if self.argc() == 2 && self.message_type() == Some(ERROR_DISCRIMINATOR) {
            Some(self.number::<u32>(1).map(ErrorCode::from_code))
        } else {
            None
        }
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.argv.join(" "))
    }
}

/// Response shape expected for a command family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Family {
    /// `V i v`: echo only.
    Set,
    /// `V i`: echo and value.
    Get,
    /// `M`, `M n`, `G`: echo and eight readings.
    Measurement,
    /// `C`, `C 0`: echo and four levelling records.
    Levelling,
    /// `Y`: echo and flag word.
    Selftest,
    /// `F`, `S`, `R` and raw commands: leading echo, any arity.
    Ack,
}

impl Family {
    /// Exact token count of a successful response, if fixed.
    #[must_use]
    pub fn arity(self) -> Option<usize> {
        match self {
            Self::Set => Some(1),
            Self::Get => Some(2),
            Self::Measurement => Some(9),
            Self::Levelling => Some(17),
            Self::Selftest => Some(2),
            Self::Ack => None,
        }
    }

    /// Classify a command string by its grammar.
    #[must_use]
    pub fn of(command: &str) -> Self {
        let mut parts = command.split_whitespace();
        match (parts.next(), parts.count()) {
            (Some("V"), 1) => Self::Get,
            (Some("V"), n) if n >= 2 => Self::Set,
            (Some("M" | "G"), _) => Self::Measurement,
            (Some("C"), _) => Self::Levelling,
            (Some("Y"), 0) => Self::Selftest,
            _ => Self::Ack,
        }
    }
}

/// Check a response against the command that produced it.
///
/// An `E <code>` frame yields [`Error::Device`] whatever the command was. A
/// response echoing the command's first character must then match the
/// family's arity, otherwise [`Error::Protocol`]. Anything else is
/// [`Error::Response`].
pub fn interpret<'a>(command: &str, response: &'a Response, family: Family) -> Result<&'a Response> {
    if let Some(code) = response.device_error() {
        return Err(Error::Device(code?));
    }

    let echoed = match (command.chars().next(), response.message_type()) {
        (Some(expected), Some(first)) => first.starts_with(expected),
        _ => false,
    };
    if !echoed {
        return Err(Error::Response(format!(
            "'{response}' does not answer '{command}'"
        )));
    }

    match family.arity() {
        Some(expected) if response.argc() != expected => Err(Error::Protocol(format!(
            "'{command}' expects {expected} tokens, got {}",
            response.argc()
        ))),
        _ => Ok(response),
    }
}
