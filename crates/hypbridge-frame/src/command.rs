//! The four commands a client can send.

use std::fmt;

use crate::error::{FrameError, Result};

/// Wire text of the random-value request.
pub const RAND: &str = "RAND";
/// Wire text of the session terminator.
pub const TERMINATE: &str = "TERMINATE";
/// Wire text of the end-of-example marker.
pub const END: &str = "END";
/// Prefix of the start-of-example marker; the label follows it.
pub const START_PREFIX: &str = "START ";

/// A client command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Request a random `u32`. Answered with the value, not an ack.
    Rand,
    /// End the session.
    Terminate,
    /// Begin a labeled example.
    Start(String),
    /// Close the current example.
    End,
}

impl Command {
    /// Build a `START` command. The label is validated when the command is sent.
    pub fn start(label: impl Into<String>) -> Self {
        Command::Start(label.into())
    }

    /// Short command name, without the label.
    pub fn name(&self) -> &'static str {
        match self {
            Command::Rand => RAND,
            Command::Terminate => TERMINATE,
            Command::Start(_) => "START",
            Command::End => END,
        }
    }

    /// Whether the peer answers this command with an acknowledgment (`0`)
    /// rather than a payload value.
    pub fn expects_ack(&self) -> bool {
        !matches!(self, Command::Rand)
    }

    /// Parse wire text received from a client.
    pub fn parse(text: &str) -> Result<Self> {
        match text {
            RAND => Ok(Command::Rand),
            TERMINATE => Ok(Command::Terminate),
            END => Ok(Command::End),
            _ => match text.strip_prefix(START_PREFIX) {
                Some("") => Err(FrameError::EmptyLabel),
                Some(label) => Ok(Command::Start(label.to_string())),
                None => Err(FrameError::UnknownCommand(text.to_string())),
            },
        }
    }
}

impl fmt::Display for Command {
    /// Formats the exact wire text of the command.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Start(label) => write!(f, "{START_PREFIX}{label}"),
            other => f.write_str(other.name()),
        }
    }
}
