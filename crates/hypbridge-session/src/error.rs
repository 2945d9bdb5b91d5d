use std::time::Duration;

use hypbridge_frame::FrameError;

use crate::session::SessionState;

/// A broken protocol contract. Always fatal to the session.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolViolation {
    /// Command text does not fit the 1-byte length prefix.
    #[error("command text too long ({len} bytes, max {max})")]
    CommandTooLong { len: usize, max: usize },

    /// Command text is empty, contains NUL, or has an empty label.
    #[error("invalid command text: {0}")]
    InvalidCommand(String),

    /// The peer answered a command with something other than `0`.
    #[error("{command} not acknowledged (peer answered {code})")]
    NotAcknowledged { command: &'static str, code: u32 },

    /// The peer closed the result pipe before a full result arrived.
    #[error("peer closed the result pipe mid-session")]
    PeerClosed,
}

/// Errors that can occur in session operations.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// No path is configured for one of the pipes.
    #[error("no {channel} pipe configured (set {var})")]
    Unconfigured {
        channel: &'static str,
        var: &'static str,
    },

    /// Transport-level error, typically failing to open a pipe.
    #[error("transport error: {0}")]
    Transport(#[from] hypbridge_transport::TransportError),

    /// Frame-level I/O error.
    #[error("frame error: {0}")]
    Frame(FrameError),

    /// The client or peer broke the protocol.
    #[error("protocol violation: {0}")]
    Violation(#[from] ProtocolViolation),

    /// No result arrived within the configured read timeout.
    #[error("result read timed out after {0:?}")]
    Timeout(Duration),

    /// The operation is not valid in the session's current state.
    #[error("session is {state}, expected active")]
    NotActive { state: SessionState },

    /// The client hung up on a responder before sending `TERMINATE`.
    #[error("client disconnected: {0}")]
    Disconnected(String),
}

impl SessionError {
    /// The violation kind, if this error is a protocol violation.
    pub fn violation(&self) -> Option<&ProtocolViolation> {
        match self {
            SessionError::Violation(violation) => Some(violation),
            _ => None,
        }
    }
}

impl From<FrameError> for SessionError {
    fn from(err: FrameError) -> Self {
        match err {
            FrameError::CommandTooLong { len, max } => {
                ProtocolViolation::CommandTooLong { len, max }.into()
            }
            FrameError::EmptyCommand
            | FrameError::EmbeddedNul { .. }
            | FrameError::EmptyLabel => ProtocolViolation::InvalidCommand(err.to_string()).into(),
            FrameError::ConnectionClosed => ProtocolViolation::PeerClosed.into(),
            other => SessionError::Frame(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, SessionError>;
