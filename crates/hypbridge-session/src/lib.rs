//! Session management for the hypbridge protocol.
//!
//! [`Session`] is the client the program under test drives: it lazily opens
//! both pipes, sends one command at a time and blocks for its result.
//! [`Responder`] is the generator side of the same exchange.
//!
//! A session is strictly request/response with no correlation ids, so it is
//! driven through `&mut self` only. Share it across threads only behind a
//! lock held for the whole call.

pub mod config;
pub mod connector;
pub mod error;
mod handle;
pub mod responder;
pub mod session;

pub use config::{
    SessionConfig, COMMANDS_PIPE_ENV, LEGACY_COMMANDS_PIPE_ENV, LEGACY_RESULTS_PIPE_ENV,
    READ_TIMEOUT_ENV, RESULTS_PIPE_ENV,
};
#[cfg(unix)]
pub use connector::{connect, connect_from_env, FifoConnector};
pub use connector::PipeConnector;
pub use error::{ProtocolViolation, Result, SessionError};
pub use responder::{Exchange, Generator, ReplayGenerator, Responder, Transcript};
pub use session::{Session, SessionState};
