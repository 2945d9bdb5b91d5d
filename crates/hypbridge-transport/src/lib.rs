//! Named-pipe transport for hypbridge.
//!
//! The bridge talks to its generator over two FIFOs, one per direction.
//! This is the lowest layer: it opens either end of a FIFO as a
//! [`PipeStream`] and can create FIFO pairs for the peer side and tests.

pub mod error;

#[cfg(unix)]
pub mod fifo;
#[cfg(unix)]
pub mod pipe;

pub use error::{Result, TransportError};

#[cfg(unix)]
pub use fifo::{create_fifo, is_fifo, FifoPair, DEFAULT_FIFO_MODE};
#[cfg(unix)]
pub use pipe::{PipeDirection, PipeStream};
