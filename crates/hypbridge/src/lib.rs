//! Client bridge to an external test-case generator over two named pipes.
//!
//! A program under test asks the generator for random values and marks where
//! each example starts and ends. Commands travel as 1-byte length-prefixed
//! text on one pipe; every command is answered by a 4-byte big-endian result
//! on the other.
//!
//! # Crate Structure
//!
//! - [`transport`]: FIFO streams, `mkfifo`, temporary FIFO pairs
//! - [`frame`]: command and result codecs with blocking readers and writers
//! - [`session`]: the client [`Session`](session::Session) state machine and
//!   the generator-side [`Responder`](session::Responder)

/// Re-export transport types.
pub mod transport {
    pub use hypbridge_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use hypbridge_frame::*;
}

/// Re-export session types.
pub mod session {
    pub use hypbridge_session::*;
}
