//! Command and result framing for the hypbridge wire protocol.
//!
//! Two frame shapes, one per pipe:
//! - Commands: a 1-byte length `N` followed by `N` bytes of ASCII text
//!   (`RAND`, `END`, `TERMINATE`, `START <label>`), no terminator.
//! - Results: a 4-byte big-endian `u32`. For `RAND` it is the drawn value,
//!   for every other command `0` acknowledges it.
//!
//! Writers flush after every frame; readers block until a whole frame is in.

pub mod codec;
pub mod command;
pub mod error;
pub mod reader;
pub mod writer;

pub use codec::{
    decode_frame, decode_result, encode_frame, encode_result, validate_command_text, ACK,
    LENGTH_PREFIX_SIZE, MAX_COMMAND_LEN, RESULT_SIZE,
};
pub use command::Command;
pub use error::{FrameError, Result};
pub use reader::{CommandReader, ResultReader};
pub use writer::{CommandWriter, ResultWriter};
