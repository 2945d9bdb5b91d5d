use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};

/// Command frame header: a single length byte.
pub const LENGTH_PREFIX_SIZE: usize = 1;

/// Longest command text a 1-byte length prefix can describe.
pub const MAX_COMMAND_LEN: usize = u8::MAX as usize;

/// Every result is exactly one big-endian `u32`.
pub const RESULT_SIZE: usize = 4;

/// Result value that acknowledges a non-`RAND` command.
pub const ACK: u32 = 0;

/// Encode command text into the wire format.
///
/// Wire format:
/// ```text
/// ┌──────────┬──────────────────────┐
/// │ N (1B)   │ text (N bytes)       │
/// │ 0..=255  │ no terminator        │
/// └──────────┴──────────────────────┘
/// ```
///
/// Text longer than [`MAX_COMMAND_LEN`] is rejected, never truncated.
pub fn encode_frame(text: &[u8], dst: &mut BytesMut) -> Result<()> {
    let len = u8::try_from(text.len()).map_err(|_| FrameError::CommandTooLong {
        len: text.len(),
        max: MAX_COMMAND_LEN,
    })?;
    dst.reserve(LENGTH_PREFIX_SIZE + text.len());
    dst.put_u8(len);
    dst.put_slice(text);
    Ok(())
}

/// Decode one command frame from a buffer.
///
/// Returns `Ok(None)` if the buffer doesn't contain a complete frame yet.
/// On success, consumes the frame bytes from the buffer.
pub fn decode_frame(src: &mut BytesMut) -> Result<Option<Bytes>> {
    let Some(&len) = src.first() else {
        return Ok(None);
    };
    let total = LENGTH_PREFIX_SIZE + len as usize;
    if src.len() < total {
        return Ok(None);
    }

    src.advance(LENGTH_PREFIX_SIZE);
    Ok(Some(src.split_to(len as usize).freeze()))
}

/// Check the client-side preconditions on command text: non-empty, no NUL
/// bytes, and short enough for the length prefix.
pub fn validate_command_text(text: &str) -> Result<()> {
    if text.is_empty() {
        return Err(FrameError::EmptyCommand);
    }
    if text.len() > MAX_COMMAND_LEN {
        return Err(FrameError::CommandTooLong {
            len: text.len(),
            max: MAX_COMMAND_LEN,
        });
    }
    if let Some(offset) = text.bytes().position(|b| b == 0) {
        return Err(FrameError::EmbeddedNul { offset });
    }
    Ok(())
}

/// Encode a result value (big-endian).
pub fn encode_result(value: u32, dst: &mut BytesMut) {
    dst.reserve(RESULT_SIZE);
    dst.put_u32(value);
}

/// Decode a result value from exactly [`RESULT_SIZE`] bytes, most
/// significant byte first.
pub fn decode_result(bytes: [u8; RESULT_SIZE]) -> u32 {
    u32::from_be_bytes(bytes)
}
