use std::io::{ErrorKind, Write};

use bytes::BytesMut;
use tracing::trace;

use crate::codec::{encode_frame, encode_result, validate_command_text, ACK, RESULT_SIZE};
use crate::command::{Command, START_PREFIX};
use crate::error::{FrameError, Result};

const INITIAL_BUFFER_CAPACITY: usize = 1 + crate::codec::MAX_COMMAND_LEN;

/// Writes command frames to the command pipe.
///
/// Holds the single outgoing frame buffer; it is overwritten by every send.
/// Every frame is flushed before `send_*` returns.
pub struct CommandWriter<T> {
    inner: T,
    buf: BytesMut,
}

impl<T: Write> CommandWriter<T> {
    /// Create a new command writer.
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
        }
    }

    /// Send a command.
    pub fn send(&mut self, command: &Command) -> Result<()> {
        match command {
            Command::Start(label) => self.send_start(label),
            other => self.send_command(other.name()),
        }
    }

    /// Frame and send raw command text (blocking).
    ///
    /// The text must be non-empty, NUL-free and at most 255 bytes. A violation
    /// is reported before anything is written.
    pub fn send_command(&mut self, text: &str) -> Result<()> {
        validate_command_text(text)?;

        self.buf.clear();
        encode_frame(text.as_bytes(), &mut self.buf)?;
        trace!(command = text, "sending command");
        self.write_buffered()
    }

    /// Send `START <label>` (blocking).
    pub fn send_start(&mut self, label: &str) -> Result<()> {
        if label.is_empty() {
            return Err(FrameError::EmptyLabel);
        }

        let mut text = String::with_capacity(START_PREFIX.len() + label.len());
        text.push_str(START_PREFIX);
        text.push_str(label);
        self.send_command(&text)
    }

    fn write_buffered(&mut self) -> Result<()> {
        write_all_retrying(&mut self.inner, &self.buf)?;
        flush_retrying(&mut self.inner)
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the writer and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }
}

/// Writes results to the result pipe. Used on the generator side.
pub struct ResultWriter<T> {
    inner: T,
}

impl<T: Write> ResultWriter<T> {
    /// Create a new result writer.
    pub fn new(inner: T) -> Self {
        Self { inner }
    }

    /// Write one big-endian result value and flush (blocking).
    pub fn write_result(&mut self, value: u32) -> Result<()> {
        let mut buf = BytesMut::with_capacity(RESULT_SIZE);
        encode_result(value, &mut buf);
        trace!(value, "writing result");
        write_all_retrying(&mut self.inner, &buf)?;
        flush_retrying(&mut self.inner)
    }

    /// Acknowledge the last command.
    pub fn ack(&mut self) -> Result<()> {
        self.write_result(ACK)
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Consume the writer and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }
}

fn write_all_retrying<W: Write>(inner: &mut W, bytes: &[u8]) -> Result<()> {
    let mut offset = 0usize;
    while offset < bytes.len() {
        match inner.write(&bytes[offset..]) {
            Ok(0) => return Err(FrameError::ConnectionClosed),
            Ok(n) => offset += n,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
            Err(err) => return Err(FrameError::Io(err)),
        }
    }
    Ok(())
}

fn flush_retrying<W: Write>(inner: &mut W) -> Result<()> {
    loop {
        match inner.flush() {
            Ok(()) => return Ok(()),
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
            Err(err) => return Err(FrameError::Io(err)),
        }
    }
}
