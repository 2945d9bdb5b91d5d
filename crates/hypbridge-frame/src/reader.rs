use std::io::{ErrorKind, Read};

use bytes::{Bytes, BytesMut};
#[cfg(unix)]
use hypbridge_transport::PipeStream;
use tracing::trace;

use crate::codec::{decode_frame, decode_result, ACK, RESULT_SIZE};
use crate::command::Command;
use crate::error::{FrameError, Result};

const INITIAL_BUFFER_CAPACITY: usize = 512;
const READ_CHUNK_SIZE: usize = 256;

/// Reads fixed-width results from the result pipe.
///
/// Reads exactly [`RESULT_SIZE`] bytes per result and never more, so a
/// misbehaving peer cannot make one read swallow the next answer.
pub struct ResultReader<T> {
    inner: T,
}

impl<T: Read> ResultReader<T> {
    /// Create a new result reader.
    pub fn new(inner: T) -> Self {
        Self { inner }
    }

    /// Read the next result (blocking), most significant byte first.
    ///
    /// Returns `Err(FrameError::ConnectionClosed)` if the peer closes the pipe
    /// before all four bytes arrive.
    pub fn read_result(&mut self) -> Result<u32> {
        let mut bytes = [0u8; RESULT_SIZE];
        let mut filled = 0usize;
        while filled < RESULT_SIZE {
            match self.inner.read(&mut bytes[filled..]) {
                Ok(0) => return Err(FrameError::ConnectionClosed),
                Ok(n) => filled += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }

        let value = decode_result(bytes);
        trace!(value, "read result");
        Ok(value)
    }

    /// Read the next result and report whether it is an acknowledgment.
    ///
    /// Returns the raw value so callers can report what the peer sent instead.
    pub fn read_ack(&mut self) -> Result<std::result::Result<(), u32>> {
        let value = self.read_result()?;
        Ok(if value == ACK { Ok(()) } else { Err(value) })
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }
}

#[cfg(unix)]
impl ResultReader<PipeStream> {
    /// Create a result reader for a pipe and apply a read timeout to it.
    pub fn with_read_timeout(
        mut inner: PipeStream,
        read_timeout: Option<std::time::Duration>,
    ) -> Result<Self> {
        inner
            .set_read_timeout(read_timeout)
            .map_err(transport_to_frame_error)?;
        Ok(Self::new(inner))
    }
}

/// Reads command frames from the command pipe. Used on the generator side.
pub struct CommandReader<T> {
    inner: T,
    buf: BytesMut,
}

impl<T: Read> CommandReader<T> {
    /// Create a new command reader.
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
        }
    }

    /// Read the raw text of the next command frame (blocking).
    ///
    /// Returns `Err(FrameError::ConnectionClosed)` when EOF is reached.
    pub fn read_text(&mut self) -> Result<Bytes> {
        loop {
            if let Some(text) = decode_frame(&mut self.buf)? {
                return Ok(text);
            }

            let mut chunk = [0u8; READ_CHUNK_SIZE];
            let read = match self.inner.read(&mut chunk) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            };

            if read == 0 {
                return Err(FrameError::ConnectionClosed);
            }

            self.buf.extend_from_slice(&chunk[..read]);
        }
    }

    /// Read and parse the next command (blocking).
    pub fn read_command(&mut self) -> Result<Command> {
        let text = self.read_text()?;
        let text = std::str::from_utf8(&text).map_err(|_| FrameError::InvalidUtf8)?;
        let command = Command::parse(text)?;
        trace!(%command, "read command");
        Ok(command)
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }
}

#[cfg(unix)]
fn transport_to_frame_error(err: hypbridge_transport::TransportError) -> FrameError {
    match err {
        hypbridge_transport::TransportError::Io(io) => FrameError::Io(io),
        hypbridge_transport::TransportError::Open { source, .. }
        | hypbridge_transport::TransportError::CreateFifo { source, .. } => FrameError::Io(source),
        other => FrameError::Io(std::io::Error::other(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use bytes::BytesMut;

    use super::*;
    use crate::codec::{encode_frame, encode_result};

    #[test]
    fn read_big_endian_results() {
        let bytes = vec![0x00, 0x00, 0x00, 0x2A, 0xFF, 0xFF, 0xFF, 0xFF];
        let mut reader = ResultReader::new(Cursor::new(bytes));

        assert_eq!(reader.read_result().unwrap(), 42);
        assert_eq!(reader.read_result().unwrap(), 4_294_967_295);
    }

    #[test]
    fn read_ack_distinguishes_nonzero() {
        let bytes = vec![0, 0, 0, 0, 0, 0, 0, 1];
        let mut reader = ResultReader::new(Cursor::new(bytes));

        assert_eq!(reader.read_ack().unwrap(), Ok(()));
        assert_eq!(reader.read_ack().unwrap(), Err(1));
    }

    #[test]
    fn result_assembled_from_single_bytes() {
        let mut reader = ResultReader::new(ByteByByteReader {
            bytes: vec![0x12, 0x34, 0x56, 0x78],
            pos: 0,
        });
        assert_eq!(reader.read_result().unwrap(), 0x1234_5678);
    }

    #[test]
    fn result_reader_consumes_exactly_four_bytes() {
        let mut reader = ResultReader::new(Cursor::new(vec![0, 0, 0, 7, 9, 9]));
        assert_eq!(reader.read_result().unwrap(), 7);
        assert_eq!(reader.get_ref().position(), 4);
    }

    #[test]
    fn result_closed_mid_value() {
        let mut reader = ResultReader::new(Cursor::new(vec![0, 0]));
        let err = reader.read_result().unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
    }

    #[test]
    fn result_interrupted_read_retries() {
        let mut reader = ResultReader::new(InterruptedThenData {
            state: 0,
            bytes: vec![0, 0, 1, 0],
            pos: 0,
        });
        assert_eq!(reader.read_result().unwrap(), 256);
    }

    #[test]
    fn result_timeout_propagates_io_error() {
        let mut reader = ResultReader::new(TimedOutReader);
        let err = reader.read_result().unwrap_err();
        assert!(matches!(err, FrameError::Io(e) if e.kind() == ErrorKind::TimedOut));
    }

    #[test]
    fn read_commands_in_order() {
        let mut wire = BytesMut::new();
        encode_frame(b"START ex1", &mut wire).unwrap();
        encode_frame(b"RAND", &mut wire).unwrap();
        encode_frame(b"END", &mut wire).unwrap();
        encode_frame(b"TERMINATE", &mut wire).unwrap();

        let mut reader = CommandReader::new(Cursor::new(wire.to_vec()));
        assert_eq!(reader.read_command().unwrap(), Command::start("ex1"));
        assert_eq!(reader.read_command().unwrap(), Command::Rand);
        assert_eq!(reader.read_command().unwrap(), Command::End);
        assert_eq!(reader.read_command().unwrap(), Command::Terminate);
        assert!(matches!(
            reader.read_command(),
            Err(FrameError::ConnectionClosed)
        ));
    }

    #[test]
    fn command_partial_read_handling() {
        let mut wire = BytesMut::new();
        encode_frame(b"START slow", &mut wire).unwrap();

        let mut reader = CommandReader::new(ByteByByteReader {
            bytes: wire.to_vec(),
            pos: 0,
        });
        assert_eq!(reader.read_command().unwrap(), Command::start("slow"));
    }

    #[test]
    fn command_closed_mid_frame() {
        let mut reader = CommandReader::new(Cursor::new(vec![9, b'T', b'E']));
        assert!(matches!(
            reader.read_text(),
            Err(FrameError::ConnectionClosed)
        ));
    }

    #[test]
    fn command_rejects_unknown_text() {
        let mut wire = BytesMut::new();
        encode_frame(b"PING", &mut wire).unwrap();
        let mut reader = CommandReader::new(Cursor::new(wire.to_vec()));
        assert!(matches!(
            reader.read_command(),
            Err(FrameError::UnknownCommand(text)) if text == "PING"
        ));
    }

    #[test]
    fn command_rejects_invalid_utf8() {
        let mut wire = BytesMut::new();
        encode_frame(&[0xC3, 0x28], &mut wire).unwrap();
        let mut reader = CommandReader::new(Cursor::new(wire.to_vec()));
        assert!(matches!(reader.read_command(), Err(FrameError::InvalidUtf8)));
    }

    #[test]
    #[cfg(unix)]
    fn roundtrip_over_socket_pair() {
        let (left, right) = std::os::unix::net::UnixStream::pair().unwrap();
        let mut results = crate::writer::ResultWriter::new(left);
        let mut reader = ResultReader::new(right);

        results.write_result(7).unwrap();
        results.ack().unwrap();

        assert_eq!(reader.read_result().unwrap(), 7);
        assert_eq!(reader.read_ack().unwrap(), Ok(()));
    }

    #[test]
    fn encoded_result_reads_back() {
        let mut wire = BytesMut::new();
        encode_result(0xDEAD_BEEF, &mut wire);
        let mut reader = ResultReader::new(Cursor::new(wire.to_vec()));
        assert_eq!(reader.read_result().unwrap(), 0xDEAD_BEEF);
    }

    #[derive(Debug)]
    struct ByteByByteReader {
        bytes: Vec<u8>,
        pos: usize,
    }

    impl Read for ByteByByteReader {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.pos >= self.bytes.len() || buf.is_empty() {
                return Ok(0);
            }

            buf[0] = self.bytes[self.pos];
            self.pos += 1;
            Ok(1)
        }
    }

    struct InterruptedThenData {
        state: u8,
        bytes: Vec<u8>,
        pos: usize,
    }

    impl Read for InterruptedThenData {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.state == 0 {
                self.state = 1;
                return Err(std::io::Error::from(ErrorKind::Interrupted));
            }
            if self.pos >= self.bytes.len() {
                return Ok(0);
            }
            let remaining = self.bytes.len() - self.pos;
            let n = remaining.min(buf.len());
            buf[..n].copy_from_slice(&self.bytes[self.pos..self.pos + n]);
            self.pos += n;
            Ok(n)
        }
    }

    struct TimedOutReader;

    impl Read for TimedOutReader {
        fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
            Err(std::io::Error::from(ErrorKind::TimedOut))
        }
    }
}
