use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Read, Write};
use std::os::fd::AsRawFd;
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tracing::debug;

use crate::error::{Result, TransportError};

/// Which end of a pipe a [`PipeStream`] holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipeDirection {
    Read,
    Write,
}

impl PipeDirection {
    fn as_str(self) -> &'static str {
        match self {
            PipeDirection::Read => "reading",
            PipeDirection::Write => "writing",
        }
    }
}

const OPEN_RETRY_INTERVAL: Duration = Duration::from_millis(5);

/// One open end of a named pipe.
///
/// Reads block until data arrives or every writer has closed the pipe (EOF).
/// An optional read timeout bounds the wait; it is enforced with `poll(2)`
/// before each read since FIFOs have no `SO_RCVTIMEO`. The timeout applies to
/// each `read` call separately, so a peer trickling bytes can stretch a
/// multi-byte read past it as long as every gap stays under the timeout.
pub struct PipeStream {
    file: File,
    path: PathBuf,
    direction: PipeDirection,
    read_timeout: Option<Duration>,
}

impl PipeStream {
    /// Open the read end of a pipe.
    ///
    /// On a FIFO this blocks until a writer opens the other end.
    pub fn open_read(path: impl AsRef<Path>) -> Result<Self> {
        Self::open(path.as_ref(), PipeDirection::Read)
    }

    /// Open the write end of a pipe.
    ///
    /// On a FIFO this blocks until a reader opens the other end. The path is
    /// never created.
    pub fn open_write(path: impl AsRef<Path>) -> Result<Self> {
        Self::open(path.as_ref(), PipeDirection::Write)
    }

    /// Open the read end of a pipe, bounding every later read by `timeout`.
    ///
    /// With a timeout the open itself never blocks: the FIFO is opened
    /// non-blocking and the wait for a writer moves into the first read, where
    /// `poll(2)` bounds it. `None` behaves like [`open_read`](Self::open_read).
    pub fn open_read_timeout(path: impl AsRef<Path>, timeout: Option<Duration>) -> Result<Self> {
        match timeout {
            None => Self::open_read(path),
            Some(timeout) => {
                let mut stream = Self::open_within(path.as_ref(), PipeDirection::Read, timeout)?;
                stream.set_read_timeout(Some(timeout))?;
                Ok(stream)
            }
        }
    }

    /// Open the write end of a pipe, waiting at most `timeout` for a reader.
    ///
    /// Fails with [`TransportError::OpenTimeout`] if no reader shows up in
    /// time. `None` behaves like [`open_write`](Self::open_write).
    pub fn open_write_timeout(path: impl AsRef<Path>, timeout: Option<Duration>) -> Result<Self> {
        match timeout {
            None => Self::open_write(path),
            Some(timeout) => Self::open_within(path.as_ref(), PipeDirection::Write, timeout),
        }
    }

    fn open(path: &Path, direction: PipeDirection) -> Result<Self> {
        let mut options = OpenOptions::new();
        match direction {
            PipeDirection::Read => options.read(true),
            PipeDirection::Write => options.write(true),
        };

        let file = options.open(path).map_err(|source| TransportError::Open {
            path: path.to_path_buf(),
            direction: direction.as_str(),
            source,
        })?;
        debug!(?path, ?direction, "opened pipe");

        Ok(Self {
            file,
            path: path.to_path_buf(),
            direction,
            read_timeout: None,
        })
    }

    /// Open non-blocking, retrying while the FIFO has no reader, then switch
    /// the descriptor back to blocking mode.
    fn open_within(path: &Path, direction: PipeDirection, timeout: Duration) -> Result<Self> {
        let deadline = Instant::now() + timeout;
        let mut options = OpenOptions::new();
        match direction {
            PipeDirection::Read => options.read(true),
            PipeDirection::Write => options.write(true),
        };
        options.custom_flags(libc::O_NONBLOCK);

        let file = loop {
            match options.open(path) {
                Ok(file) => break file,
                // ENXIO: write end of a FIFO nobody is reading yet.
                Err(err) if err.raw_os_error() == Some(libc::ENXIO) => {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    if remaining.is_zero() {
                        return Err(TransportError::OpenTimeout {
                            path: path.to_path_buf(),
                            direction: direction.as_str(),
                            timeout,
                        });
                    }
                    std::thread::sleep(remaining.min(OPEN_RETRY_INTERVAL));
                }
                Err(source) => {
                    return Err(TransportError::Open {
                        path: path.to_path_buf(),
                        direction: direction.as_str(),
                        source,
                    })
                }
            }
        };
        clear_nonblocking(&file)?;
        debug!(?path, ?direction, ?timeout, "opened pipe");

        Ok(Self {
            file,
            path: path.to_path_buf(),
            direction,
            read_timeout: None,
        })
    }

    /// Set the read timeout. `None` blocks indefinitely.
    ///
    /// A zero duration is rejected, matching `std::net` socket semantics.
    pub fn set_read_timeout(&mut self, timeout: Option<Duration>) -> Result<()> {
        if timeout == Some(Duration::ZERO) {
            return Err(TransportError::Io(std::io::Error::new(
                ErrorKind::InvalidInput,
                "cannot set a 0 duration timeout",
            )));
        }
        self.read_timeout = timeout;
        Ok(())
    }

    /// Current read timeout.
    pub fn read_timeout(&self) -> Option<Duration> {
        self.read_timeout
    }

    /// The filesystem path this stream was opened from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Which end of the pipe this stream holds.
    pub fn direction(&self) -> PipeDirection {
        self.direction
    }
}

impl Read for PipeStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        if let Some(timeout) = self.read_timeout {
            wait_readable(&self.file, timeout)?;
        }
        self.file.read(buf)
    }
}

impl Write for PipeStream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.file.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.file.flush()
    }
}

impl std::fmt::Debug for PipeStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipeStream")
            .field("path", &self.path)
            .field("direction", &self.direction)
            .field("read_timeout", &self.read_timeout)
            .finish()
    }
}

fn clear_nonblocking(file: &File) -> std::io::Result<()> {
    let fd = file.as_raw_fd();
    // SAFETY: `fd` belongs to `file`, which stays open for both calls.
    let flags = unsafe { libc::fcntl(fd, libc::F_GETFL) };
    if flags < 0 {
        return Err(std::io::Error::last_os_error());
    }
    // SAFETY: As above.
    if unsafe { libc::fcntl(fd, libc::F_SETFL, flags & !libc::O_NONBLOCK) } < 0 {
        return Err(std::io::Error::last_os_error());
    }
    Ok(())
}

/// Wait until `file` is readable (data or hang-up) or `timeout` elapses.
fn wait_readable(file: &File, timeout: Duration) -> std::io::Result<()> {
    let deadline = Instant::now() + timeout;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(std::io::Error::new(
                ErrorKind::TimedOut,
                format!("no data on pipe within {timeout:?}"),
            ));
        }

        let mut pfd = libc::pollfd {
            fd: file.as_raw_fd(),
            events: libc::POLLIN,
            revents: 0,
        };
        let millis = remaining.as_millis().clamp(1, libc::c_int::MAX as u128) as libc::c_int;

        // SAFETY: `pfd` is a valid, writable pollfd and we pass a count of exactly one.
        let rc = unsafe { libc::poll(&mut pfd, 1, millis) };
        if rc < 0 {
            let err = std::io::Error::last_os_error();
            if err.kind() == ErrorKind::Interrupted {
                continue;
            }
            return Err(err);
        }
        if rc > 0 {
            // POLLIN or POLLHUP: let the read itself report data or EOF.
            return Ok(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fifo::create_fifo;

    fn temp_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "hypbridge-pipe-{tag}-{}-{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .expect("time should be after epoch")
                .as_nanos()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn open_missing_path_reports_open_error() {
        let dir = temp_dir("missing");
        let err = PipeStream::open_write(dir.join("absent")).unwrap_err();
        assert!(matches!(
            err,
            TransportError::Open {
                direction: "writing",
                ..
            }
        ));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn write_end_does_not_create_path() {
        let dir = temp_dir("nocreate");
        let path = dir.join("absent");
        let _ = PipeStream::open_write(&path);
        assert!(!path.exists());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn zero_read_timeout_rejected() {
        let dir = temp_dir("zero");
        let path = dir.join("plain");
        std::fs::write(&path, b"").unwrap();

        let mut stream = PipeStream::open_read(&path).unwrap();
        assert!(stream.set_read_timeout(Some(Duration::ZERO)).is_err());
        assert_eq!(stream.read_timeout(), None);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn fifo_roundtrip() {
        let dir = temp_dir("roundtrip");
        let path = dir.join("fifo");
        create_fifo(&path, 0o600).unwrap();

        let writer_path = path.clone();
        let writer = std::thread::spawn(move || {
            let mut stream = PipeStream::open_write(&writer_path).unwrap();
            assert_eq!(stream.direction(), PipeDirection::Write);
            stream.write_all(b"ping").unwrap();
            stream.flush().unwrap();
        });

        let mut reader = PipeStream::open_read(&path).unwrap();
        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();
        assert_eq!(out, b"ping");

        writer.join().unwrap();
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn fifo_read_times_out_when_writer_is_silent() {
        let dir = temp_dir("timeout");
        let path = dir.join("fifo");
        create_fifo(&path, 0o600).unwrap();

        let (done_tx, done_rx) = std::sync::mpsc::channel::<()>();
        let writer_path = path.clone();
        let writer = std::thread::spawn(move || {
            let _stream = PipeStream::open_write(&writer_path).unwrap();
            let _ = done_rx.recv();
        });

        let mut reader = PipeStream::open_read(&path).unwrap();
        reader
            .set_read_timeout(Some(Duration::from_millis(20)))
            .unwrap();
        let mut buf = [0u8; 4];
        let err = reader.read(&mut buf).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TimedOut);

        done_tx.send(()).unwrap();
        writer.join().unwrap();
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn open_write_timeout_gives_up_without_reader() {
        let dir = temp_dir("open-timeout");
        let path = dir.join("fifo");
        create_fifo(&path, 0o600).unwrap();

        let started = Instant::now();
        let err = PipeStream::open_write_timeout(&path, Some(Duration::from_millis(50)))
            .unwrap_err();
        assert!(matches!(
            err,
            TransportError::OpenTimeout {
                direction: "writing",
                ..
            }
        ));
        assert!(started.elapsed() < Duration::from_secs(5));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn open_write_timeout_waits_for_late_reader() {
        let dir = temp_dir("late-reader");
        let path = dir.join("fifo");
        create_fifo(&path, 0o600).unwrap();

        let reader_path = path.clone();
        let reader = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(30));
            let mut stream = PipeStream::open_read(&reader_path).unwrap();
            let mut out = Vec::new();
            stream.read_to_end(&mut out).unwrap();
            out
        });

        let mut writer =
            PipeStream::open_write_timeout(&path, Some(Duration::from_secs(10))).unwrap();
        writer.write_all(b"late").unwrap();
        drop(writer);

        assert_eq!(reader.join().unwrap(), b"late");
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn open_read_timeout_returns_without_writer_and_read_times_out() {
        let dir = temp_dir("no-writer");
        let path = dir.join("fifo");
        create_fifo(&path, 0o600).unwrap();

        let started = Instant::now();
        let mut reader =
            PipeStream::open_read_timeout(&path, Some(Duration::from_millis(50))).unwrap();
        assert_eq!(reader.read_timeout(), Some(Duration::from_millis(50)));

        let mut buf = [0u8; 4];
        let err = reader.read(&mut buf).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TimedOut);
        assert!(started.elapsed() < Duration::from_secs(5));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn read_timeout_applies_per_read_call() {
        let dir = temp_dir("trickle");
        let path = dir.join("fifo");
        create_fifo(&path, 0o600).unwrap();

        let writer_path = path.clone();
        let writer = std::thread::spawn(move || {
            let mut stream = PipeStream::open_write(&writer_path).unwrap();
            for byte in [1u8, 2, 3] {
                stream.write_all(&[byte]).unwrap();
                std::thread::sleep(Duration::from_millis(100));
            }
        });

        let mut reader =
            PipeStream::open_read_timeout(&path, Some(Duration::from_millis(250))).unwrap();
        let mut out = [0u8; 3];
        reader.read_exact(&mut out).unwrap();
        assert_eq!(out, [1, 2, 3]);

        writer.join().unwrap();
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn fifo_read_reports_eof_after_writer_closes() {
        let dir = temp_dir("eof");
        let path = dir.join("fifo");
        create_fifo(&path, 0o600).unwrap();

        let writer_path = path.clone();
        let writer = std::thread::spawn(move || {
            drop(PipeStream::open_write(&writer_path).unwrap());
        });

        let mut reader = PipeStream::open_read(&path).unwrap();
        writer.join().unwrap();
        reader
            .set_read_timeout(Some(Duration::from_secs(5)))
            .unwrap();
        let mut buf = [0u8; 4];
        assert_eq!(reader.read(&mut buf).unwrap(), 0);
        let _ = std::fs::remove_dir_all(&dir);
    }
}
