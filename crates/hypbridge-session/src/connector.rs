use std::io::{Read, Write};
use std::time::Duration;

use hypbridge_frame::{CommandWriter, ResultReader};
#[cfg(unix)]
use hypbridge_transport::{PipeStream, TransportError};

#[cfg(unix)]
use crate::config::{SessionConfig, COMMANDS_PIPE_ENV, RESULTS_PIPE_ENV};
use crate::error::Result;
#[cfg(unix)]
use crate::error::SessionError;
#[cfg(unix)]
use crate::session::Session;

/// Opens the two pipe endpoints a [`Session`](crate::Session) talks over.
///
/// Each method is called at most once per session, on first use of that
/// direction.
pub trait PipeConnector {
    /// Stream commands are written to.
    type Commands: Write;
    /// Stream results are read from.
    type Results: Read;

    /// Open the outbound command endpoint.
    fn open_commands(&mut self) -> Result<CommandWriter<Self::Commands>>;

    /// Open the inbound result endpoint.
    fn open_results(&mut self) -> Result<ResultReader<Self::Results>>;

    /// Timeout applied to pipe opens and result reads, reported in timeout
    /// errors.
    fn read_timeout(&self) -> Option<Duration> {
        None
    }
}

/// Connects to the named pipes described by a [`SessionConfig`].
#[cfg(unix)]
#[derive(Debug, Clone)]
pub struct FifoConnector {
    config: SessionConfig,
}

#[cfg(unix)]
impl FifoConnector {
    pub fn new(config: SessionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }
}

#[cfg(unix)]
impl PipeConnector for FifoConnector {
    type Commands = PipeStream;
    type Results = PipeStream;

    fn open_commands(&mut self) -> Result<CommandWriter<PipeStream>> {
        let path = self
            .config
            .commands_path
            .as_ref()
            .ok_or(SessionError::Unconfigured {
                channel: "commands",
                var: COMMANDS_PIPE_ENV,
            })?;
        let stream = PipeStream::open_write_timeout(path, self.config.read_timeout)
            .map_err(open_error)?;
        Ok(CommandWriter::new(stream))
    }

    fn open_results(&mut self) -> Result<ResultReader<PipeStream>> {
        let path = self
            .config
            .results_path
            .as_ref()
            .ok_or(SessionError::Unconfigured {
                channel: "results",
                var: RESULTS_PIPE_ENV,
            })?;
        let stream =
            PipeStream::open_read_timeout(path, self.config.read_timeout).map_err(open_error)?;
        Ok(ResultReader::with_read_timeout(
            stream,
            self.config.read_timeout,
        )?)
    }

    fn read_timeout(&self) -> Option<Duration> {
        self.config.read_timeout
    }
}

/// A peer that never opens its end is reported like a result that never came.
#[cfg(unix)]
fn open_error(err: TransportError) -> SessionError {
    match err {
        TransportError::OpenTimeout { timeout, .. } => SessionError::Timeout(timeout),
        other => other.into(),
    }
}

/// Create a session over the named pipes in `config`. Performs no I/O.
#[cfg(unix)]
pub fn connect(config: SessionConfig) -> Session<FifoConnector> {
    Session::new(FifoConnector::new(config))
}

/// Create a session over the named pipes named by the environment.
#[cfg(unix)]
pub fn connect_from_env() -> Session<FifoConnector> {
    connect(SessionConfig::from_env())
}

#[cfg(all(test, unix))]
mod tests {
    use std::io::Read;
    use std::path::PathBuf;
    use std::time::Instant;

    use hypbridge_transport::FifoPair;

    use super::*;
    use crate::session::SessionState;

    fn temp_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "hypbridge-conn-{tag}-{}-{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .expect("time should be after epoch")
                .as_nanos()
        ));
        std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
        dir
    }

    #[test]
    fn unset_paths_are_reported_on_open() {
        let mut connector = FifoConnector::new(SessionConfig::default());

        assert!(matches!(
            connector.open_commands(),
            Err(SessionError::Unconfigured {
                var: COMMANDS_PIPE_ENV,
                ..
            })
        ));
        assert!(matches!(
            connector.open_results(),
            Err(SessionError::Unconfigured {
                var: RESULTS_PIPE_ENV,
                ..
            })
        ));
    }

    #[test]
    fn unopenable_path_is_transport_error() {
        let dir = temp_dir("missing");
        let mut connector = FifoConnector::new(
            SessionConfig::default().with_commands_path(dir.join("does-not-exist")),
        );

        assert!(matches!(
            connector.open_commands(),
            Err(SessionError::Transport(_))
        ));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn results_pipe_gets_configured_timeout() {
        let dir = temp_dir("timeout");
        let results = dir.join("results");
        std::fs::write(&results, [0, 0, 0, 9]).expect("results file should be writable");

        let timeout = Some(Duration::from_millis(500));
        let mut connector = FifoConnector::new(
            SessionConfig::default()
                .with_results_path(&results)
                .with_read_timeout(timeout),
        );

        let mut reader = connector.open_results().expect("results should open");
        assert_eq!(reader.get_ref().read_timeout(), timeout);
        assert_eq!(connector.read_timeout(), timeout);
        assert_eq!(reader.read_result().expect("result should decode"), 9);
        let _ = std::fs::remove_dir_all(&dir);
    }

    fn timed_session(pair: &FifoPair, timeout: Duration) -> Session<FifoConnector> {
        let mut session = connect(
            SessionConfig::default()
                .with_commands_path(pair.commands_path())
                .with_results_path(pair.results_path())
                .with_read_timeout(Some(timeout)),
        );
        session.init().expect("init should succeed");
        session
    }

    #[test]
    fn silent_peer_times_out_instead_of_hanging() {
        let pair = FifoPair::temp().expect("fifo pair should be creatable");
        let commands = pair.commands_path().to_path_buf();

        // Reads commands but never opens the result pipe.
        let peer = std::thread::spawn(move || {
            let mut stream = PipeStream::open_read(&commands).expect("commands should open");
            let mut sent = Vec::new();
            let _ = stream.read_to_end(&mut sent);
            sent
        });

        let timeout = Duration::from_millis(200);
        let mut session = timed_session(&pair, timeout);
        let started = Instant::now();
        let err = session.request_random().unwrap_err();

        assert!(matches!(err, SessionError::Timeout(t) if t == timeout));
        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(session.state(), SessionState::Failed);
        assert_eq!(peer.join().expect("peer thread"), b"\x04RAND");
    }

    #[test]
    fn absent_peer_times_out_opening_commands() {
        let pair = FifoPair::temp().expect("fifo pair should be creatable");
        let timeout = Duration::from_millis(100);
        let mut session = timed_session(&pair, timeout);

        let started = Instant::now();
        let err = session.start_example("ex1").unwrap_err();

        assert!(matches!(err, SessionError::Timeout(t) if t == timeout));
        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(!session.commands_open());
        assert!(!session.results_open());
    }
}
