use std::fmt;
use std::time::Duration;

use hypbridge_frame::{Command, CommandWriter, FrameError, ResultReader, ACK};
use tracing::{debug, trace, warn};

use crate::connector::PipeConnector;
use crate::error::{ProtocolViolation, Result, SessionError};
use crate::handle::Handle;

/// Lifecycle of a [`Session`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Created, `init` not called yet.
    Uninitialized,
    /// Accepting commands.
    Active,
    /// `TERMINATE` was acknowledged and both pipes are closed.
    Terminated,
    /// A fatal error occurred; both pipes are closed.
    Failed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SessionState::Uninitialized => "uninitialized",
            SessionState::Active => "active",
            SessionState::Terminated => "terminated",
            SessionState::Failed => "failed",
        })
    }
}

/// Client end of the bridge.
///
/// Owns both pipe endpoints and the outgoing frame buffer. Endpoints are
/// opened lazily by the first command that needs them and closed exactly
/// once, by [`terminate`](Session::terminate) or by the first error. Any
/// error moves the session to [`SessionState::Failed`]; there is no recovery.
pub struct Session<C: PipeConnector> {
    connector: C,
    commands: Handle<CommandWriter<C::Commands>>,
    results: Handle<ResultReader<C::Results>>,
    state: SessionState,
    open_examples: usize,
}

impl<C: PipeConnector> Session<C> {
    /// Create a session. Performs no I/O.
    pub fn new(connector: C) -> Self {
        Self {
            connector,
            commands: Handle::Unopened,
            results: Handle::Unopened,
            state: SessionState::Uninitialized,
            open_examples: 0,
        }
    }

    /// Mark the session ready. Performs no I/O; repeated calls while active
    /// are no-ops.
    pub fn init(&mut self) -> Result<()> {
        match self.state {
            SessionState::Uninitialized => {
                self.state = SessionState::Active;
                debug!("session active");
                Ok(())
            }
            SessionState::Active => Ok(()),
            state => Err(SessionError::NotActive { state }),
        }
    }

    /// Ask the generator for a random value.
    pub fn request_random(&mut self) -> Result<u32> {
        self.ensure_active()?;
        let result = self.dispatch(&Command::Rand);
        self.guard(result)
    }

    /// Begin a labeled example. The generator must acknowledge it.
    pub fn start_example(&mut self, label: &str) -> Result<()> {
        self.ensure_active()?;
        let result = self.dispatch(&Command::start(label));
        self.guard(result)?;
        self.open_examples += 1;
        Ok(())
    }

    /// Close the current example. The generator must acknowledge it.
    ///
    /// Pairing with [`start_example`](Session::start_example) is the caller's
    /// job; the generator is the authority on example boundaries.
    pub fn end_example(&mut self) -> Result<()> {
        self.ensure_active()?;
        if self.open_examples == 0 {
            debug!("END sent with no open example");
        }
        let result = self.dispatch(&Command::End);
        self.guard(result)?;
        self.open_examples = self.open_examples.saturating_sub(1);
        Ok(())
    }

    /// End the session: send `TERMINATE`, require its ack, close both pipes.
    ///
    /// Calling this again after a successful terminate does nothing and
    /// touches neither pipe.
    pub fn terminate(&mut self) -> Result<()> {
        if self.state == SessionState::Terminated {
            debug!("session already terminated");
            return Ok(());
        }
        self.ensure_active()?;

        let result = self.dispatch(&Command::Terminate);
        self.guard(result)?;

        self.close_handles();
        self.state = SessionState::Terminated;
        debug!("session terminated");
        Ok(())
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Examples started and not yet ended, as counted by this client.
    pub fn open_examples(&self) -> usize {
        self.open_examples
    }

    /// Whether the command pipe is currently open.
    pub fn commands_open(&self) -> bool {
        self.commands.is_open()
    }

    /// Whether the result pipe is currently open.
    pub fn results_open(&self) -> bool {
        self.results.is_open()
    }

    /// Borrow the connector.
    pub fn connector(&self) -> &C {
        &self.connector
    }

    fn ensure_active(&self) -> Result<()> {
        match self.state {
            SessionState::Active => Ok(()),
            state => Err(SessionError::NotActive { state }),
        }
    }

    /// Send one command and wait for its answer: an `ACK` for commands that
    /// require one, the raw value otherwise.
    fn dispatch(&mut self, command: &Command) -> Result<u32> {
        if command.expects_ack() {
            self.acknowledged(command).map(|()| ACK)
        } else {
            self.exchange(command)
        }
    }

    fn exchange(&mut self, command: &Command) -> Result<u32> {
        self.send(command)?;
        let value = self.receive(|reader| reader.read_result())?;
        trace!(%command, value, "exchange complete");
        Ok(value)
    }

    fn acknowledged(&mut self, command: &Command) -> Result<()> {
        self.send(command)?;
        match self.receive(|reader| reader.read_ack())? {
            Ok(()) => {
                trace!(%command, "acknowledged");
                Ok(())
            }
            Err(code) => Err(ProtocolViolation::NotAcknowledged {
                command: command.name(),
                code,
            }
            .into()),
        }
    }

    fn send(&mut self, command: &Command) -> Result<()> {
        let connector = &mut self.connector;
        let writer = self
            .commands
            .get_or_try_open(|| connector.open_commands())?;
        writer.send(command)?;
        Ok(())
    }

    fn receive<T>(
        &mut self,
        read: impl FnOnce(&mut ResultReader<C::Results>) -> hypbridge_frame::Result<T>,
    ) -> Result<T> {
        let connector = &mut self.connector;
        let read_timeout = connector.read_timeout();
        let reader = self
            .results
            .get_or_try_open(|| connector.open_results())?;
        read(reader).map_err(|err| read_error(err, read_timeout))
    }

    /// Poison the session on any error: close both pipes, enter `Failed`.
    fn guard<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(err) = &result {
            warn!(error = %err, "session failed");
            self.close_handles();
            self.state = SessionState::Failed;
        }
        result
    }

    fn close_handles(&mut self) {
        if self.commands.close().is_some() {
            debug!("closed command pipe");
        }
        if self.results.close().is_some() {
            debug!("closed result pipe");
        }
    }
}

impl<C: PipeConnector> fmt::Debug for Session<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("state", &self.state)
            .field("commands_open", &self.commands.is_open())
            .field("results_open", &self.results.is_open())
            .field("open_examples", &self.open_examples)
            .finish()
    }
}

fn read_error(err: FrameError, read_timeout: Option<Duration>) -> SessionError {
    match err {
        FrameError::Io(io) if io.kind() == std::io::ErrorKind::TimedOut => {
            SessionError::Timeout(read_timeout.unwrap_or_default())
        }
        other => other.into(),
    }
}
