//! Generator side of the protocol.
//!
//! The generator owns the pipes, reads one command at a time and answers
//! each with a single result. It is the authority on example boundaries.

use std::collections::VecDeque;
use std::io::{Read, Write};
#[cfg(unix)]
use std::path::Path;

use hypbridge_frame::{Command, CommandReader, FrameError, ResultWriter, ACK};
#[cfg(unix)]
use hypbridge_transport::PipeStream;
use tracing::{debug, warn};

use crate::error::{Result, SessionError};

/// Decides the answers to a client's commands.
pub trait Generator {
    /// Produce the value for a `RAND` request.
    fn draw(&mut self) -> u32;

    /// A `START <label>` arrived.
    fn start_example(&mut self, _label: &str) {}

    /// An `END` arrived.
    fn end_example(&mut self) {}
}

/// Answers `RAND` from a fixed list, then with a fallback value forever.
#[derive(Debug, Clone, Default)]
pub struct ReplayGenerator {
    values: VecDeque<u32>,
    fallback: u32,
    depth: usize,
}

impl ReplayGenerator {
    pub fn new(values: impl IntoIterator<Item = u32>) -> Self {
        Self {
            values: values.into_iter().collect(),
            fallback: 0,
            depth: 0,
        }
    }

    /// Value returned once the list is exhausted. Defaults to `0`.
    pub fn with_fallback(mut self, fallback: u32) -> Self {
        self.fallback = fallback;
        self
    }

    /// Examples currently open.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Values not yet handed out.
    pub fn remaining(&self) -> usize {
        self.values.len()
    }
}

impl Generator for ReplayGenerator {
    fn draw(&mut self) -> u32 {
        self.values.pop_front().unwrap_or(self.fallback)
    }

    fn start_example(&mut self, label: &str) {
        self.depth += 1;
        debug!(label, depth = self.depth, "example started");
    }

    fn end_example(&mut self) {
        if self.depth == 0 {
            warn!("END without a matching START");
            return;
        }
        self.depth -= 1;
    }
}

/// One command and the result sent back for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exchange {
    pub command: Command,
    pub result: u32,
}

/// Every exchange of one served session, in order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transcript {
    exchanges: Vec<Exchange>,
}

impl Transcript {
    pub fn exchanges(&self) -> &[Exchange] {
        &self.exchanges
    }

    pub fn len(&self) -> usize {
        self.exchanges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exchanges.is_empty()
    }

    /// Whether the client ended the session with `TERMINATE`.
    pub fn terminated(&self) -> bool {
        self.exchanges
            .last()
            .is_some_and(|e| e.command == Command::Terminate)
    }

    /// Values handed out for `RAND`, in order.
    pub fn draws(&self) -> Vec<u32> {
        self.exchanges
            .iter()
            .filter(|e| e.command == Command::Rand)
            .map(|e| e.result)
            .collect()
    }
}

/// Serves one client session over a command reader and a result writer.
pub struct Responder<R, W> {
    commands: CommandReader<R>,
    results: ResultWriter<W>,
    transcript: Transcript,
}

impl<R: Read, W: Write> Responder<R, W> {
    pub fn new(commands: R, results: W) -> Self {
        Self {
            commands: CommandReader::new(commands),
            results: ResultWriter::new(results),
            transcript: Transcript::default(),
        }
    }

    /// Answer commands until the client sends `TERMINATE`.
    ///
    /// `TERMINATE` is acknowledged before returning. If the client closes the
    /// command pipe first, returns [`SessionError::Disconnected`]; the
    /// exchanges served so far remain available from
    /// [`transcript`](Responder::transcript).
    pub fn serve<G: Generator + ?Sized>(&mut self, generator: &mut G) -> Result<()> {
        loop {
            let command = match self.commands.read_command() {
                Ok(command) => command,
                Err(FrameError::ConnectionClosed) => {
                    return Err(SessionError::Disconnected(format!(
                        "command pipe closed after {} commands without TERMINATE",
                        self.transcript.len()
                    )));
                }
                Err(err) => return Err(err.into()),
            };

            let result = match &command {
                Command::Rand => generator.draw(),
                Command::Start(label) => {
                    generator.start_example(label);
                    ACK
                }
                Command::End => {
                    generator.end_example();
                    ACK
                }
                Command::Terminate => ACK,
            };
            self.results.write_result(result)?;

            let done = command == Command::Terminate;
            self.transcript.exchanges.push(Exchange { command, result });
            if done {
                debug!(exchanges = self.transcript.len(), "client terminated");
                return Ok(());
            }
        }
    }

    /// Exchanges served so far.
    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn into_transcript(self) -> Transcript {
        self.transcript
    }
}

#[cfg(unix)]
impl Responder<PipeStream, PipeStream> {
    /// Open the generator ends of a FIFO pair.
    ///
    /// Opens the command pipe first, then the result pipe. This matches the
    /// order a [`Session`](crate::Session) opens its ends in, so neither side
    /// can block forever in `open(2)` while the other waits on the other pipe.
    pub fn open(commands: impl AsRef<Path>, results: impl AsRef<Path>) -> Result<Self> {
        let commands = PipeStream::open_read(commands)?;
        let results = PipeStream::open_write(results)?;
        Ok(Self::new(commands, results))
    }
}
