/// Errors that can occur during command/result encoding and decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The command text does not fit in a 1-byte length prefix.
    #[error("command text too long ({len} bytes, max {max})")]
    CommandTooLong { len: usize, max: usize },

    /// Commands must carry at least one byte of text.
    #[error("command text is empty")]
    EmptyCommand,

    /// Command text may not contain NUL bytes.
    #[error("command text contains a NUL byte at offset {offset}")]
    EmbeddedNul { offset: usize },

    /// `START` needs a non-empty label.
    #[error("example label must not be empty")]
    EmptyLabel,

    /// The peer sent text that is not one of the four commands.
    #[error("unknown command {0:?}")]
    UnknownCommand(String),

    /// The peer sent command text that is not UTF-8.
    #[error("command text is not valid UTF-8")]
    InvalidUtf8,

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The pipe was closed before a complete frame was received.
    #[error("connection closed (incomplete frame)")]
    ConnectionClosed,
}

pub type Result<T> = std::result::Result<T, FrameError>;
