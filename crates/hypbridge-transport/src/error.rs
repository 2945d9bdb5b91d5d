use std::path::PathBuf;
use std::time::Duration;

/// Errors that can occur in pipe transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Failed to open one end of a pipe.
    #[error("failed to open {path} for {direction}: {source}")]
    Open {
        path: PathBuf,
        direction: &'static str,
        source: std::io::Error,
    },

    /// No peer opened the other end of a FIFO within the timeout.
    #[error("timed out after {timeout:?} opening {path} for {direction}")]
    OpenTimeout {
        path: PathBuf,
        direction: &'static str,
        timeout: Duration,
    },

    /// Failed to create a FIFO node.
    #[error("failed to create fifo {path}: {source}")]
    CreateFifo {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A path expected to be a FIFO exists but is something else.
    #[error("existing path is not a fifo: {path}")]
    NotAFifo { path: PathBuf },

    /// An I/O error occurred on the pipe.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, TransportError>;
