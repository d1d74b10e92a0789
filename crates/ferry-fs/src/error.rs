//! Error kinds shared by the server and client sides of the protocol

use std::io;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("File not found: {0}")]
    NotFound(String),
    #[error("File already exists: {0}")]
    AlreadyExists(String),
    #[error("Is a directory: {0}")]
    IsDirectory(String),
    #[error("{0}")]
    InvalidArguments(String),
    #[error("truncated stream: expected {expected} bytes, got {received}")]
    TruncatedStream { expected: u64, received: u64 },
    #[error("unknown command: {0}")]
    UnknownCommand(String),
    #[error("control line exceeds {0} bytes")]
    LineTooLong(usize),
    #[error("timed out")]
    Timeout,
    /// Filesystem fault on the managed directory
    #[error("I/O: {0}")]
    Io(#[from] io::Error),
    /// Fault on the connection itself
    #[error("transport: {0}")]
    Transport(io::Error),
    /// Local read failed after the peer was promised a payload
    #[error("transfer aborted: {0}")]
    Aborted(io::Error),
    /// `ERROR: ...` line received from the server
    #[error("{0}")]
    Remote(String),
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),
}

impl Error {
    /// Whether the connection can no longer be trusted after this error.
    ///
    /// Fatal errors end the session; everything else is reported to the peer
    /// as an `ERROR:` line and the command loop continues.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::TruncatedStream { .. }
                | Self::Timeout
                | Self::LineTooLong(_)
                | Self::Transport(_)
                | Self::Aborted(_)
        )
    }

    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidArguments(msg.into())
    }
}
