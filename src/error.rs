//! Centralized error types for popbackup.

use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the popbackup library.
///
/// The extraction core never returns these: it degrades to sentinel
/// results instead. They come from configuration, the POP3 session and
/// the files written during a backup run.
#[derive(Error, Debug)]
pub enum BackupError {
    /// I/O error with the associated file path.
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The specified file does not exist.
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    /// The TCP connection to the POP3 server could not be opened.
    #[error("Could not connect to {host}:{port}: {source}")]
    Connect {
        host: String,
        port: u16,
        source: std::io::Error,
    },

    /// The TLS connector could not be built or the handshake failed.
    #[error("TLS error: {0}")]
    Tls(String),

    /// The server answered a command with `-ERR`.
    #[error("POP3 command {command} rejected: {response}")]
    Pop3 { command: String, response: String },

    /// The server sent something that is not a valid POP3 reply.
    #[error("POP3 protocol error: {0}")]
    Protocol(String),

    /// A required configuration value is missing or invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The header block of a message could not be read.
    #[error("Malformed message: {0}")]
    MalformedMessage(String),
}

/// Convenience alias for `Result<T, BackupError>`.
pub type Result<T> = std::result::Result<T, BackupError>;

impl BackupError {
    /// Create an `Io` variant from a path and an `io::Error`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Allow `?` on `std::io::Error` when no path context is available
/// (network reads, mostly; prefer `BackupError::io` for files).
impl From<std::io::Error> for BackupError {
    fn from(source: std::io::Error) -> Self {
        Self::Io {
            path: PathBuf::from("<unknown>"),
            source,
        }
    }
}
