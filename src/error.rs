//! Centralized error types for mail-to-files.

use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the mail-to-files library.
#[derive(Error, Debug)]
pub enum ArchiveError {
    /// I/O error with the associated file path.
    #[error("I/O error reading '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The specified file does not exist.
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    /// The configuration file is missing, unreadable or invalid.
    #[error("Invalid configuration in '{path}': {reason}")]
    Config { path: PathBuf, reason: String },

    /// The filename template could not be parsed.
    #[error("Invalid filename template '{template}': {reason}")]
    InvalidTemplate { template: String, reason: String },

    /// The `Date:` header of a message is missing or malformed.
    #[error("Message {id}: cannot parse Date header '{value}'")]
    InvalidDate { id: u32, value: String },

    /// The raw message could not be parsed as MIME at all.
    #[error("MIME decoding error: {0}")]
    MimeError(String),

    /// An IMAP protocol or connection error.
    #[error("IMAP error: {0}")]
    Imap(#[from] imap::Error),

    /// The mailbox session was already logged out.
    #[error("Mailbox session is closed")]
    SessionClosed,

    /// The TLS connector could not be built.
    #[error("TLS error: {0}")]
    Tls(#[from] native_tls::Error),

    /// An HTTP transport error while talking to the archive.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The archive answered, but refused the request.
    #[error("Archive rejected {method} '{path}': HTTP {status}")]
    UploadRejected {
        method: String,
        path: String,
        status: u16,
    },

    /// The archive URL or a path derived from it is not usable.
    #[error("Invalid archive URL: {0}")]
    InvalidUrl(String),
}

/// Convenience alias for `Result<T, ArchiveError>`.
pub type Result<T> = std::result::Result<T, ArchiveError>;

impl ArchiveError {
    /// Create an `Io` variant from a path and an `io::Error`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create a `Config` variant for the given file.
    pub fn config(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Config {
            path: path.into(),
            reason: reason.into(),
        }
    }
}
