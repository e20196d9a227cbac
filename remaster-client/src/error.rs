//! Mastering client errors

use std::path::PathBuf;

use thiserror::Error;

/// Errors surfaced by [`MasteringClient`](crate::MasteringClient) operations.
///
/// The client never retries on its own; every failure is returned to the
/// caller exactly once, tagged with enough context to decide what to do
/// next (re-submit, re-poll, give up).
#[derive(Debug, Error)]
pub enum Error {
    /// No API key configured. Raised before any request is sent.
    #[error("mastering API key is not configured")]
    AuthMissing,

    /// The local audio file to upload does not exist or is not a file.
    #[error("audio file not found: {path}")]
    FileNotFound { path: PathBuf },

    /// A status poll was attempted without a job id.
    #[error("no mastering job id to poll")]
    JobIdMissing,

    /// The remote service answered with a non-success status.
    #[error("remote rejected request ({status}): {message}")]
    RemoteRejected { status: u16, message: String },

    /// The remote answered 2xx but the body was not the expected shape.
    #[error("malformed response from remote: {context}")]
    MalformedResponse { context: String },

    /// Parameter validation failed before any request was built.
    #[error("invalid parameter {field}: {message}")]
    InvalidParameter {
        field: &'static str,
        message: String,
    },

    /// Connection, timeout, or body transfer failure.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Local file I/O failure other than a missing upload source.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// True for failures worth retrying later from the caller's side
    /// (the remote or the network misbehaved, not the request itself).
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Transport(_) => true,
            Error::RemoteRejected { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}
