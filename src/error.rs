//! Error types for replpilot.

use std::io;
use thiserror::Error;

/// Main error type for replpilot operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Session channel errors (subprocess lifecycle, pipe I/O)
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    /// Decision-oracle client errors
    #[error("Oracle error: {0}")]
    Oracle(#[from] OracleError),
}

/// Session layer errors (subprocess spawn, pipe writes, lifecycle).
///
/// Read timeouts are deliberately NOT errors: a read that times out before
/// the prompt marker appears returns a partial [`Output`](crate::Output)
/// with `prompt_seen == false`.
#[derive(Error, Debug)]
pub enum SessionError {
    /// The interpreter or target program could not be launched
    #[error("Failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    /// The subprocess exited before emitting its first prompt
    #[error("Subprocess exited before the first prompt (status: {status:?})")]
    ExitedEarly { status: Option<i32> },

    /// Operation attempted on a channel that was never started
    #[error("Session not started - call start() first")]
    NotStarted,

    /// Write to the subprocess stdin failed; the process has likely exited.
    /// Fatal to this channel instance - it must be re-started, not retried.
    #[error("Input pipe broken - subprocess has likely exited")]
    BrokenPipe,

    /// I/O error on one of the pipes
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Oracle client construction errors.
///
/// Failures *during* an oracle call are never surfaced as errors: the
/// [`DecisionOracle`](crate::DecisionOracle) contract maps them into
/// `"error:"`-prefixed reply strings instead.
#[derive(Error, Debug)]
pub enum OracleError {
    /// Invalid oracle configuration
    #[error("Invalid oracle configuration: {message}")]
    InvalidConfig { message: String },

    /// HTTP client construction failed
    #[error("Failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Result type alias using replpilot's Error.
pub type Result<T> = std::result::Result<T, Error>;
