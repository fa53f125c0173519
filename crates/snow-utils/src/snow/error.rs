//! Errors from invoking the `snow` CLI

use thiserror::Error;

/// Failure running a `snow` subcommand
#[derive(Debug, Error)]
pub enum SqlError {
    /// The process could not be started (CLI not installed, not on PATH)
    #[error("Failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// Writing the script to stdin or collecting output failed
    #[error("I/O error talking to '{program}': {source}")]
    Io {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The process exited non-zero
    #[error("snow sql failed: {}", stderr.trim())]
    Failed { code: Option<i32>, stderr: String },
}

impl SqlError {
    /// Standard error captured from a failed invocation
    pub fn stderr(&self) -> Option<&str> {
        match self {
            SqlError::Failed { stderr, .. } => Some(stderr),
            _ => None,
        }
    }
}
