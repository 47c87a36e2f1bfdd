//! ReadAlong Error Types
//!
//! Centralized error handling. The alignment hot path never returns these;
//! they surface only from session setup, configuration and the CLI.

use thiserror::Error;

/// Central error type for ReadAlong
#[derive(Error, Debug)]
pub enum ReadAlongError {
    #[error("Reference text contains no readable words")]
    EmptyReference,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Recognizer error: {0}")]
    Recognizer(String),

    #[error("Worker error: {0}")]
    Worker(String),

    #[error("Script error on line {line}: {message}")]
    Script { line: usize, message: String },

    #[error("Lock poisoned: {0}")]
    Lock(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Result type alias for ReadAlong operations
pub type ReadAlongResult<T> = Result<T, ReadAlongError>;

/// Helper to convert Mutex poison errors
impl<T> From<std::sync::PoisonError<T>> for ReadAlongError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        ReadAlongError::Lock(err.to_string())
    }
}
