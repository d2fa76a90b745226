//! Timer subsystem error types.

use thiserror::Error;

/// Errors that can occur in the timer subsystem.
#[derive(Debug, Error)]
pub enum TimerError {
    /// Skip count below 1 without the delete flag.
    #[error("skip count must be at least 1, got {0}")]
    InvalidSkip(u32),

    /// No timestamps were recognized in the input.
    #[error("no timestamps recognized")]
    NoTimestamps,

    /// Destination channel or guild could not be resolved.
    #[error("destination not found: {0}")]
    DestinationNotFound(String),

    /// Missing send permission in the resolved destination.
    #[error("missing send permission in: {0}")]
    PermissionDenied(String),

    /// Storage error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Outbound delivery channel is unreachable.
    #[error("delivery unreachable: {0}")]
    Unreachable(String),

    /// I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for timer operations.
pub type Result<T> = std::result::Result<T, TimerError>;
