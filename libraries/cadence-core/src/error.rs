/// Core error types for Cadence
use thiserror::Error;

use crate::types::{PlaybackSource, TrackId};

/// Result type alias using `CadenceError`
pub type Result<T> = std::result::Result<T, CadenceError>;

/// Core error type shared by every collaborator
#[derive(Error, Debug)]
pub enum CadenceError {
    /// Track store failures (query failed, connection lost)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Native player failures
    #[error("Player error: {0}")]
    Player(String),

    /// Key-value store failures
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Track not found
    #[error("Track not found: {0}")]
    TrackNotFound(TrackId),

    /// Source not found
    #[error("Source not found: {0}")]
    SourceNotFound(PlaybackSource),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// I/O errors
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}

impl CadenceError {
    /// Create a storage error
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    /// Create a player error
    pub fn player(msg: impl Into<String>) -> Self {
        Self::Player(msg.into())
    }

    /// Create a persistence error
    pub fn persistence(msg: impl Into<String>) -> Self {
        Self::Persistence(msg.into())
    }

    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }
}
