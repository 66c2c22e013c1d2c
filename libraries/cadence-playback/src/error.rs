//! Error types for the playback engine

use cadence_core::{CadenceError, TrackId};
use thiserror::Error;

/// Playback engine errors
#[derive(Debug, Error)]
pub enum PlaybackError {
    /// A track referenced by the queue no longer exists in the library
    #[error("Track vanished from library: {0}")]
    TrackVanished(TrackId),

    /// Seek target rejected before reaching the player
    #[error("Invalid seek position: {0}ms")]
    InvalidSeekPosition(i64),

    /// Engine actor has shut down
    #[error("Playback engine is not running")]
    EngineClosed,

    /// Configuration could not be loaded or is invalid
    #[error("Configuration error: {0}")]
    Config(String),

    /// Collaborator failure (store, player, key-value store)
    #[error(transparent)]
    Core(#[from] CadenceError),

    /// Persisted state could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<config::ConfigError> for PlaybackError {
    fn from(err: config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

/// Result type for playback operations
pub type Result<T> = std::result::Result<T, PlaybackError>;
