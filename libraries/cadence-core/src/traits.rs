//! Collaborator traits the playback engine depends on

use async_trait::async_trait;
use std::time::Duration;

use crate::error::Result;
use crate::types::{default_source_name, MutationOutcome, PlaybackSource, Track, TrackId, TrackRole};

/// Read/write access to the track library
///
/// Implementations must be safe to call concurrently.
#[async_trait]
pub trait TrackStore: Send + Sync {
    /// Ordered track ids of a source
    ///
    /// A source that no longer exists yields an empty list, not an error.
    async fn track_ids_for_source(&self, source: &PlaybackSource) -> Result<Vec<TrackId>>;

    /// Look up a track; `Ok(None)` when it has been deleted
    async fn track(&self, id: &TrackId) -> Result<Option<Track>>;

    /// Display name for a source
    async fn source_name(&self, source: &PlaybackSource) -> Result<String> {
        Ok(default_source_name(source))
    }

    /// Whether a track is in the favorites playlist
    async fn is_favorite(&self, id: &TrackId) -> Result<bool>;

    /// Add or remove a track from the favorites playlist
    async fn set_favorite(&self, id: &TrackId, favorite: bool) -> MutationOutcome;
}

/// Native audio engine holding at most a current and a next track
///
/// `load_current` replaces the current slot and leaves the next slot alone.
/// `NativeEvent::ActiveTrackChanged` is only emitted when the player moves
/// into the next slot on its own, never as a result of `load_current`.
#[async_trait]
pub trait NativePlayer: Send + Sync {
    /// Replace the current slot
    async fn load_current(&self, track: &Track, role: TrackRole) -> Result<()>;

    /// Fill the next slot
    async fn append_next(&self, track: &Track, role: Option<TrackRole>) -> Result<()>;

    /// Empty the next slot
    async fn remove_next(&self) -> Result<()>;

    async fn play(&self) -> Result<()>;

    async fn pause(&self) -> Result<()>;

    /// Seek within the current track
    async fn seek(&self, position: Duration) -> Result<()>;

    /// Stop and unload both slots
    async fn reset(&self) -> Result<()>;

    /// Whether a current track is loaded
    async fn is_loaded(&self) -> Result<bool>;

    /// Id of the track in the current slot
    async fn active_track_id(&self) -> Result<Option<TrackId>>;

    /// Playback position within the current track
    async fn position(&self) -> Result<Duration>;
}

/// Durable key-value storage
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    async fn set(&self, key: &str, value: Vec<u8>) -> Result<()>;

    /// Resolves once previously persisted values are readable
    async fn rehydrated(&self) {}
}
