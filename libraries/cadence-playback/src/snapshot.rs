//! Observable playback state

use cadence_core::{PlaybackSource, RepeatMode, Track, TrackId};
use serde::{Deserialize, Serialize};

/// Everything a UI needs to render the player, published after every command
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaybackSnapshot {
    /// Metadata of the active track
    pub current_track: Option<Track>,

    pub is_playing: bool,

    pub source: Option<PlaybackSource>,

    /// Display name of `source`
    pub source_name: String,

    /// Jump queue followed by the rest of the active list
    pub queue_list: Vec<TrackId>,

    pub repeat_mode: RepeatMode,

    pub shuffle_enabled: bool,

    /// Index into the active list
    pub position: Option<usize>,

    pub in_jump_queue: bool,

    /// Most recently played sources, newest first
    pub recent_sources: Vec<PlaybackSource>,
}

impl PlaybackSnapshot {
    pub fn current_track_id(&self) -> Option<&TrackId> {
        self.current_track.as_ref().map(|track| &track.id)
    }
}
