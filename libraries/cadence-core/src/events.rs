//! Events flowing into the engine from its collaborators

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::types::{PlaybackSource, TrackId, TrackRole};

/// Coarse state reported by the native player
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NativeState {
    Playing,
    Paused,
    Buffering,
    Stopped,
}

/// Event emitted by the native audio engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NativeEvent {
    /// The player moved from its current slot into its next slot.
    ///
    /// `role` is the tag the next slot was appended with.
    ActiveTrackChanged {
        track_id: TrackId,
        role: Option<TrackRole>,
    },

    /// Current track finished with nothing in the next slot
    QueueEnded,

    /// Player state changed outside of an engine command
    StateChanged { state: NativeState },

    /// Periodic position report for the current track
    Progress { position: Duration },

    /// Playback failed
    Error {
        track_id: Option<TrackId>,
        message: String,
    },

    /// Lock-screen / headset controls
    RemotePlay,
    RemotePause,
    RemoteNext,
    RemotePrevious,
    RemoteSeek { position: Duration },
}

/// Out-of-band change to the library
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LibraryEvent {
    /// Sources deleted (playlists removed, folders unmounted, ...)
    SourcesDeleted { sources: Vec<PlaybackSource> },

    /// Source renamed; track membership unaffected
    SourceRenamed {
        old: PlaybackSource,
        new: PlaybackSource,
    },

    /// Membership or order of a source's track list changed
    TracksChanged { source: PlaybackSource },

    /// A track lookup came back empty
    TrackVanished { track_id: TrackId },

    /// Tracks deleted from the library
    TracksDeleted { track_ids: Vec<TrackId> },

    /// Track metadata edited (title, artwork, ...)
    TracksModified { track_ids: Vec<TrackId> },

    /// A rescan discovered these tracks
    LibraryRescanned { track_ids: Vec<TrackId> },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn native_event_is_tagged() {
        let event = NativeEvent::ActiveTrackChanged {
            track_id: TrackId::new("t2"),
            role: Some(TrackRole::FromQueue),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "active_track_changed");
        assert_eq!(json["role"], "from-queue");
    }

    #[test]
    fn library_event_round_trip() {
        let event = LibraryEvent::SourceRenamed {
            old: PlaybackSource::playlist("Old"),
            new: PlaybackSource::playlist("New"),
        };
        let json = serde_json::to_string(&event).unwrap();
        let back: LibraryEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }
}
