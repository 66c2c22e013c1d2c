//! Playback Events
//!
//! Discrete notifications broadcast by the engine. Continuous state (what is
//! playing, the upcoming list, modes) is published separately as a
//! [`PlaybackSnapshot`](crate::PlaybackSnapshot).

use cadence_core::TrackId;
use serde::{Deserialize, Serialize};

/// Events emitted by the playback engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PlaybackEvent {
    /// Playing/paused flag changed
    StateChanged {
        /// Whether playback is now running
        is_playing: bool,
    },

    /// Active track changed
    TrackChanged {
        /// ID of the new (current) track
        track_id: Option<TrackId>,
        /// ID of the previous track (if any)
        previous_track_id: Option<TrackId>,
    },

    /// Jump queue or list contents changed
    QueueChanged {
        /// Number of upcoming entries
        length: usize,
    },

    /// Reached the end of the list under `NoRepeat`; rewound and paused
    QueueEnded,

    /// Queue cleared because what was playing became invalid
    Reset {
        /// Why the queue was cleared
        reason: ResetReason,
    },

    /// A native or store failure was swallowed
    Error {
        /// Human-readable description
        message: String,
    },
}

/// Cause of a queue reset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResetReason {
    /// Playing source was deleted
    SourceDeleted,
    /// Playing source now has no tracks
    SourceEmptied,
    /// Active track no longer exists
    TrackVanished,
    /// Native player failed on the active track
    PlaybackFailed,
    /// A queued track finished with no list to continue from
    QueueExhausted,
}
