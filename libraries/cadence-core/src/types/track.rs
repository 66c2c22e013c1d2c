/// Track type as seen by the playback engine
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::TrackId;

/// Playable track
///
/// Only the fields the engine and the native player need; the library owns
/// everything else.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    /// Library identifier
    pub id: TrackId,

    /// Display title
    pub name: String,

    /// Artist display name
    #[serde(default)]
    pub artist_name: Option<String>,

    /// Album display name
    #[serde(default)]
    pub album_name: Option<String>,

    /// Duration in milliseconds
    #[serde(default)]
    pub duration_ms: u64,

    /// Location handed to the native player
    pub uri: String,
}

impl Track {
    /// Create a track with only the required fields
    pub fn new(id: impl Into<TrackId>, name: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            artist_name: None,
            album_name: None,
            duration_ms: 0,
            uri: uri.into(),
        }
    }

    /// Track duration
    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }
}
