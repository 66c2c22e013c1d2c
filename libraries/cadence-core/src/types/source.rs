/// Playback sources: where the current list came from
use serde::{Deserialize, Serialize};
use std::fmt;

/// Reserved playlist id for the user's favorites
pub const FAVORITES_PLAYLIST_ID: &str = "favorites";

/// Kind of list a source refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Album,
    Artist,
    Folder,
    Playlist,
    Track,
}

impl SourceKind {
    /// Convert to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Album => "album",
            Self::Artist => "artist",
            Self::Folder => "folder",
            Self::Playlist => "playlist",
            Self::Track => "track",
        }
    }

    /// Parse from string
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "album" => Some(Self::Album),
            "artist" => Some(Self::Artist),
            "folder" => Some(Self::Folder),
            "playlist" => Some(Self::Playlist),
            "track" => Some(Self::Track),
            _ => None,
        }
    }
}

/// Reference to a list of tracks
///
/// Immutable value type. Two sources are the same list iff `kind` and `id`
/// match, so the derived `PartialEq` is the comparator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlaybackSource {
    pub kind: SourceKind,
    pub id: String,
}

impl PlaybackSource {
    pub fn new(kind: SourceKind, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
        }
    }

    pub fn album(id: impl Into<String>) -> Self {
        Self::new(SourceKind::Album, id)
    }

    pub fn artist(id: impl Into<String>) -> Self {
        Self::new(SourceKind::Artist, id)
    }

    pub fn folder(path: impl Into<String>) -> Self {
        Self::new(SourceKind::Folder, path)
    }

    pub fn playlist(id: impl Into<String>) -> Self {
        Self::new(SourceKind::Playlist, id)
    }

    pub fn track(id: impl Into<String>) -> Self {
        Self::new(SourceKind::Track, id)
    }

    /// The reserved favorites playlist
    pub fn favorites() -> Self {
        Self::playlist(FAVORITES_PLAYLIST_ID)
    }
}

impl fmt::Display for PlaybackSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind.as_str(), self.id)
    }
}

/// Whether `current` (possibly nothing) is the same list as `candidate`
pub fn sources_equal(current: Option<&PlaybackSource>, candidate: &PlaybackSource) -> bool {
    current.is_some_and(|source| source == candidate)
}

/// Display name derivable from the source alone
///
/// Folders use their last path segment; every other kind uses its id.
/// Stores that know better (album titles) override `TrackStore::source_name`.
pub fn default_source_name(source: &PlaybackSource) -> String {
    match source.kind {
        SourceKind::Folder => source
            .id
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .filter(|segment| !segment.is_empty())
            .unwrap_or(&source.id)
            .to_string(),
        _ => source.id.clone(),
    }
}
