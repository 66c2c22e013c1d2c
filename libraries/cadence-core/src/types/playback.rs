/// Playback mode and buffer-tag types
use serde::{Deserialize, Serialize};

/// Repeat mode for playback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RepeatMode {
    /// Stop at the end of the list
    #[default]
    NoRepeat,
    /// Wrap to the start of the list
    RepeatAll,
    /// Replay the active track
    RepeatOne,
}

impl RepeatMode {
    /// Convert to string representation
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoRepeat => "no-repeat",
            Self::RepeatAll => "repeat-all",
            Self::RepeatOne => "repeat-one",
        }
    }

    /// Parse from string
    #[must_use]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "no-repeat" | "off" => Some(Self::NoRepeat),
            "repeat-all" | "all" => Some(Self::RepeatAll),
            "repeat-one" | "one" => Some(Self::RepeatOne),
            _ => None,
        }
    }

    /// Next mode in the `NoRepeat -> RepeatAll -> RepeatOne` cycle
    #[must_use]
    pub fn cycled(self) -> Self {
        match self {
            Self::NoRepeat => Self::RepeatAll,
            Self::RepeatAll => Self::RepeatOne,
            Self::RepeatOne => Self::NoRepeat,
        }
    }
}

impl std::fmt::Display for RepeatMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Why a track sits in a native buffer slot
///
/// Travels with every load/append so that native events can be interpreted
/// without looking at player metadata. A plain list successor carries no role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TrackRole {
    /// Current track (re)loaded from the list position
    Reload,
    /// Same track again because of `RepeatMode::RepeatOne`
    RepeatSelf,
    /// Track taken from the jump queue
    FromQueue,
    /// Sentinel after the last track under `NoRepeat`: stop instead of advancing
    EndOfList,
}

/// Result of a library write whose visibility may lag behind the call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "reason", rename_all = "lowercase")]
pub enum MutationOutcome {
    /// Written and visible to subsequent reads
    Applied,
    /// Accepted, becomes visible later (a `LibraryEvent` will follow)
    Pending,
    /// Rejected
    Failed(String),
}

impl MutationOutcome {
    /// Whether the write is already visible
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied)
    }
}
